use std::collections::BTreeMap;
use suds_util::{soap::XSD_NAMESPACE, transport::Headers};
use url::Url;

/// Routes requests through a proxy that picks its upstream from a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub header: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Csrf {
    pub header: String,
    pub token: String,
}

/// How call arguments become the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestStyle {
    /// Arguments fill the input type's named elements in order.
    #[default]
    Positional,

    /// The first argument is the whole input object.
    Document,
}

/// Everything an engine needs to know about the service it talks to.
#[derive(Debug, Clone)]
pub struct Options {
    pub wsdl: Url,
    pub endpoint: Url,
    pub service_name: String,
    /// Namespace URI to the prefix callers use for its classes.
    pub prefixes: BTreeMap<String, String>,
    pub proxy: Option<Proxy>,
    pub csrf: Option<Csrf>,
    pub request_style: RequestStyle,
}

impl Options {
    pub fn new<S: Into<String>>(wsdl: Url, endpoint: Url, service_name: S) -> Self {
        let mut prefixes = BTreeMap::new();
        prefixes.insert(XSD_NAMESPACE.to_owned(), "xsd".to_owned());

        Self {
            wsdl,
            endpoint,
            service_name: service_name.into(),
            prefixes,
            proxy: None,
            csrf: None,
            request_style: RequestStyle::default(),
        }
    }

    pub fn with_prefix<N: Into<String>, P: Into<String>>(mut self, namespace: N, prefix: P) -> Self {
        self.prefixes.insert(namespace.into(), prefix.into());
        self
    }

    pub fn with_proxy<H: Into<String>, T: Into<String>>(mut self, header: H, target: T) -> Self {
        self.proxy = Some(Proxy {
            header: header.into(),
            target: target.into(),
        });
        self
    }

    pub fn with_csrf<H: Into<String>, T: Into<String>>(mut self, header: H, token: T) -> Self {
        self.csrf = Some(Csrf {
            header: header.into(),
            token: token.into(),
        });
        self
    }

    pub fn with_request_style(mut self, style: RequestStyle) -> Self {
        self.request_style = style;
        self
    }

    /// Headers sent with every request, schema fetches included.
    pub fn headers(&self) -> Headers {
        let mut headers = Headers::new();

        if let Some(proxy) = &self.proxy {
            headers.insert(proxy.header.clone(), proxy.target.clone());
        }

        if let Some(csrf) = &self.csrf {
            headers.insert(csrf.header.clone(), csrf.token.clone());
        }

        headers
    }

    /// The namespace a caller-facing prefix stands for.
    pub fn namespace_for(&self, prefix: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, candidate)| *candidate == prefix)
            .map(|(namespace, _)| namespace.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Options {
        Options::new(
            Url::parse("http://host/sdk/service.wsdl").unwrap(),
            Url::parse("http://host/sdk").unwrap(),
            "service",
        )
    }

    #[test]
    fn xsd_prefix_is_predefined() {
        let options = options().with_prefix("urn:vim25", "vim");

        assert_eq!(options.namespace_for("xsd"), Some(XSD_NAMESPACE));
        assert_eq!(options.namespace_for("vim"), Some("urn:vim25"));
        assert_eq!(options.namespace_for("other"), None);
    }

    #[test]
    fn proxy_and_csrf_become_headers() {
        assert!(options().headers().is_empty());

        let headers = options()
            .with_proxy("X-Proxy-Target", "http://upstream/sdk")
            .with_csrf("X-CSRF-Token", "token")
            .headers();

        assert_eq!(headers.get("X-Proxy-Target").map(String::as_str), Some("http://upstream/sdk"));
        assert_eq!(headers.get("X-CSRF-Token").map(String::as_str), Some("token"));
    }
}
