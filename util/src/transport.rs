use bytes::Bytes;
use reqwest::Client as Reqwest;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: Bytes,
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Unable to reach {url}: {message}")]
    RequestError { url: String, message: String },

    #[error("Unable to read {url}: {message}")]
    FileError { url: String, message: String },

    #[error("Unable to convert {0} to a file path")]
    PathConversionError(String),

    #[error("Unsupported URL scheme {0}")]
    UnsupportedScheme(String),
}

/// Sends a single request and hands back whatever the server answered.
///
/// Non-success statuses are not errors at this level; callers decide what a
/// 404 or a 500 means for them. Errors are reserved for requests that never
/// produced a response.
pub trait Transport {
    #[allow(async_fn_in_trait)]
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn post(url: Url, body: String) -> Self {
        Self {
            method: Method::Post,
            url,
            headers: Headers::new(),
            body: Some(body),
        }
    }

    pub fn with_headers<'a, I: IntoIterator<Item = (&'a String, &'a String)>>(mut self, headers: I) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }

        self
    }
}

impl Response {
    pub fn ok<B: Into<Bytes>>(body: B) -> Self {
        Self::with_status(200, "OK", body)
    }

    pub fn with_status<B: Into<Bytes>>(status: u16, status_text: &str, body: B) -> Self {
        Self {
            status,
            status_text: status_text.to_owned(),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The default transport: `reqwest` for http(s) with a cookie store so
/// session cookies survive between calls, and plain file reads for
/// `file://` URLs.
pub struct ReqwestTransport {
    client: Reqwest,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Reqwest::builder()
            .cookie_store(true)
            .build()
            .map_err(|err| TransportError::RequestError {
                url: String::new(),
                message: err.to_string(),
            })?;

        Ok(Self { client })
    }

    async fn send_http(&self, request: Request) -> Result<Response, TransportError> {
        let url = request.url.to_string();
        let failed = |err: reqwest::Error| TransportError::RequestError {
            url: url.clone(),
            message: err.to_string(),
        };

        let mut builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(failed)?;
        let status = response.status();

        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.as_str().to_owned())
                    .and_modify(|existing: &mut String| {
                        existing.push_str(", ");
                        existing.push_str(value);
                    })
                    .or_insert_with(|| value.to_owned());
            }
        }

        let body = response.bytes().await.map_err(failed)?;
        debug!(%url, status = status.as_u16(), bytes = body.len(), "received response");

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }

    async fn read_file(&self, request: Request) -> Result<Response, TransportError> {
        let path = request
            .url
            .to_file_path()
            .map_err(|()| TransportError::PathConversionError(request.url.to_string()))?;

        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Response::ok(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(Response::with_status(404, "Not Found", Bytes::new()))
            }
            Err(err) => Err(TransportError::FileError {
                url: request.url.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        debug!(url = %request.url, method = ?request.method, "sending request");

        match request.url.scheme() {
            "file" => self.read_file(request).await,
            "http" | "https" => self.send_http(request).await,
            other => Err(TransportError::UnsupportedScheme(other.into())),
        }
    }
}
