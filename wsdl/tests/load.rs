use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use suds_util::transport::{Headers, Request, Response, Transport, TransportError};
use suds_wsdl::{error::Error, loader::Loader, types::MessageElement};
use url::Url;

#[derive(Default)]
struct MockTransport {
    documents: HashMap<String, (u16, String)>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(url.into(), (200, body.into()));
        self
    }

    fn with_status(mut self, url: &str, status: u16) -> Self {
        self.documents.insert(url.into(), (status, String::new()));
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.url.to_string())
            .collect()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        tokio::task::yield_now().await;
        self.requests.lock().unwrap().push(request.clone());

        Ok(match self.documents.get(request.url.as_str()) {
            Some((status, body)) => Response::with_status(*status, "Mock", body.clone()),
            None => Response::with_status(404, "Not Found", ""),
        })
    }
}

fn url(value: &str) -> Url {
    Url::parse(value).unwrap()
}

fn schema(target: &str, include: Option<&str>, types: &[&str]) -> String {
    let include = include
        .map(|location| format!(r#"<xsd:include schemaLocation="{}"/>"#, location))
        .unwrap_or_default();

    let types: String = types
        .iter()
        .map(|name| format!(r#"<xsd:complexType name="{}"/>"#, name))
        .collect();

    format!(
        r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="{}">{}{}</xsd:schema>"#,
        target, include, types
    )
}

#[tokio::test]
async fn loads_echo_service() {
    let transport = MockTransport::default()
        .with("http://host/echo/echo.wsdl", include_str!("fixtures/echo.wsdl"))
        .with("http://host/echo/echo-types.xsd", include_str!("fixtures/echo-types.xsd"));

    let mut headers = Headers::new();
    headers.insert("X-Csrf-Token".into(), "secret".into());

    let schema = suds_wsdl::load(&transport, &url("http://host/echo/echo.wsdl"), &headers)
        .await
        .unwrap();

    let echo = schema.operation("Echo").unwrap();
    assert_eq!(echo.soap_action, "urn:echo/Echo");
    assert_eq!(
        echo.input,
        MessageElement {
            name: "Echo".into(),
            ty: schema.find("urn:echo", "Echo").unwrap(),
        }
    );
    assert_eq!(echo.output.as_ref().unwrap().name, "EchoResponse");
    assert_eq!(echo.faults[0].ty, schema.find("urn:echo", "EchoFault").unwrap());

    let message = &schema.elements(echo.input.ty)[0];
    assert_eq!(message.name.as_deref(), Some("message"));
    assert_eq!(schema.type_name(message.ty), "string");

    assert_eq!(
        transport.requested(),
        vec!["http://host/echo/echo.wsdl", "http://host/echo/echo-types.xsd"]
    );
    assert!(transport
        .requests
        .lock()
        .unwrap()
        .iter()
        .all(|request| request.headers.get("X-Csrf-Token").map(String::as_str) == Some("secret")));
}

#[tokio::test]
async fn concurrent_loads_share_one_request() {
    let transport = MockTransport::default().with("http://host/a.xsd", &schema("urn:a", None, &["A"]));
    let loader = Loader::new(&transport);
    let target = url("http://host/a.xsd");

    let (first, second) = tokio::join!(loader.load(&target), loader.load(&target));

    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    assert_eq!(transport.requested().len(), 1);
}

#[tokio::test]
async fn concurrent_waiters_see_the_same_failure() {
    let transport = MockTransport::default().with_status("http://host/gone.wsdl", 503);
    let loader = Loader::new(&transport);
    let target = url("http://host/gone.wsdl");

    let (first, second) = tokio::join!(loader.load(&target), loader.load(&target));

    for result in [first, second] {
        assert!(matches!(result, Err(Error::StatusError { status: 503, .. })));
    }
    assert_eq!(transport.requested().len(), 1);
}

#[tokio::test]
async fn import_cycles_terminate() {
    let transport = MockTransport::default()
        .with("http://host/a.xsd", &schema("urn:a", Some("b.xsd"), &["A"]))
        .with("http://host/b.xsd", &schema("urn:b", Some("/a.xsd"), &["B"]));

    let schema = suds_wsdl::load(&transport, &url("http://host/a.xsd"), &Headers::new())
        .await
        .unwrap();

    assert_eq!(transport.requested(), vec!["http://host/a.xsd", "http://host/b.xsd"]);

    // b finishes first, so its namespace is indexed first
    let names: Vec<_> = schema.namespaces().iter().map(|ns| ns.name.as_str()).collect();
    assert_eq!(names[1..], ["urn:b", "urn:a"]);
}

#[tokio::test]
async fn failed_imports_fail_the_load() {
    let transport = MockTransport::default().with(
        "http://host/dir/a.xsd",
        &schema("urn:a", Some("http://elsewhere/missing.xsd"), &["A"]),
    );

    let result = suds_wsdl::load(&transport, &url("http://host/dir/a.xsd"), &Headers::new()).await;

    match result {
        Err(Error::StatusError { url, status, .. }) => {
            assert_eq!(url, "http://elsewhere/missing.xsd");
            assert_eq!(status, 404);
        }
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn namespace_only_imports_are_skipped() {
    let document = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a">
  <xsd:import namespace="urn:b"/>
  <xsd:complexType name="A"/>
</xsd:schema>"#;

    let transport = MockTransport::default().with("http://host/a.xsd", document);
    let schema = suds_wsdl::load(&transport, &url("http://host/a.xsd"), &Headers::new())
        .await
        .unwrap();

    assert!(schema.find("urn:a", "A").is_some());
    assert_eq!(transport.requested().len(), 1);
}

#[tokio::test]
async fn string_derived_builtins_resolve() {
    let document = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a">
  <xsd:complexType name="Tag">
    <xsd:sequence>
      <xsd:element name="key" type="xsd:token"/>
      <xsd:element name="lang" type="xsd:language"/>
      <xsd:element name="digest" type="xsd:hexBinary"/>
      <xsd:element name="year" type="xsd:gYear"/>
    </xsd:sequence>
    <xsd:attribute name="ref" type="xsd:NCName"/>
  </xsd:complexType>
</xsd:schema>"#;

    let transport = MockTransport::default().with("http://host/a.xsd", document);
    let schema = suds_wsdl::load(&transport, &url("http://host/a.xsd"), &Headers::new())
        .await
        .unwrap();

    let tag = schema.find("urn:a", "Tag").unwrap();
    let types: Vec<_> = schema.elements(tag).iter().map(|element| schema.type_name(element.ty)).collect();
    assert_eq!(types, ["token", "language", "hexBinary", "gYear"]);
    assert_eq!(schema.type_name(schema.attributes(tag)[0].ty), "NCName");
}

#[test]
fn resolves_paths_and_urls() {
    let url = suds_wsdl::resolve_location("http://host/service?wsdl").unwrap();
    assert_eq!(url.as_str(), "http://host/service?wsdl");

    let path = std::env::temp_dir();
    let url = suds_wsdl::resolve_location(path.to_str().unwrap()).unwrap();
    assert_eq!(url.scheme(), "file");

    assert!(matches!(
        suds_wsdl::resolve_location("definitely/not/here.wsdl"),
        Err(Error::PathConversionError(_))
    ));
}
