use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
};
use suds_util::{
    soap::XSD_NAMESPACE,
    transport::{Headers, Request, Transport},
    xml::Document,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

use crate::{error::Error, indexer::Indexer};

pub const WSDL_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/";

type Loaded = Result<Arc<Document>, Error>;

/// Fetches a WSDL document and everything it imports, indexing each
/// document once all of its imports are in.
///
/// Every URL is fetched at most once: concurrent requests for the same URL
/// wait on the first one and see its outcome, failures included.
pub struct Loader<'t, T> {
    transport: &'t T,
    headers: Headers,
    documents: Mutex<HashMap<Url, Arc<OnceCell<Loaded>>>>,
    indexer: Mutex<Indexer>,
}

impl<'t, T: Transport> Loader<'t, T> {
    pub fn new(transport: &'t T) -> Self {
        Self {
            transport,
            headers: Headers::new(),
            documents: Mutex::default(),
            indexer: Mutex::default(),
        }
    }

    /// Headers sent with every document request.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub async fn load(&self, url: &Url) -> Loaded {
        self.load_within(url, &[]).await
    }

    /// Number of distinct documents requested so far.
    pub fn len(&self) -> usize {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> Indexer {
        self.indexer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_within<'a>(&'a self, url: &'a Url, chain: &'a [Url]) -> Pin<Box<dyn Future<Output = Loaded> + 'a>> {
        Box::pin(async move {
            let cell = self
                .documents
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(url.clone())
                .or_default()
                .clone();

            cell.get_or_init(|| self.fetch(url, chain)).await.clone()
        })
    }

    async fn fetch(&self, url: &Url, chain: &[Url]) -> Loaded {
        debug!(%url, "fetching document");

        let request = Request::get(url.clone()).with_headers(&self.headers);
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|source| Error::TransportError {
                url: url.to_string(),
                source,
            })?;

        if !response.is_success() {
            return Err(Error::StatusError {
                url: url.to_string(),
                status: response.status,
                status_text: response.status_text,
            });
        }

        let document = Document::from_bytes(&response.body).map_err(|err| Error::XmlParseError {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        let mut chain = chain.to_vec();
        chain.push(url.clone());

        for location in imports(&document) {
            let import = url.join(location)?;

            // A document further up this chain is waiting on us; it will be
            // complete once we are.
            if chain.contains(&import) {
                debug!(%url, %import, "import cycle");
                continue;
            }

            self.load_within(&import, &chain).await?;
        }

        self.indexer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .index(&document);

        info!(%url, "document ready");
        Ok(Arc::new(document))
    }
}

/// Locations of `wsdl:import`, `xsd:import` and `xsd:include`, skipping
/// imports that only name a namespace.
fn imports(document: &Document) -> Vec<&str> {
    let wsdl = document
        .elements_by_tag_ns(WSDL_NAMESPACE, "import")
        .filter_map(|import| import.attribute("location"));

    let xsd = document
        .elements_by_tag_ns(XSD_NAMESPACE, "import")
        .chain(document.elements_by_tag_ns(XSD_NAMESPACE, "include"))
        .filter_map(|import| import.attribute("schemaLocation"));

    wsdl.chain(xsd).collect()
}
