use std::path::Path;
use suds_util::transport::{Headers, Transport};
use tracing::info;
use url::Url;

pub mod builder;
pub mod error;
pub mod indexer;
pub mod loader;
pub mod schema;
pub mod types;

pub use schema::Schema;

/// Accepts either a URL or a local path.
pub fn resolve_location<S: AsRef<str>>(location: S) -> Result<Url, error::Error> {
    match Url::parse(location.as_ref()) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = Path::new(location.as_ref())
                .canonicalize()
                .map_err(|err| error::Error::PathConversionError(format!("{}: {}", location.as_ref(), err)))?;

            Url::from_file_path(&path)
                .map_err(|()| error::Error::PathConversionError(path.display().to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

/// Loads the WSDL at `url` along with everything it imports and compiles it.
pub async fn load<T: Transport>(transport: &T, url: &Url, headers: &Headers) -> Result<Schema, error::Error> {
    let loader = loader::Loader::new(transport).with_headers(headers.clone());
    loader.load(url).await?;

    let documents = loader.len();
    let snapshot = builder::build(&loader.finish())?;

    info!(
        %url,
        documents,
        namespaces = snapshot.namespaces.len(),
        operations = snapshot.operations.len(),
        "schema compiled"
    );

    Schema::from_snapshot(snapshot)
}
