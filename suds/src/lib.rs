//! A SOAP client driven by the service's WSDL at runtime.
//!
//! ```no_run
//! # async fn run() -> Result<(), suds::Error> {
//! use suds::{Client, Options, Value};
//! use suds_util::transport::ReqwestTransport;
//! use url::Url;
//!
//! let options = Options::new(
//!     Url::parse("http://www.dneonline.com/calculator.asmx?WSDL").unwrap(),
//!     Url::parse("http://www.dneonline.com/calculator.asmx").unwrap(),
//!     "calculator",
//! );
//!
//! let client = Client::connect(options, ReqwestTransport::new()?).await?;
//! let sum = client.call("add", vec![Value::from(1), Value::from(2)]).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod engine;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod options;
pub mod store;

pub use client::{Client, Connector};
pub use error::Error;
pub use handler::{ControlFlow, Exchange, HandlerId};
pub use handshake::{Handshake, Probe, ServiceName, Session};
pub use options::{Options, RequestStyle};
pub use store::{FileStore, MemoryStore, Store};
pub use suds_codec::{Class, Fault, Object, Scalar, Value};
