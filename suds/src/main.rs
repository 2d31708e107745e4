use std::{path::PathBuf, sync::Arc};

use serde_json::{json, Map, Number};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use suds::{Client, Connector, Error, FileStore, Options, Scalar, Value};
use suds_util::transport::{Headers, ReqwestTransport};
use suds_wsdl as wsdl;

#[derive(StructOpt)]
enum Args {
    /// Lists the namespaces and operations a WSDL describes
    Inspect { wsdl: String },

    /// Calls an operation with string arguments
    Call {
        #[structopt(long)]
        cache_dir: Option<PathBuf>,

        #[structopt(long, default_value = "suds")]
        service_name: String,

        wsdl: String,
        endpoint: String,
        operation: String,
        args: Vec<String>,
    },
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Scalar(Scalar::String(value)) => json!(value),
        Value::Scalar(Scalar::Boolean(value)) => json!(value),
        Value::Scalar(Scalar::Integer(value)) => json!(value),
        Value::Scalar(Scalar::Float(value)) => Number::from_f64(*value).map_or(serde_json::Value::Null, Into::into),
        Value::Scalar(scalar) => json!(scalar.to_string()),

        Value::Object(object) => {
            let mut fields: Map<_, _> = object
                .fields
                .iter()
                .map(|(name, value)| (name.clone(), to_json(value)))
                .collect();

            if let Some(value) = &object.value {
                fields.insert("_value".into(), to_json(&value.clone().into()));
            }

            fields.into()
        }

        Value::Array(array) => array.items.iter().map(to_json).collect(),
        Value::List(items) => items.iter().map(to_json).collect(),
    }
}

async fn inspect(location: String) -> Result<(), Error> {
    let transport = ReqwestTransport::new()?;
    let schema = wsdl::load(&transport, &wsdl::resolve_location(location)?, &Headers::new()).await?;

    for namespace in schema.namespaces() {
        println!("{} ({} types)", namespace.name, namespace.types.len());
    }

    for (name, operation) in schema.operations() {
        println!("{} [{}]", name, operation.soap_action);
    }

    Ok(())
}

async fn call(
    location: String,
    endpoint: String,
    operation: String,
    args: Vec<String>,
    service_name: String,
    cache_dir: Option<PathBuf>,
) -> Result<(), Error> {
    let options = Options::new(
        wsdl::resolve_location(location)?,
        wsdl::resolve_location(endpoint)?,
        service_name,
    );

    let mut connector = Connector::new(options, ReqwestTransport::new()?);
    if let Some(directory) = cache_dir {
        connector = connector.store(Arc::new(FileStore::new(directory)?));
    }

    let client: Client<_> = connector.connect().await?;
    let result = client
        .call(&operation, args.into_iter().map(Value::from).collect())
        .await?;

    let output = result.as_ref().map_or(serde_json::Value::Null, to_json);
    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());

    Ok(())
}

#[paw::main]
fn main(args: Args) -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    runtime.block_on(async {
        match args {
            Args::Inspect { wsdl } => inspect(wsdl).await,
            Args::Call {
                cache_dir,
                service_name,
                wsdl,
                endpoint,
                operation,
                args,
            } => call(wsdl, endpoint, operation, args, service_name, cache_dir).await,
        }
    })
}
