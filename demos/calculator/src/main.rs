use structopt::StructOpt;
use tracing_subscriber::EnvFilter;
use url::Url;

use suds::{Client, Error, Options, Scalar, Value};
use suds_util::transport::ReqwestTransport;

const WSDL: &str = "http://www.dneonline.com/calculator.asmx?WSDL";
const ENDPOINT: &str = "http://www.dneonline.com/calculator.asmx";

pub struct Calculator {
    client: Client<ReqwestTransport>,
}

impl Calculator {
    pub async fn new() -> Result<Self, Error> {
        let options = Options::new(
            Url::parse(WSDL).map_err(url_error)?,
            Url::parse(ENDPOINT).map_err(url_error)?,
            "calculator",
        );

        Ok(Self {
            client: Client::connect(options, ReqwestTransport::new()?).await?,
        })
    }

    async fn apply(&self, operation: &str, a: i64, b: i64) -> Result<i64, Error> {
        let result = self
            .client
            .call(operation, vec![Value::from(a), Value::from(b)])
            .await?;

        match result {
            Some(Value::Scalar(Scalar::Integer(value))) => Ok(value),
            other => Err(Error::UnknownType(format!("{} returned {:?}", operation, other))),
        }
    }

    pub async fn add(&self, a: i64, b: i64) -> Result<i64, Error> {
        self.apply("add", a, b).await
    }

    pub async fn subtract(&self, a: i64, b: i64) -> Result<i64, Error> {
        self.apply("subtract", a, b).await
    }

    pub async fn multiply(&self, a: i64, b: i64) -> Result<i64, Error> {
        self.apply("multiply", a, b).await
    }

    pub async fn divide(&self, a: i64, b: i64) -> Result<i64, Error> {
        self.apply("divide", a, b).await
    }
}

fn url_error(err: url::ParseError) -> Error {
    Error::SchemaError(err.into())
}

#[derive(StructOpt)]
enum Mode {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(StructOpt)]
struct Args {
    #[structopt(subcommand)]
    mode: Mode,

    a: i64,
    b: i64,
}

#[paw::main]
fn main(args: Args) -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    let result = runtime.block_on(async {
        let calculator = Calculator::new().await?;

        match args.mode {
            Mode::Add => calculator.add(args.a, args.b).await,
            Mode::Subtract => calculator.subtract(args.a, args.b).await,
            Mode::Multiply => calculator.multiply(args.a, args.b).await,
            Mode::Divide => calculator.divide(args.a, args.b).await,
        }
    })?;

    println!("{}", result);
    Ok(())
}
