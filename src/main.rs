use std::io::Write;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, eyre};
use wsse_soap_client::{
    Client, Data, Operation, SoapClient, config::Config, soap::response, telemetry,
};
use xmltree::EmitterConfig;

/// Call a WS-Security protected SOAP service over mutual TLS.
///
/// Settings come from `config/settings.*` and `WSSE_*` environment variables
/// (a `.env` file is honoured).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the operations advertised by the service WSDL
    List,

    /// Sign and send one operation
    Query {
        /// Operation name, e.g. `Lookup`
        name: String,

        /// Operation data as a JSON object of strings and nested objects
        #[arg(short, long)]
        data: Option<String>,

        /// Check the signature locally before sending
        #[arg(long)]
        validate: bool,

        /// Log the signed request and the raw response
        #[arg(short, long)]
        verbose: bool,

        /// Print the response body as received instead of its Body payload
        #[arg(long)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let args = Args::parse();
    let config = Config::load().wrap_err("Failed to load configuration")?;
    let options = config
        .client_options()
        .wrap_err("Failed to load the client certificate")?;
    let client = Client::new(&config.service.url, options)?;
    tracing::debug!(?client, "Client ready");

    match args.command {
        Command::List => {
            for name in client.list_operations().await? {
                println!("{name}");
            }
        }
        Command::Query {
            name,
            data,
            validate,
            verbose,
            raw,
        } => {
            let data: Data = match data {
                Some(json) => serde_json::from_str(&json).wrap_err("Invalid --data")?,
                None => Data::new(),
            };
            let mut operation = Operation::new(name)
                .with_data(data)
                .with_validation(validate);
            if verbose {
                operation = operation.with_verbose(true);
            }

            if raw {
                let body = client.raw_query(&operation).await?;
                std::io::stdout().write_all(&body)?;
                println!();
                return Ok(());
            }

            let document = client.query(&operation).await?;
            if let Some(fault) = response::fault(&document) {
                return Err(eyre!("Service returned a fault: {fault}"));
            }
            let payload = response::body_payload(&document).unwrap_or(&document);
            payload.write_with_config(
                std::io::stdout(),
                EmitterConfig::new()
                    .perform_indent(true)
                    .write_document_declaration(false),
            )?;
            println!();
        }
    }

    Ok(())
}
