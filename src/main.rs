use anyhow::{Context, bail};
use pidkit::config::loader::ConfigLoader;
use pidkit::error::{AppError, ErrorResponse};
use pidkit::observability::init_tracing;
use pidkit::services::create_tpm_client;
use serde_json::Value;
use tracing::info;

const USAGE: &str = "usage: pidkit <get <pid> | all | fetch [--fresh] <url>...>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("PIDKIT_CONFIG") {
        Ok(path) => ConfigLoader::load_from(path),
        Err(_) => ConfigLoader::load(),
    }
    .context("loading configuration")?;
    ConfigLoader::validate(&config)?;

    let _guard = init_tracing(&config.logging);
    info!("Configuration loaded (service: {})", config.service.base_url);

    let (client, fetcher) = create_tpm_client(&config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let output = match args.first().map(String::as_str) {
        Some("get") => {
            let Some(pid) = args.get(1) else {
                bail!(USAGE);
            };
            client.get_record(pid).await.map(|r| r.to_json())
        }
        Some("all") => client
            .get_all_records()
            .await
            .map(|records| Value::Array(records.iter().map(|r| r.to_json()).collect())),
        Some("fetch") => {
            let force_fresh = args.iter().any(|a| a == "--fresh");
            let urls: Vec<String> = args[1..]
                .iter()
                .filter(|a| a.as_str() != "--fresh")
                .cloned()
                .collect();
            fetcher.fetch_many(&urls, force_fresh).await.map(Value::Array)
        }
        _ => bail!(USAGE),
    };

    info!("{}", fetcher.metrics().gather().trim_end());
    print_result(output)
}

fn print_result(output: Result<Value, AppError>) -> anyhow::Result<()> {
    match output {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&ErrorResponse::from(&e))?);
            Err(e.into())
        }
    }
}
