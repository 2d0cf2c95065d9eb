mod analysis;
mod config;
mod data_url;
mod error;
mod gemini;
mod interactive;
mod llm_client;
mod logging;
mod models;
mod request_id;
mod router;

use clap::{Parser, Subcommand};
use config::{Config, SecretStore};
use interactive::InteractiveSession;
use llm_client::LlmClient;
use logging::Console;
use router::{AppState, build_router};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "ecg-analyzer")]
#[command(about = "Sends ECG images to Gemini and relays its reading")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    /// trace, debug, info, warn, error
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Also write logs to this file (rotated at 10 MiB)
    #[arg(long)]
    log_file: Option<String>,

    /// socks and http proxy, example: socks5://192.168.0.2:10080
    #[arg(long)]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve POST /analizar
    Serve {
        #[arg(short, long, default_value = "0.0.0.0")]
        ip: String,

        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Overrides gemini.api_key from the config file
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Upload an image and analyze it from the terminal
    Interactive {
        /// YAML file holding `gemini_api_key`
        #[arg(long, default_value = "secrets.yaml")]
        secrets: String,
    },
}

fn build_http_client(proxy: Option<&str>) -> anyhow::Result<Arc<reqwest::Client>> {
    let client_builder = reqwest::Client::builder();
    let client_builder = if let Some(proxy) = proxy {
        client_builder.proxy(reqwest::Proxy::all(proxy)?)
    } else {
        client_builder
    };
    Ok(Arc::new(client_builder.build()?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = Level::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using INFO level.", args.log_level);
        Level::INFO
    });
    let console = match args.command {
        Command::Serve { .. } => Console::Stdout,
        Command::Interactive { .. } => Console::Stderr,
    };
    logging::init_logging(log_level, args.log_file.as_deref(), console);

    let config = Config::load(args.config.as_deref())?;
    match &args.config {
        Some(path) => info!("Configuration loaded successfully from: {}", path),
        None => info!("No config file given, using defaults"),
    }
    let http_client = build_http_client(args.proxy.as_deref())?;

    match args.command {
        Command::Serve { ip, port, api_key } => {
            let mut params = config.gemini;
            if let Some(api_key) = api_key {
                params.api_key = api_key;
            }

            let llm_client = Arc::new(LlmClient::new(http_client, params));
            info!("Analyses go to model {}", llm_client.params().model);
            let app_state = AppState { llm_client };
            let app = build_router(app_state);

            let bind_address = format!("{}:{}", ip, port);
            let listener = tokio::net::TcpListener::bind(&bind_address).await?;
            info!("Server started on http://{}", bind_address);

            axum::serve(listener, app).await?;
        }
        Command::Interactive { secrets } => {
            let store = SecretStore::from_file(&secrets)?;
            let mut params = config.gemini;
            params.api_key = store.require(SecretStore::GEMINI_API_KEY)?.to_string();

            let client = LlmClient::new(http_client, params);
            info!("Analyses go to model {}", client.params().model);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            InteractiveSession::new(&client).run(stdin, &mut stdout).await?;
        }
    }

    Ok(())
}
