mod api_handlers;
mod config;
mod error;
mod models;
mod pagination;
mod twitter_client;
mod upstream_trait;
mod validation;
mod web_server;

use clap::Parser;
use config::AppConfig;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twitter_client::TwitterClient;
use upstream_trait::UpstreamClient;
use web_server::WebServer;

#[derive(Parser, Debug)]
#[command(author, version, about = "Twitter hashtag and user timeline search proxy", long_about = None)]
pub struct Args {
    #[arg(
        short = 'b',
        long,
        default_value = "127.0.0.1:5000",
        help = "Server bind address"
    )]
    bind_address: String,

    #[arg(short = 'w', long, help = "Number of worker threads for Tokio runtime")]
    worker_threads: Option<usize>,

    #[arg(
        short = 't',
        long,
        default_value = "30",
        help = "Request timeout in seconds (inbound requests and upstream calls)"
    )]
    request_timeout: u64,

    #[arg(
        long,
        env = "TWITTER_API_BASE_URL",
        default_value = "https://api.twitter.com",
        help = "Twitter API base URL"
    )]
    api_base_url: String,

    #[arg(long, env = "CONSUMER_KEY", hide_env_values = true, help = "Twitter consumer key")]
    consumer_key: Option<String>,

    #[arg(
        long,
        env = "CONSUMER_SECRET",
        hide_env_values = true,
        help = "Twitter consumer secret"
    )]
    consumer_secret: Option<String>,

    #[arg(
        long,
        env = "BEARER_TOKEN",
        hide_env_values = true,
        help = "Application bearer token (skips the consumer credentials exchange)"
    )]
    bearer_token: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments first to get worker thread count
    let args = Args::parse();

    let worker_threads = args.worker_threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args, worker_threads))
}

async fn async_main(args: Args, worker_threads: usize) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with default INFO level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    info!("Using {} worker threads", worker_threads);
    info!("Request timeout: {}s", args.request_timeout);

    let config = AppConfig::from_args(&args, worker_threads)?;

    info!("Connecting to Twitter API at {}", config.twitter.api_base_url);
    let twitter_client = match TwitterClient::connect(&config.twitter).await {
        Ok(client) => {
            info!("Twitter API client ready");
            client
        }
        Err(e) => {
            error!("Failed to authenticate with the Twitter API: {}", e);
            error!("Check CONSUMER_KEY / CONSUMER_SECRET or BEARER_TOKEN");
            return Err(e.into());
        }
    };

    let upstream: Arc<dyn UpstreamClient> = Arc::new(twitter_client);
    let web_server = WebServer::new(upstream, config.server.clone());

    info!("Starting web server on {}", config.server.bind_address);

    if let Err(e) = web_server.serve(&config.server.bind_address).await {
        error!("Web server error: {}", e);
        return Err(e);
    }

    Ok(())
}
