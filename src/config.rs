use anyhow::{bail, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub twitter: TwitterConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub api_base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub bearer_token: Option<String>,
    pub request_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub request_timeout: u64,
    pub worker_threads: usize,
}

impl AppConfig {
    pub fn from_args(args: &crate::Args, worker_threads: usize) -> Result<Self> {
        let bearer_token = args
            .bearer_token
            .as_ref()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let consumer_key = args.consumer_key.clone().unwrap_or_default();
        let consumer_secret = args.consumer_secret.clone().unwrap_or_default();

        // Consumer credentials are only needed to obtain a bearer token
        if bearer_token.is_none() && (consumer_key.is_empty() || consumer_secret.is_empty()) {
            bail!(
                "Twitter credentials missing: set CONSUMER_KEY and CONSUMER_SECRET, or BEARER_TOKEN"
            );
        }

        if args.request_timeout == 0 {
            bail!("Request timeout must be at least 1 second");
        }

        Ok(Self {
            twitter: TwitterConfig {
                api_base_url: args.api_base_url.clone(),
                consumer_key,
                consumer_secret,
                bearer_token,
                request_timeout: args.request_timeout,
            },
            server: ServerConfig {
                bind_address: args.bind_address.clone(),
                request_timeout: args.request_timeout,
                worker_threads,
            },
        })
    }
}
