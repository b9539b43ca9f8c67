use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug as log_debug, info as log_info, warn as log_warn};

use crate::config::TwitterConfig;
use crate::error::{FetchError, UpstreamError};
use crate::models::{Page, PageCursor};
use crate::upstream_trait::{FetchResult, UpstreamClient};

const TOKEN_PATH: &str = "/oauth2/token";
const SEARCH_PATH: &str = "/1.1/search/tweets.json";
const USER_TIMELINE_PATH: &str = "/1.1/statuses/user_timeline.json";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

/// Twitter REST v1.1 client using app-only bearer authentication.
pub struct TwitterClient {
    http: Client,
    base_url: String,
    bearer_token: String,
}

impl TwitterClient {
    /// Build the HTTP client and resolve a bearer token, exchanging the
    /// consumer credentials when no token was configured.
    pub async fn connect(config: &TwitterConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport_error)?;
        let base_url = config.api_base_url.trim_end_matches('/').to_string();

        let bearer_token = match &config.bearer_token {
            Some(token) => token.clone(),
            None => {
                log_info!("Requesting application bearer token from {}", base_url);
                obtain_bearer_token(&http, &base_url, &config.consumer_key, &config.consumer_secret)
                    .await?
            }
        };

        Ok(Self {
            http,
            base_url,
            bearer_token,
        })
    }

    async fn get_page(
        &self,
        path: &str,
        query: &[(&str, String)],
        extract: fn(Value) -> Option<Vec<Value>>,
    ) -> FetchResult<Page> {
        let url = format!("{}{}", self.base_url, path);
        log_debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|err| FetchError::Malformed(format!("{} returned invalid JSON: {}", path, err)))?;
        let items = extract(body)
            .ok_or_else(|| FetchError::Malformed(format!("{} returned an unexpected shape", path)))?;

        let next_cursor = next_max_id(&items).map(|max_id| PageCursor::new(max_id.to_string()));
        Ok(Page { items, next_cursor })
    }
}

#[async_trait]
impl UpstreamClient for TwitterClient {
    async fn search_hashtag(
        &self,
        hashtag: &str,
        cursor: Option<PageCursor>,
    ) -> FetchResult<Page> {
        let mut query = vec![("q", format!("#{}", hashtag))];
        if let Some(cursor) = cursor {
            query.push(("max_id", cursor.as_str().to_string()));
        }

        self.get_page(SEARCH_PATH, &query, |body| match body {
            Value::Object(mut fields) => match fields.remove("statuses") {
                Some(Value::Array(statuses)) => Some(statuses),
                _ => None,
            },
            _ => None,
        })
        .await
    }

    async fn user_timeline(
        &self,
        username: &str,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> FetchResult<Page> {
        let mut query = vec![
            ("screen_name", username.to_string()),
            ("count", page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("max_id", cursor.as_str().to_string()));
        }

        self.get_page(USER_TIMELINE_PATH, &query, |body| match body {
            Value::Array(statuses) => Some(statuses),
            _ => None,
        })
        .await
    }
}

async fn obtain_bearer_token(
    http: &Client,
    base_url: &str,
    consumer_key: &str,
    consumer_secret: &str,
) -> Result<String, UpstreamError> {
    let response = http
        .post(format!("{}{}", base_url, TOKEN_PATH))
        .basic_auth(consumer_key, Some(consumer_secret))
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded;charset=UTF-8")
        .body("grant_type=client_credentials")
        .send()
        .await
        .map_err(transport_error)?;
    let response = check_status(response).await?;

    let token: TokenResponse = response.json().await.map_err(|err| {
        UpstreamError::new(format!("Failed to parse bearer token response: {}", err), None)
    })?;

    if !token.token_type.eq_ignore_ascii_case("bearer") {
        return Err(UpstreamError::new(
            format!("Unexpected token type: {}", token.token_type),
            None,
        ));
    }

    Ok(token.access_token)
}

/// Map any non-success status into an upstream error, logging the body.
async fn check_status(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    log_warn!("Twitter responded with {}: {}", status, body);

    Err(UpstreamError::new(
        format!("Twitter error response: status code = {}", status.as_u16()),
        Some(status.as_u16()),
    ))
}

fn transport_error(err: reqwest::Error) -> UpstreamError {
    UpstreamError::new(
        format!("Failed to send request: {}", err),
        err.status().map(|status| status.as_u16()),
    )
}

/// Next `max_id`: one below the oldest id on the page. Empty pages end the walk.
fn next_max_id(items: &[Value]) -> Option<u64> {
    items
        .iter()
        .filter_map(|item| item.get("id").and_then(Value::as_u64))
        .min()
        .and_then(|oldest| oldest.checked_sub(1))
}
