use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info as log_info, warn as log_warn};

use crate::error::{FetchError, RequestError, UpstreamError};
use crate::models::PageResult;
use crate::pagination::{aggregate_pages, resolve_pages_limit};
use crate::upstream_trait::UpstreamClient;
use crate::validation::{HASHTAG_RULE, USERNAME_RULE};

/// Server-side page size for user timelines.
pub const USER_TIMELINE_PAGE_SIZE: u32 = 10;

pub struct ApiHandlers {
    upstream: Arc<dyn UpstreamClient>,
    request_timeout: Duration,
}

impl ApiHandlers {
    pub fn new(upstream: Arc<dyn UpstreamClient>, request_timeout: Duration) -> Self {
        Self {
            upstream,
            request_timeout,
        }
    }

    /// Run a whole page walk under the request deadline. Running out of time
    /// is reported like any other upstream failure.
    async fn fetch_within_deadline<F>(&self, fetch: F) -> Result<PageResult, FetchError>
    where
        F: Future<Output = Result<PageResult, FetchError>>,
    {
        match tokio::time::timeout(self.request_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Upstream(UpstreamError::new(
                format!(
                    "Failed to send request: no response within {}s",
                    self.request_timeout.as_secs()
                ),
                None,
            ))),
        }
    }

    /// GET /hashtags/{hashtag}/
    /// Fetch up to `pages_limit` pages of posts matching the hashtag
    pub async fn search_hashtag(
        &self,
        hashtag: &str,
        pages_limit: Option<&str>,
    ) -> Result<PageResult, RequestError> {
        HASHTAG_RULE.ensure(hashtag)?;
        let depth = resolve_pages_limit(pages_limit)?;

        log_info!("Searching #{} over up to {} page(s)", hashtag, depth.get());

        let upstream = self.upstream.as_ref();
        let result = self
            .fetch_within_deadline(aggregate_pages(
                move |cursor| upstream.search_hashtag(hashtag, cursor),
                depth,
            ))
            .await
        .map_err(|err| {
            log_warn!("Hashtag search for #{} failed: {}", hashtag, err);
            RequestError::from(err)
        })?;

        Ok(result)
    }

    /// GET /users/{username}/
    /// Fetch up to `pages_limit` pages of a user's recent posts
    pub async fn search_user(
        &self,
        username: &str,
        pages_limit: Option<&str>,
    ) -> Result<PageResult, RequestError> {
        USERNAME_RULE.ensure(username)?;
        let depth = resolve_pages_limit(pages_limit)?;

        log_info!(
            "Fetching timeline of {} over up to {} page(s)",
            username,
            depth.get()
        );

        let upstream = self.upstream.as_ref();
        let result = self
            .fetch_within_deadline(aggregate_pages(
                move |cursor| upstream.user_timeline(username, USER_TIMELINE_PAGE_SIZE, cursor),
                depth,
            ))
            .await
        .map_err(|err| {
            log_warn!("Timeline request for {} failed: {}", username, err);
            RequestError::from(err)
        })?;

        Ok(result)
    }
}
