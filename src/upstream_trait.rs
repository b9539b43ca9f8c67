use async_trait::async_trait;
use std::result::Result as StdResult;

use crate::error::FetchError;
use crate::models::{Page, PageCursor};

pub type FetchResult<T> = StdResult<T, FetchError>;

/// Authenticated access to the remote social-media service.
///
/// One instance is shared by every in-flight request, so implementations
/// must be safe for concurrent use.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Fetch one page of posts tagged with `#hashtag`, starting at `cursor`
    /// (or at the newest post when `None`).
    async fn search_hashtag(
        &self,
        hashtag: &str,
        cursor: Option<PageCursor>,
    ) -> FetchResult<Page>;

    /// Fetch one page of at most `page_size` recent posts by `username`.
    async fn user_timeline(
        &self,
        username: &str,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> FetchResult<Page>;
}
