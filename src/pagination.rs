use std::borrow::Cow;
use std::future::Future;
use std::num::{IntErrorKind, NonZeroU64};

use tracing::debug as log_debug;

use crate::error::RequestError;
use crate::models::{Page, PageCursor, PageResult};

/// Maximum number of upstream pages fetched for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationDepth(NonZeroU64);

impl PaginationDepth {
    pub const DEFAULT: PaginationDepth = PaginationDepth(NonZeroU64::MIN);

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl Default for PaginationDepth {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Resolve the raw `pages_limit` query value.
/// No upper bound is applied; large values cost one upstream call per page.
pub fn resolve_pages_limit(raw: Option<&str>) -> Result<PaginationDepth, RequestError> {
    let raw = match raw {
        Some(raw) => raw.trim(),
        None => return Ok(PaginationDepth::DEFAULT),
    };

    let digits = strip_digit_separators(raw)?;

    let value = match digits.parse::<i64>() {
        Ok(value) => value,
        Err(err) => {
            return match err.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => Err(RequestError::Range),
                _ => Err(RequestError::Conversion),
            }
        }
    };

    u64::try_from(value)
        .ok()
        .and_then(NonZeroU64::new)
        .map(PaginationDepth)
        .ok_or(RequestError::Range)
}

/// Drop `_` digit separators, which are only allowed between two digits.
fn strip_digit_separators(raw: &str) -> Result<Cow<'_, str>, RequestError> {
    if !raw.contains('_') {
        return Ok(Cow::Borrowed(raw));
    }

    let bytes = raw.as_bytes();
    for (index, byte) in bytes.iter().enumerate() {
        if *byte != b'_' {
            continue;
        }
        let digit_before = index > 0 && bytes[index - 1].is_ascii_digit();
        let digit_after = bytes.get(index + 1).is_some_and(u8::is_ascii_digit);
        if !digit_before || !digit_after {
            return Err(RequestError::Conversion);
        }
    }

    Ok(Cow::Owned(raw.replace('_', "")))
}

/// Fetch up to `depth` pages one after another, threading the cursor.
///
/// Stops early once the source has no next cursor, or when a page after the
/// first one comes back empty. Any failed fetch fails the whole aggregation.
pub async fn aggregate_pages<F, Fut, E>(
    mut fetch_page: F,
    depth: PaginationDepth,
) -> Result<PageResult, E>
where
    F: FnMut(Option<PageCursor>) -> Fut,
    Fut: Future<Output = Result<Page, E>>,
{
    let mut result = PageResult::default();
    let mut cursor: Option<PageCursor> = None;

    for index in 0..depth.get() {
        let page = fetch_page(cursor.take()).await?;

        if page.items.is_empty() && index > 0 {
            break;
        }

        result.push_page(page.items);

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => {
                log_debug!("Upstream source exhausted after {} page(s)", index + 1);
                break;
            }
        }
    }

    debug_assert!(!result.is_empty(), "first page is always recorded");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use serde_json::{json, Value};
    use std::collections::VecDeque;

    fn depth(value: u64) -> PaginationDepth {
        PaginationDepth(NonZeroU64::new(value).unwrap())
    }

    fn page(ids: &[u64], next: Option<&str>) -> Page {
        Page {
            items: ids.iter().map(|id| json!({ "id": id })).collect(),
            next_cursor: next.map(PageCursor::new),
        }
    }

    /// Serves scripted pages and records which cursor each call received.
    struct ScriptedSource {
        pages: VecDeque<Result<Page, UpstreamError>>,
        seen_cursors: Vec<Option<String>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<Page, UpstreamError>>) -> Self {
            Self {
                pages: pages.into(),
                seen_cursors: Vec::new(),
            }
        }

        fn next(&mut self, cursor: Option<PageCursor>) -> Result<Page, UpstreamError> {
            self.seen_cursors
                .push(cursor.map(|cursor| cursor.as_str().to_string()));
            self.pages.pop_front().expect("fetched past the scripted pages")
        }
    }

    #[test]
    fn test_absent_pages_limit_defaults_to_one() {
        assert_eq!(resolve_pages_limit(None).unwrap().get(), 1);
    }

    #[test]
    fn test_numeric_pages_limit() {
        assert_eq!(resolve_pages_limit(Some("3")).unwrap().get(), 3);
        assert_eq!(resolve_pages_limit(Some("+2")).unwrap().get(), 2);
        assert_eq!(resolve_pages_limit(Some(" 4 ")).unwrap().get(), 4);
        assert_eq!(resolve_pages_limit(Some("1000000")).unwrap().get(), 1_000_000);
    }

    #[test]
    fn test_pages_limit_below_one_is_range_error() {
        assert!(matches!(resolve_pages_limit(Some("0")), Err(RequestError::Range)));
        assert!(matches!(resolve_pages_limit(Some("-1")), Err(RequestError::Range)));
        assert!(matches!(
            resolve_pages_limit(Some("-99999999999999999999999")),
            Err(RequestError::Range)
        ));
    }

    #[test]
    fn test_non_integer_pages_limit_is_conversion_error() {
        for raw in ["nan", "1.5", "", "three", "0x10", "1e3", "_1", "1_", "1__0", "+_1"] {
            assert!(
                matches!(resolve_pages_limit(Some(raw)), Err(RequestError::Conversion)),
                "expected conversion error for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_digit_separators_are_accepted() {
        assert_eq!(resolve_pages_limit(Some("1_0")).unwrap().get(), 10);
        assert_eq!(resolve_pages_limit(Some("1_000_000")).unwrap().get(), 1_000_000);
        assert!(matches!(resolve_pages_limit(Some("-1_0")), Err(RequestError::Range)));
    }

    #[tokio::test]
    async fn test_stops_when_source_is_exhausted() {
        let mut source = ScriptedSource::new(vec![
            Ok(page(&[30, 29], Some("28"))),
            Ok(page(&[28], None)),
        ]);

        let result = aggregate_pages(|cursor| std::future::ready(source.next(cursor)), depth(3))
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["page 1", "page 2"]);
        assert_eq!(source.seen_cursors, vec![None, Some("28".to_string())]);
    }

    #[tokio::test]
    async fn test_fetches_no_more_than_depth_pages() {
        let mut source = ScriptedSource::new(vec![
            Ok(page(&[5], Some("4"))),
            Ok(page(&[4], Some("3"))),
            Ok(page(&[3], Some("2"))),
        ]);

        let result = aggregate_pages(|cursor| std::future::ready(source.next(cursor)), depth(2))
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(source.seen_cursors.len(), 2);
        assert_eq!(source.pages.len(), 1);
    }

    #[tokio::test]
    async fn test_items_are_stored_verbatim() {
        let tweet = json!({ "id": 7, "text": "hello", "user": { "screen_name": "Twitter" } });
        let mut source = ScriptedSource::new(vec![Ok(Page {
            items: vec![tweet.clone()],
            next_cursor: None,
        })]);

        let result = aggregate_pages(|cursor| std::future::ready(source.next(cursor)), depth(1))
            .await
            .unwrap();

        assert_eq!(result.get("page 1"), Some(&[tweet][..]));
    }

    #[tokio::test]
    async fn test_empty_first_page_is_still_labeled() {
        let mut source = ScriptedSource::new(vec![Ok(page(&[], None))]);

        let result = aggregate_pages(|cursor| std::future::ready(source.next(cursor)), depth(5))
            .await
            .unwrap();

        assert_eq!(result.get("page 1"), Some(&[] as &[Value]));
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_later_page_ends_aggregation() {
        let mut source = ScriptedSource::new(vec![
            Ok(page(&[9], Some("8"))),
            Ok(page(&[], Some("7"))),
        ]);

        let result = aggregate_pages(|cursor| std::future::ready(source.next(cursor)), depth(4))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.get("page 2").is_none());
    }

    #[tokio::test]
    async fn test_first_page_failure_fails_aggregation() {
        let mut source = ScriptedSource::new(vec![Err(UpstreamError::new(
            "Twitter error response: status code = 401",
            Some(401),
        ))]);

        let err = aggregate_pages(|cursor| std::future::ready(source.next(cursor)), depth(3))
            .await
            .unwrap_err();

        assert_eq!(err.status_code, Some(401));
    }

    #[tokio::test]
    async fn test_later_page_failure_discards_partial_result() {
        let mut source = ScriptedSource::new(vec![
            Ok(page(&[3], Some("2"))),
            Err(UpstreamError::new("Failed to send request: timed out", None)),
        ]);

        let outcome =
            aggregate_pages(|cursor| std::future::ready(source.next(cursor)), depth(3)).await;

        match outcome {
            Err(err) => assert_eq!(err.reason, "Failed to send request: timed out"),
            Ok(partial) => panic!("expected failure, got {} page(s)", partial.len()),
        }
    }
}
