use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

// Upstream pagination models

/// Opaque position of the next upstream page. Only the upstream client
/// knows how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One batch of item records returned by the upstream service.
/// `next_cursor == None` means the source is exhausted.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_cursor: Option<PageCursor>,
}

// Response models

/// Pages keyed by their 1-based label, in fetch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pages: Vec<(String, Vec<Value>)>,
}

impl PageResult {
    pub fn push_page(&mut self, items: Vec<Value>) {
        let label = format!("page {}", self.pages.len() + 1);
        self.pages.push((label, items));
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, label: &str) -> Option<&[Value]> {
        self.pages
            .iter()
            .find(|(page_label, _)| page_label == label)
            .map(|(_, items)| items.as_slice())
    }

    #[cfg(test)]
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().map(|(label, _)| label.as_str())
    }
}

impl Serialize for PageResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pages.len()))?;
        for (label, items) in &self.pages {
            map.serialize_entry(label, items)?;
        }
        map.end()
    }
}

/// The only body shape used for failed requests.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
