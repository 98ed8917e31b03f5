// Batch Item Domain Model

use crate::domain::Cursor;
use serde::{Deserialize, Serialize};

/// Read-only snapshot of one record fetched from the source collection.
///
/// The engine never mutates items; the caller-supplied processor performs
/// the actual external mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Stable identifier within the source collection
    pub id: String,
    /// Value used for cursor comparison (monotonic, unique within the source)
    pub order_key: Cursor,
    /// Fields needed for eligibility testing and processing (varies by job type)
    pub payload: serde_json::Value,
}

impl BatchItem {
    pub fn new(id: impl Into<String>, order_key: Cursor, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            order_key,
            payload,
        }
    }

    /// Human-readable description for progress display.
    ///
    /// Prefers a `title` or `name` payload field, falls back to the ID.
    pub fn label(&self) -> String {
        self.payload
            .get("title")
            .or_else(|| self.payload.get("name"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn label_prefers_title_then_name_then_id() {
        let with_title = BatchItem::new("e1", Cursor::new("1"), json!({"title": "Debut Album"}));
        assert_eq!(with_title.label(), "Debut Album");

        let with_name = BatchItem::new("e2", Cursor::new("2"), json!({"name": "Minji"}));
        assert_eq!(with_name.label(), "Minji");

        let bare = BatchItem::new("e3", Cursor::new("3"), json!({}));
        assert_eq!(bare.label(), "e3");
    }
}
