use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One article sampled from a content source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledItem {
    pub id: i64,
    pub ns: i64,
    pub title: String,
}

/// A group of items fetched from a single source in one request.
///
/// Every item in a batch is dispatched under the same throttle delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub source_tag: String,
    pub items: Vec<SampledItem>,
}

impl Batch {
    pub fn new(source_tag: impl Into<String>, items: Vec<SampledItem>) -> Self {
        Self {
            source_tag: source_tag.into(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Latency of one successful scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub item_id: i64,
    pub source_tag: String,
    pub elapsed_secs: f64,
    pub recorded_at: DateTime<Utc>,
}

impl Measurement {
    /// Stamp a new measurement with the current time.
    pub fn new(item_id: i64, source_tag: impl Into<String>, elapsed_secs: f64) -> Self {
        Self {
            item_id,
            source_tag: source_tag.into(),
            elapsed_secs,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampled_item_deserializes_from_random_list_entry() {
        let json = r#"{"id": 4242, "ns": 0, "title": "Rust (programming language)"}"#;
        let item: SampledItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, 4242);
        assert_eq!(item.ns, 0);
        assert_eq!(item.title, "Rust (programming language)");
    }

    #[test]
    fn batch_len_tracks_items() {
        let batch = Batch::new(
            "de",
            vec![
                SampledItem { id: 1, ns: 0, title: "A".into() },
                SampledItem { id: 2, ns: 0, title: "B".into() },
            ],
        );
        assert_eq!(batch.source_tag, "de");
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(Batch::new("fr", vec![]).is_empty());
    }

    #[test]
    fn measurement_new_stamps_recent_time() {
        let before = Utc::now();
        let m = Measurement::new(7, "en", 0.125);
        assert_eq!(m.item_id, 7);
        assert_eq!(m.source_tag, "en");
        assert!(m.recorded_at >= before);
    }
}
