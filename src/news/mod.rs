//! News rotation: classify stored items into breaking and kept buckets,
//! prune the store down to the kept bucket and hand breaking items to archival.

pub mod archive;
pub mod store;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::datastore::Datastore;
use crate::error::Result;
use store::NewsStore;

/// Items at most this old are breaking.
pub fn breaking_window() -> Duration {
    Duration::minutes(60)
}

/// Items older than this are pruned from the store.
pub fn retention_window() -> Duration {
    Duration::hours(24)
}

/// One stored news story, kept as the raw JSON object so a rotation writes
/// it back untouched. Only `date` decides where it goes; `title` and
/// `description` are read leniently for display and archival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewsItem(Map<String, Value>);

impl NewsItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>, date: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::String(title.into()));
        fields.insert("description".to_string(), Value::String(description.into()));
        fields.insert("date".to_string(), Value::String(date.into()));
        NewsItem(fields)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn title(&self) -> Option<&str> {
        self.field("title").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.field("description").and_then(Value::as_str)
    }

    /// The report time, or `None` when the date is missing or unparseable.
    /// Numbers are epoch milliseconds.
    pub fn reported_at(&self) -> Option<DateTime<Utc>> {
        match self.field("date")? {
            Value::String(raw) => parse_reported_at(raw),
            Value::Number(ms) => ms.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        }
    }
}

/// Result of classifying one snapshot of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rotation {
    pub breaking: Vec<NewsItem>,
    pub keep: Vec<NewsItem>,
    /// Elements dropped because they were not an object or had no usable date.
    pub malformed: usize,
}

/// Parses the date formats found in the feed file. Naive timestamps are taken as UTC.
pub fn parse_reported_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Splits raw store elements into breaking and kept items relative to `now`.
///
/// Both windows are inclusive. An element that is not an object, or whose
/// date is missing or unparseable, lands in neither bucket. Other fields are
/// never inspected. Order is preserved.
pub fn classify(elements: Vec<Value>, now: DateTime<Utc>) -> Rotation {
    let mut rotation = Rotation::default();

    for (index, element) in elements.into_iter().enumerate() {
        let Value::Object(fields) = element else {
            warn!(index, "skipping news element that is not an object");
            rotation.malformed += 1;
            continue;
        };
        let item = NewsItem(fields);

        let Some(reported_at) = item.reported_at() else {
            warn!(index, date = ?item.field("date"), "skipping news item without a usable date");
            rotation.malformed += 1;
            continue;
        };

        // Future-dated items have a negative age and count as fresh.
        let age = now - reported_at;
        if age <= breaking_window() {
            rotation.breaking.push(item.clone());
        }
        if age <= retention_window() {
            rotation.keep.push(item);
        }
    }

    rotation
}

/// Runs one rotation against the store and dispatches archival of the
/// breaking items.
///
/// A failed store read fails the call. A failed write is logged and the
/// classification is still returned, so the persisted file can lag behind
/// what the caller sees. Archival runs detached and never affects the result.
pub async fn rotate_and_classify(
    store: &NewsStore,
    datastore: &Datastore,
    now: DateTime<Utc>,
) -> Result<Rotation> {
    let outcome = store.rotate(now).await?;

    if let Some(err) = &outcome.write_error {
        error!(error = %err, path = %store.path().display(), "news store was not updated");
    }

    let rotation = outcome.rotation;
    info!(
        breaking = rotation.breaking.len(),
        kept = rotation.keep.len(),
        malformed = rotation.malformed,
        "rotated news store"
    );

    // Detached; failures are reported by the task itself.
    let _ = archive::dispatch(datastore.clone(), rotation.breaking.clone());

    Ok(rotation)
}
