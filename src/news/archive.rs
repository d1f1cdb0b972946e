use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::datastore::Datastore;
use crate::error::Result;
use super::NewsItem;

/// Datastore table receiving a copy of every breaking item.
pub const ARCHIVE_TABLE: &str = "news";

/// Archive row. Values are copied as stored; absent fields become `null`.
#[derive(Debug, Serialize, PartialEq)]
pub struct ArchivedNews<'a> {
    pub title: Option<&'a Value>,
    pub content: Option<&'a Value>,
    pub reported_at: Option<&'a Value>,
}

impl<'a> From<&'a NewsItem> for ArchivedNews<'a> {
    fn from(item: &'a NewsItem) -> Self {
        ArchivedNews {
            title: item.field("title"),
            content: item.field("description"),
            reported_at: item.field("date"),
        }
    }
}

/// Inserts the items into the archive table in a single request.
pub async fn archive_breaking(datastore: &Datastore, items: &[NewsItem]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let rows: Vec<ArchivedNews<'_>> = items.iter().map(ArchivedNews::from).collect();
    datastore.insert(ARCHIVE_TABLE, &rows).await
}

/// Spawns archival of `items` as a detached task. The task logs its own
/// failure; callers may await the handle but nothing requires them to.
/// Returns `None` when there is nothing to archive.
pub fn dispatch(datastore: Datastore, items: Vec<NewsItem>) -> Option<JoinHandle<Result<()>>> {
    if items.is_empty() {
        return None;
    }

    Some(tokio::spawn(async move {
        let result = archive_breaking(&datastore, &items).await;
        match &result {
            Ok(()) => info!(count = items.len(), "archived breaking news"),
            Err(e) => error!(count = items.len(), error = %e, "failed to archive breaking news"),
        }
        result
    }))
}
