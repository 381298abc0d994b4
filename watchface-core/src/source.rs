use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;
use tokio::sync::RwLock;

use crate::model::WeatherRow;

/// Read-only view of the phone's weather store.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// Rows for `location` dated on or after `since`, ordered by date ascending.
    /// An empty result is not an error.
    async fn query(&self, location: &str, since: NaiveDate) -> anyhow::Result<Vec<WeatherRow>>;
}

#[derive(Debug, Clone)]
struct Entry {
    location: String,
    date: NaiveDate,
    row: WeatherRow,
}

/// Weather store kept in memory, used by the demo and tests.
#[derive(Debug, Default)]
pub struct InMemoryWeatherSource {
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryWeatherSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the row for `location` on `date`.
    pub async fn upsert(&self, location: &str, date: NaiveDate, row: WeatherRow) {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.location == location && e.date == date) {
            Some(existing) => existing.row = row,
            None => entries.push(Entry { location: location.to_string(), date, row }),
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl WeatherSource for InMemoryWeatherSource {
    async fn query(&self, location: &str, since: NaiveDate) -> anyhow::Result<Vec<WeatherRow>> {
        let entries = self.entries.read().await;

        let mut matching: Vec<&Entry> =
            entries.iter().filter(|e| e.location == location && e.date >= since).collect();
        matching.sort_by_key(|e| e.date);

        Ok(matching.into_iter().map(|e| e.row).collect())
    }
}
