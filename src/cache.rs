use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::FetchError;
use crate::models::NcRecord;
use crate::sheets::RecordSource;

/// Immutable view of the sheet at one fetch, shared across callers.
#[derive(Debug)]
pub struct Snapshot {
    pub records: Vec<NcRecord>,
    pub discarded_rows: usize,
    pub flagged_rows: usize,
    pub fetched_at: DateTime<Utc>,
}

type CacheKey = (String, String);

#[derive(Default)]
struct CacheEntry {
    snapshot: Option<Arc<Snapshot>>,
    /// Serializes refreshes; whoever holds it is the only outbound fetch
    /// for this key.
    gate: Arc<Mutex<()>>,
}

/// Process-wide snapshot cache keyed by (spreadsheet id, sheet name).
/// Within the TTL callers share the stored snapshot; once stale, one
/// caller refreshes while the rest keep reading the previous snapshot.
pub struct DataCache<S> {
    source: S,
    ttl: Duration,
    state: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl<S: RecordSource> DataCache<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        DataCache {
            source,
            ttl,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<Arc<Snapshot>, FetchError> {
        self.fetch_or_serve(spreadsheet_id, sheet_name, false).await
    }

    /// Bypasses the TTL on explicit user request. Still honors the
    /// single-writer discipline: if a refresh is already running, its
    /// result is returned instead of issuing a second fetch.
    pub async fn force_refresh(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<Arc<Snapshot>, FetchError> {
        self.fetch_or_serve(spreadsheet_id, sheet_name, true).await
    }

    async fn fetch_or_serve(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        force: bool,
    ) -> Result<Arc<Snapshot>, FetchError> {
        let key = (spreadsheet_id.to_string(), sheet_name.to_string());

        let gate = {
            let mut state = self.state.lock().await;
            let entry = state.entry(key.clone()).or_default();
            if let Some(snapshot) = &entry.snapshot {
                if !force {
                    if self.is_fresh(snapshot) {
                        return Ok(snapshot.clone());
                    }
                    // Stale with a refresh under way: serve the previous
                    // snapshot instead of blocking the caller.
                    if entry.gate.try_lock().is_err() {
                        return Ok(snapshot.clone());
                    }
                }
            }
            entry.gate.clone()
        };

        let waited_since = Utc::now();
        let _guard = gate.lock().await;

        // Another caller may have finished a refresh while we waited on
        // the gate; their snapshot satisfies this call too.
        {
            let state = self.state.lock().await;
            if let Some(snapshot) = state.get(&key).and_then(|entry| entry.snapshot.as_ref()) {
                if snapshot.fetched_at >= waited_since || (!force && self.is_fresh(snapshot)) {
                    return Ok(snapshot.clone());
                }
            }
        }

        tracing::info!(
            spreadsheet = key.0.as_str(),
            sheet = key.1.as_str(),
            "refreshing cached records"
        );
        // A failed refresh propagates unchanged and leaves the previous
        // snapshot in place; the gate reopens so a later call can retry.
        let data = self.source.fetch(&key.0, &key.1).await?;
        let snapshot = Arc::new(Snapshot {
            records: data.records,
            discarded_rows: data.discarded_rows,
            flagged_rows: data.flagged_rows,
            fetched_at: Utc::now(),
        });

        let mut state = self.state.lock().await;
        let entry = state.entry(key).or_default();
        entry.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn is_fresh(&self, snapshot: &Snapshot) -> bool {
        let age = Utc::now().signed_duration_since(snapshot.fetched_at);
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => age <= ttl,
            // A TTL too large for chrono effectively never expires.
            Err(_) => true,
        }
    }
}
