//! Plot persistence boundary.
//!
//! The real store is a hosted service; [`PlotStore`] is the capability the
//! core consumes. [`InMemoryPlotStore`] backs the inspector and the tests.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use plot_proto::{decode_plots_json, Plot, PlotChange, PlotPatch};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("plot {0} not found")]
    NotFound(String),
    #[error("plot {0} already exists")]
    AlreadyExists(String),
    #[error("invalid plot id '{0}'")]
    InvalidId(String),
    #[error("failed to read plots from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse plots: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("plot store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PlotStore: Send + Sync {
    async fn list_plots(&self) -> Result<Vec<Plot>, StoreError>;

    /// Case-insensitive lookup; `Ok(None)` when no record exists.
    async fn get_plot(&self, id: &str) -> Result<Option<Plot>, StoreError>;

    async fn create_plot(&self, plot: Plot) -> Result<Plot, StoreError>;

    /// Apply an admin edit. A missing record is created from an available
    /// placeholder first.
    async fn update_plot(&self, id: &str, patch: PlotPatch) -> Result<Plot, StoreError>;

    /// Plots are never removed: the record is cleared back to available.
    async fn delete_plot(&self, id: &str) -> Result<Plot, StoreError>;

    fn subscribe_to_changes(&self) -> PlotSubscription;
}

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    senders: Mutex<Vec<(u64, Sender<PlotChange>)>>,
}

/// Fan-out of store changes to any number of subscriptions.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<Subscribers>,
}

impl ChangeFeed {
    pub fn subscribe(&self) -> PlotSubscription {
        let (sender, receiver) = unbounded();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .senders
            .lock()
            .expect("subscriber list mutex poisoned")
            .push((id, sender));
        PlotSubscription {
            id,
            receiver,
            feed: Arc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, change: PlotChange) {
        let mut guard = self
            .inner
            .senders
            .lock()
            .expect("subscriber list mutex poisoned");
        guard.retain(|(_, sender)| sender.send(change.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .senders
            .lock()
            .expect("subscriber list mutex poisoned")
            .len()
    }
}

/// Live change stream. Unsubscribes when dropped.
pub struct PlotSubscription {
    id: u64,
    receiver: Receiver<PlotChange>,
    feed: Weak<Subscribers>,
}

impl PlotSubscription {
    pub fn receiver(&self) -> &Receiver<PlotChange> {
        &self.receiver
    }

    pub fn try_next(&self) -> Option<PlotChange> {
        match self.receiver.try_recv() {
            Ok(change) => Some(change),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain everything queued so far.
    pub fn drain(&self) -> Vec<PlotChange> {
        self.receiver.try_iter().collect()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for PlotSubscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            if let Ok(mut guard) = feed.senders.lock() {
                guard.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

fn key(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

#[derive(Default)]
pub struct InMemoryPlotStore {
    plots: RwLock<HashMap<String, Plot>>,
    feed: ChangeFeed,
}

impl InMemoryPlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_plots(plots: impl IntoIterator<Item = Plot>) -> Self {
        let store = Self::default();
        {
            let mut guard = store.plots.write().expect("plot map lock poisoned");
            for plot in plots {
                guard.insert(key(&plot.plot_id), plot);
            }
        }
        store
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let plots = decode_plots_json(&contents)?;
        info!(
            target: "cemetery::store",
            path = %path.display(),
            plots = plots.len(),
            "plot_store.seeded"
        );
        Ok(Self::from_plots(plots))
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn len(&self) -> usize {
        self.plots.read().expect("plot map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PlotStore for InMemoryPlotStore {
    async fn list_plots(&self) -> Result<Vec<Plot>, StoreError> {
        let guard = self.plots.read().expect("plot map lock poisoned");
        let mut plots: Vec<Plot> = guard.values().cloned().collect();
        plots.sort_by(|a, b| a.plot_id.cmp(&b.plot_id));
        Ok(plots)
    }

    async fn get_plot(&self, id: &str) -> Result<Option<Plot>, StoreError> {
        let guard = self.plots.read().expect("plot map lock poisoned");
        Ok(guard.get(&key(id)).cloned())
    }

    async fn create_plot(&self, plot: Plot) -> Result<Plot, StoreError> {
        if plot.plot_id.trim().is_empty() {
            return Err(StoreError::InvalidId(plot.plot_id));
        }
        {
            let mut guard = self.plots.write().expect("plot map lock poisoned");
            let slot = key(&plot.plot_id);
            if guard.contains_key(&slot) {
                return Err(StoreError::AlreadyExists(plot.plot_id));
            }
            guard.insert(slot, plot.clone());
        }
        debug!(target: "cemetery::store", plot_id = %plot.plot_id, "plot.created");
        self.feed.publish(PlotChange::Created { plot: plot.clone() });
        Ok(plot)
    }

    async fn update_plot(&self, id: &str, patch: PlotPatch) -> Result<Plot, StoreError> {
        if id.trim().is_empty() {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        let (plot, created) = {
            let mut guard = self.plots.write().expect("plot map lock poisoned");
            let slot = key(id);
            let created = !guard.contains_key(&slot);
            let entry = guard
                .entry(slot.clone())
                .or_insert_with(|| Plot::placeholder(slot));
            entry.apply_patch(&patch);
            (entry.clone(), created)
        };
        debug!(
            target: "cemetery::store",
            plot_id = %plot.plot_id,
            created,
            "plot.updated"
        );
        let change = if created {
            PlotChange::Created { plot: plot.clone() }
        } else {
            PlotChange::Updated { plot: plot.clone() }
        };
        self.feed.publish(change);
        Ok(plot)
    }

    async fn delete_plot(&self, id: &str) -> Result<Plot, StoreError> {
        let plot = {
            let mut guard = self.plots.write().expect("plot map lock poisoned");
            let entry = guard
                .get_mut(&key(id))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            entry.clear();
            entry.clone()
        };
        debug!(target: "cemetery::store", plot_id = %plot.plot_id, "plot.cleared");
        self.feed.publish(PlotChange::Cleared { plot: plot.clone() });
        Ok(plot)
    }

    fn subscribe_to_changes(&self) -> PlotSubscription {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryPlotStore {
        InMemoryPlotStore::from_plots([Plot {
            occupant_name: "Ana Cruz".to_string(),
            status: Some("occupied".to_string()),
            ..Plot::placeholder("LB-10A")
        }])
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let store = seeded();
        let plot = store.get_plot("lb-10a").await.expect("get");
        assert_eq!(plot.map(|p| p.occupant_name), Some("Ana Cruz".to_string()));
        assert!(store.get_plot("lb-10b").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn delete_clears_instead_of_removing() {
        let store = seeded();
        let subscription = store.subscribe_to_changes();
        let cleared = store.delete_plot("lb-10a").await.expect("delete");
        assert!(cleared.occupant_name.is_empty());
        assert_eq!(cleared.status.as_deref(), Some("available"));
        assert_eq!(store.len(), 1);
        assert!(matches!(subscription.try_next(), Some(PlotChange::Cleared { .. })));
        assert!(matches!(
            store.delete_plot("rb-1a").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_creates_missing_plots() {
        let store = InMemoryPlotStore::new();
        let subscription = store.subscribe_to_changes();
        let patch = PlotPatch {
            occupant_name: Some("Jose Reyes".to_string()),
            ..PlotPatch::default()
        };
        let plot = store.update_plot("apartment-5-3h", patch).await.expect("update");
        assert_eq!(plot.plot_id, "apartment-5-3h");
        assert!(matches!(subscription.try_next(), Some(PlotChange::Created { .. })));

        let again = PlotPatch {
            notes: Some("moved".to_string()),
            ..PlotPatch::default()
        };
        store.update_plot("APARTMENT-5-3H", again).await.expect("update");
        assert!(matches!(subscription.try_next(), Some(PlotChange::Updated { .. })));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_duplicates_and_blank_ids() {
        let store = seeded();
        assert!(matches!(
            store.create_plot(Plot::placeholder("lb-10a")).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.create_plot(Plot::placeholder("  ")).await,
            Err(StoreError::InvalidId(_))
        ));
    }

    #[test]
    fn dropping_a_subscription_unsubscribes() {
        let store = seeded();
        let first = store.subscribe_to_changes();
        let second = store.subscribe_to_changes();
        assert_eq!(store.feed().subscriber_count(), 2);
        first.unsubscribe();
        assert_eq!(store.feed().subscriber_count(), 1);
        drop(second);
        assert_eq!(store.feed().subscriber_count(), 0);
    }

    #[test]
    fn seeds_from_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plots.json");
        fs::write(&path, r#"[{"plot_id":"rb-2c","occupant_name":"Luz Garcia"}]"#)
            .expect("write plots");
        let store = InMemoryPlotStore::from_json_file(&path).expect("load");
        assert_eq!(store.len(), 1);
        assert!(matches!(
            InMemoryPlotStore::from_json_file(&dir.path().join("missing.json")),
            Err(StoreError::Read { .. })
        ));
    }
}
