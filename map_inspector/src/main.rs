use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use cemetery_core::{
    load_config, load_config_from_env, load_map_asset, CemeteryConfig, ConfigMetadata,
    ExhumationError, ExhumationService, ExhumationStore,
    InMemoryPlotStore, LocalRequestStore, LogNotifier, MapController, PlotIndex, PlotStore,
    RepaintLoop, SharedDocument, EventBus,
};
use clap::Parser;
use color_eyre::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use plot_proto::{ExhumationRequest, ExhumationStatus};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{info, warn};

mod app;
mod command;
mod ui;

use app::{ClientCommand, InspectorApp, WorkerReply};
use ui::UiState;

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal inspector for the cemetery plot map", long_about = None)]
struct Cli {
    /// Configuration file; defaults to CEMETERY_CONFIG_PATH or the builtin config.
    #[arg(long)]
    config: Option<PathBuf>,
    /// SVG map asset. Overrides the configured path.
    #[arg(long)]
    map: Option<PathBuf>,
    /// Map used when the primary asset cannot be read.
    #[arg(long)]
    fallback_map: Option<PathBuf>,
    /// JSON array of plot records to seed the plot store with.
    #[arg(long)]
    plots: Option<PathBuf>,
    /// File backing the remote exhumation request store. When omitted the
    /// remote store is unreachable and every request lands in the local store.
    #[arg(long)]
    remote_requests: Option<PathBuf>,
    /// Local fallback file for exhumation requests.
    #[arg(long)]
    local_requests: Option<PathBuf>,
}

/// Stand-in for a hosted request store that cannot be reached.
struct UnreachableRequestStore;

#[async_trait]
impl ExhumationStore for UnreachableRequestStore {
    async fn create(&self, _request: ExhumationRequest) -> Result<ExhumationRequest, ExhumationError> {
        Err(ExhumationError::Unavailable("no remote request store configured".to_string()))
    }

    async fn list(&self) -> Result<Vec<ExhumationRequest>, ExhumationError> {
        Err(ExhumationError::Unavailable("no remote request store configured".to_string()))
    }

    async fn set_status(
        &self,
        id: &str,
        _to: ExhumationStatus,
    ) -> Result<ExhumationRequest, ExhumationError> {
        Err(ExhumationError::NotFound(id.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    let log_writer_tx = log_tx.clone();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(move || ChannelWriter {
            sender: log_writer_tx.clone(),
        })
        .init();

    let cli = Cli::parse();
    let (config, _metadata) = inspector_config(cli.config.clone());

    let map_path = cli.map.clone().unwrap_or_else(|| config.map_asset.clone());
    let fallback_path = cli
        .fallback_map
        .clone()
        .or_else(|| config.fallback_map_asset.clone());
    let asset = load_map_asset(&map_path, fallback_path.as_deref());
    let map_source = asset.source.clone();

    let store: Arc<dyn PlotStore> = match cli.plots.clone().or_else(|| config.plots_path.clone()) {
        Some(path) => match InMemoryPlotStore::from_json_file(&path) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                warn!("Starting with an empty plot store: {}", err);
                Arc::new(InMemoryPlotStore::new())
            }
        },
        None => Arc::new(InMemoryPlotStore::new()),
    };

    let remote: Arc<dyn ExhumationStore> = match cli.remote_requests.clone() {
        Some(path) => Arc::new(LocalRequestStore::new(path)),
        None => Arc::new(UnreachableRequestStore),
    };
    let local_path = cli
        .local_requests
        .clone()
        .unwrap_or_else(|| config.request_store_path.clone());
    let mut service = ExhumationService::new(remote, Arc::new(LocalRequestStore::new(local_path)));
    if let Some(notice) = config.office_notice() {
        service = service.with_notifier(Arc::new(LogNotifier), notice);
    }
    let service = Arc::new(service);

    let document: SharedDocument = Arc::new(Mutex::new(asset.document));
    let plots = Arc::new(RwLock::new(PlotIndex::default()));
    let controller = MapController::new(
        Arc::clone(&document),
        Arc::clone(&plots),
        EventBus::new(config.event_capacity),
    );
    let repaint = RepaintLoop::spawn(
        Arc::clone(&document),
        Arc::clone(&plots),
        config.repaint_interval(),
    );
    let _watcher = match watch_map(&map_path, Arc::clone(&document)) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            warn!("Map file will not be watched: {}", err);
            None
        }
    };

    let (command_tx, command_rx) = unbounded_channel::<ClientCommand>();
    let (reply_tx, reply_rx) = mpsc::channel::<WorkerReply>();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let subscription = store.subscribe_to_changes();

    let worker = tokio::spawn(run_worker(command_rx, reply_tx, Arc::clone(&store), service));

    let _ui_handle = std::thread::spawn(move || -> color_eyre::Result<()> {
        let app = InspectorApp::new(
            controller,
            subscription,
            repaint,
            UiState::with_map_source(map_source),
            command_tx,
            reply_rx,
            shutdown_tx,
            log_rx,
        )?;
        app.run()
    });

    loop {
        if shutdown_rx.try_recv().is_ok() {
            info!("Inspector requested shutdown");
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    worker.abort();
    Ok(())
}

/// `--config` wins; otherwise `CEMETERY_CONFIG_PATH`, then the builtin copy.
fn inspector_config(flag: Option<PathBuf>) -> (Arc<CemeteryConfig>, ConfigMetadata) {
    match flag {
        Some(path) => load_config(Some(path)),
        None => load_config_from_env(),
    }
}

/// Reload the document whenever the map file changes on disk. Colours are
/// restored by the next repaint pass.
fn watch_map(path: &Path, document: SharedDocument) -> notify::Result<RecommendedWatcher> {
    let (events_tx, mut events_rx) = unbounded_channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |result| {
            let _ = events_tx.send(result);
        },
        Config::default(),
    )?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;

    let path = path.to_path_buf();
    tokio::spawn(async move {
        while let Some(result) = events_rx.recv().await {
            match result {
                Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                    match tokio::fs::read_to_string(&path).await {
                        Ok(source) => {
                            let mut doc = match document.lock() {
                                Ok(guard) => guard,
                                Err(poisoned) => poisoned.into_inner(),
                            };
                            doc.replace_source(source);
                            info!(
                                target: "cemetery::map",
                                path = %path.display(),
                                revision = doc.revision(),
                                "map_asset.reloaded"
                            );
                        }
                        Err(err) => warn!("Failed to reload map {}: {}", path.display(), err),
                    }
                }
                Ok(_) => {}
                Err(err) => warn!("Map watcher error: {}", err),
            }
        }
    });
    Ok(watcher)
}

async fn run_worker(
    mut commands: UnboundedReceiver<ClientCommand>,
    replies: Sender<WorkerReply>,
    store: Arc<dyn PlotStore>,
    service: Arc<ExhumationService>,
) {
    while let Some(command) = commands.recv().await {
        let replies = replies.clone();
        let store = Arc::clone(&store);
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let reply = handle_command(command, store.as_ref(), &service).await;
            if let Some(reply) = reply {
                let _ = replies.send(reply);
            }
        });
    }
}

async fn handle_command(
    command: ClientCommand,
    store: &dyn PlotStore,
    service: &ExhumationService,
) -> Option<WorkerReply> {
    match command {
        ClientCommand::FetchTomb(pending) => {
            let result = store
                .get_plot(&pending.plot_id)
                .await
                .map_err(|err| err.to_string());
            Some(WorkerReply::Tomb { pending, result })
        }
        ClientCommand::Refresh(pending) => {
            let result = store.list_plots().await.map_err(|err| err.to_string());
            Some(WorkerReply::Refreshed { pending, result })
        }
        // Successful edits come back through the plot store subscription.
        ClientCommand::Edit { plot_id, patch } => match store.update_plot(&plot_id, patch).await {
            Ok(_) => None,
            Err(err) => Some(WorkerReply::Failed(format!("Edit of {} failed: {}", plot_id, err))),
        },
        ClientCommand::Clear { plot_id } => match store.delete_plot(&plot_id).await {
            Ok(_) => None,
            Err(err) => Some(WorkerReply::Failed(format!("Clear of {} failed: {}", plot_id, err))),
        },
        ClientCommand::Submit(draft) => match service.submit(draft).await {
            Ok(request) => Some(WorkerReply::Submitted(request)),
            Err(err) => Some(WorkerReply::Failed(format!("Request not saved: {}", err))),
        },
        ClientCommand::ListRequests => match service.list().await {
            Ok(requests) => Some(WorkerReply::Requests(requests)),
            Err(err) => Some(WorkerReply::Failed(format!("Could not list requests: {}", err))),
        },
        ClientCommand::Review { id, status } => match service.review(&id, status).await {
            Ok(_) => match service.list().await {
                Ok(requests) => Some(WorkerReply::Requests(requests)),
                Err(err) => Some(WorkerReply::Failed(format!("Could not list requests: {}", err))),
            },
            Err(err) => Some(WorkerReply::Failed(format!("Review of {} failed: {}", id, err))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_flag_takes_precedence() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../cemetery_core/src/data/cemetery_config.json");
        let (config, metadata) = inspector_config(Some(path.clone()));
        assert_eq!(metadata.path(), Some(&path));
        assert_eq!(config.repaint_interval_ms, 3000);
    }

    #[test]
    fn unreadable_config_flag_falls_back_to_builtin() {
        let (config, metadata) = inspector_config(Some(PathBuf::from("/nonexistent/cemetery.json")));
        assert!(metadata.path().is_none());
        assert_eq!(config, CemeteryConfig::builtin());
    }
}
