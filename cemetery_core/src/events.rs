//! Event bus connecting the map controller with its views.

use plot_proto::PlotStatus;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEvent {
    /// A plot element was clicked and its section opened.
    SectionOpened { section: String, levels: u8 },
    LevelSelected { section: String, level: u8 },
    TombOpened { plot_id: String, status: PlotStatus },
    /// The view went back to the overview and dropped its caches.
    OverviewRestored,
    /// A single identifier was repainted after a write.
    PlotRepainted { plot_id: String, status: PlotStatus },
    DirectionsShown { plot_id: String, steps: usize },
    ExhumationFormToggled { open: bool },
    /// A fetch result arrived after the view had moved on.
    StaleResultDropped { token: u64 },
}

pub struct EventBus {
    sender: broadcast::Sender<MapEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: MapEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MapEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
