//! View-state machine for the cemetery map.
//!
//! ```text
//! Overview --click plot element--> Section --choose level--> Level --click tomb--> Tomb
//!    ^------------- back ------------'   ^-------- back --------'  ^----- back -----'
//! ```
//!
//! Exhumation form and directions are overlays that can be open in any view.
//! Fetches are split into `begin_*` / `finish_*` halves carrying a token so a
//! result that arrives after the user navigated away is dropped.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use plot_proto::{Plot, PlotChange, PlotPatch};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::directions::{generate_directions, DirectionStep};
use crate::events::{EventBus, MapEvent};
use crate::identifier::{is_decorative, is_plot_element, parse_identifier, ParsedIdentifier, PlotKind};
use crate::layout::{generate_layout, SectionLayout, TombDescriptor};
use crate::map_document::MapDocument;
use crate::painter::{paint_document, paint_element, PaintReport, PlotIndex, SharedDocument, SharedPlots};
use crate::status::{resolve_status, ResolvedStatus};
use crate::store::{PlotStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Overview,
    Section,
    Level,
    Tomb,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("cannot {action} from the {view:?} view")]
    InvalidTransition { view: View, action: &'static str },
    #[error("section {section} has no level {level}")]
    UnknownLevel { section: String, level: u8 },
    #[error("tomb {tomb} is not on level {level} of {section}")]
    UnknownTomb {
        section: String,
        level: u8,
        tomb: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Decorative or unrecognised element; nothing changed.
    Ignored,
    SectionOpened { section: String, levels: u8 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TombDetail {
    pub descriptor: TombDescriptor,
    pub plot: Plot,
    pub resolved: ResolvedStatus,
    /// True when the store had no record and an available plot was shown.
    pub placeholder: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlays {
    pub exhumation_form: bool,
    pub directions: Option<Vec<DirectionStep>>,
}

/// Handle for an in-flight single-plot fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTomb {
    pub token: u64,
    pub plot_id: String,
    section: String,
    level: u8,
}

/// Handle for an in-flight plot list refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRefresh {
    pub token: u64,
}

pub struct MapController {
    view: View,
    section: Option<ParsedIdentifier>,
    layout: Option<SectionLayout>,
    level: Option<u8>,
    tomb: Option<TombDetail>,
    overlays: Overlays,
    document: SharedDocument,
    plots: SharedPlots,
    bus: EventBus,
    clock: fn() -> NaiveDate,
    next_token: u64,
    pending_tomb: Option<u64>,
    pending_refresh: Option<u64>,
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl MapController {
    pub fn new(document: SharedDocument, plots: SharedPlots, bus: EventBus) -> Self {
        Self {
            view: View::Overview,
            section: None,
            layout: None,
            level: None,
            tomb: None,
            overlays: Overlays::default(),
            document,
            plots,
            bus,
            clock: local_today,
            next_token: 1,
            pending_tomb: None,
            pending_refresh: None,
        }
    }

    /// Controller over a fresh document and empty plot index.
    pub fn standalone(document: MapDocument) -> Self {
        Self::new(
            Arc::new(Mutex::new(document)),
            Arc::new(RwLock::new(PlotIndex::default())),
            EventBus::default(),
        )
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn section(&self) -> Option<&ParsedIdentifier> {
        self.section.as_ref()
    }

    pub fn layout(&self) -> Option<&SectionLayout> {
        self.layout.as_ref()
    }

    pub fn level(&self) -> Option<u8> {
        self.level
    }

    pub fn tomb(&self) -> Option<&TombDetail> {
        self.tomb.as_ref()
    }

    pub fn overlays(&self) -> &Overlays {
        &self.overlays
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn plots(&self) -> &SharedPlots {
        &self.plots
    }

    fn lock_document(&self) -> MutexGuard<'_, MapDocument> {
        match self.document.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_plots(&self) -> RwLockReadGuard<'_, PlotIndex> {
        match self.plots.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_plots(&self) -> RwLockWriteGuard<'_, PlotIndex> {
        match self.plots.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn issue_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    /// Handle a click on a map element.
    ///
    /// Decorative shapes (`rect110`, `layer3`, ...) and ids that name no
    /// section are ignored in every view.
    pub fn click_element(&mut self, element_id: &str) -> ClickOutcome {
        if is_decorative(element_id) {
            debug!(target: "cemetery::controller", element_id, "click.ignored=decorative");
            return ClickOutcome::Ignored;
        }
        let parsed = parse_identifier(element_id);
        if parsed.kind == PlotKind::Unknown && !is_plot_element(element_id) {
            debug!(target: "cemetery::controller", element_id, "click.ignored=unknown");
            return ClickOutcome::Ignored;
        }

        let layout = generate_layout(&parsed.section);
        let section = parsed.section.clone();
        let levels = layout.levels;
        self.section = Some(ParsedIdentifier {
            level: None,
            tomb: None,
            ..parsed
        });
        self.layout = Some(layout);
        self.level = None;
        self.tomb = None;
        self.pending_tomb = None;
        self.view = View::Section;
        info!(target: "cemetery::controller", %section, levels, "section.opened");
        self.bus.emit(MapEvent::SectionOpened {
            section: section.clone(),
            levels,
        });
        ClickOutcome::SectionOpened { section, levels }
    }

    pub fn choose_level(&mut self, level: u8) -> Result<(), ControllerError> {
        if !matches!(self.view, View::Section | View::Level) {
            return Err(ControllerError::InvalidTransition {
                view: self.view,
                action: "choose a level",
            });
        }
        let layout = self
            .layout
            .as_ref()
            .ok_or(ControllerError::InvalidTransition {
                view: self.view,
                action: "choose a level",
            })?;
        if !layout.has_level(level) {
            return Err(ControllerError::UnknownLevel {
                section: layout.section.clone(),
                level,
            });
        }
        let section = layout.section.clone();
        self.level = Some(level);
        self.pending_tomb = None;
        self.view = View::Level;
        debug!(target: "cemetery::controller", %section, level, "level.selected");
        self.bus.emit(MapEvent::LevelSelected { section, level });
        Ok(())
    }

    /// Tombs of the selected level with their current status.
    pub fn level_tombs(&self) -> Vec<(TombDescriptor, ResolvedStatus)> {
        let (Some(layout), Some(level)) = (self.layout.as_ref(), self.level) else {
            return Vec::new();
        };
        let today = self.today();
        let plots = self.read_plots();
        layout
            .tombs_on_level(level)
            .map(|tomb| (tomb.clone(), resolve_status(plots.get(&tomb.id), today)))
            .collect()
    }

    /// Start opening a tomb of the selected level. The caller fetches the
    /// plot and hands it to [`MapController::finish_tomb_selection`].
    pub fn begin_tomb_selection(&mut self, tomb_id: &str) -> Result<PendingTomb, ControllerError> {
        if self.view != View::Level {
            return Err(ControllerError::InvalidTransition {
                view: self.view,
                action: "open a tomb",
            });
        }
        let (Some(layout), Some(level)) = (self.layout.as_ref(), self.level) else {
            return Err(ControllerError::InvalidTransition {
                view: self.view,
                action: "open a tomb",
            });
        };
        let tomb = layout
            .tomb(tomb_id)
            .filter(|tomb| tomb.level == level)
            .ok_or_else(|| ControllerError::UnknownTomb {
                section: layout.section.clone(),
                level,
                tomb: tomb_id.to_string(),
            })?;
        let plot_id = tomb.id.clone();
        let section = layout.section.clone();
        let token = self.issue_token();
        self.pending_tomb = Some(token);
        Ok(PendingTomb {
            token,
            plot_id,
            section,
            level,
        })
    }

    fn still_relevant(&self, pending: &PendingTomb) -> bool {
        self.pending_tomb == Some(pending.token)
            && self.view == View::Level
            && self.level == Some(pending.level)
            && self
                .layout
                .as_ref()
                .is_some_and(|layout| layout.section == pending.section)
    }

    /// Complete a tomb fetch. Returns false when the result was stale and
    /// has been dropped. A missing record shows an available placeholder.
    pub fn finish_tomb_selection(&mut self, pending: PendingTomb, plot: Option<Plot>) -> bool {
        if !self.still_relevant(&pending) {
            debug!(
                target: "cemetery::controller",
                token = pending.token,
                plot_id = %pending.plot_id,
                "tomb.fetch_stale"
            );
            self.bus.emit(MapEvent::StaleResultDropped {
                token: pending.token,
            });
            return false;
        }
        let Some(descriptor) = self
            .layout
            .as_ref()
            .and_then(|layout| layout.tomb(&pending.plot_id))
            .cloned()
        else {
            return false;
        };

        let placeholder = plot.is_none();
        let plot = plot.unwrap_or_else(|| Plot {
            section: Some(pending.section.clone()),
            level: Some(pending.level),
            ..Plot::placeholder(pending.plot_id.clone())
        });
        let resolved = resolve_status(Some(&plot), self.today());
        self.pending_tomb = None;
        self.view = View::Tomb;
        self.bus.emit(MapEvent::TombOpened {
            plot_id: plot.plot_id.clone(),
            status: resolved.status,
        });
        self.tomb = Some(TombDetail {
            descriptor,
            plot,
            resolved,
            placeholder,
        });
        true
    }

    /// Fetch and open a tomb in one step.
    pub async fn open_tomb(
        &mut self,
        store: &dyn PlotStore,
        tomb_id: &str,
    ) -> Result<bool, ControllerError> {
        let pending = self.begin_tomb_selection(tomb_id)?;
        let plot = store.get_plot(&pending.plot_id).await?;
        Ok(self.finish_tomb_selection(pending, plot))
    }

    /// Walk one view back. Leaving a section drops its layout and level.
    pub fn back(&mut self) -> View {
        self.pending_tomb = None;
        match self.view {
            View::Overview => {}
            View::Tomb => {
                self.tomb = None;
                self.view = View::Level;
            }
            View::Level => {
                self.level = None;
                self.view = View::Section;
            }
            View::Section => {
                self.section = None;
                self.layout = None;
                self.level = None;
                self.tomb = None;
                self.overlays.directions = None;
                self.view = View::Overview;
                self.bus.emit(MapEvent::OverviewRestored);
            }
        }
        debug!(target: "cemetery::controller", view = ?self.view, "view.back");
        self.view
    }

    pub fn toggle_exhumation_form(&mut self) -> bool {
        self.overlays.exhumation_form = !self.overlays.exhumation_form;
        self.bus.emit(MapEvent::ExhumationFormToggled {
            open: self.overlays.exhumation_form,
        });
        self.overlays.exhumation_form
    }

    /// Show directions to the open tomb, or to the given plot id.
    pub fn show_directions(&mut self, plot_id: Option<&str>) -> Option<&[DirectionStep]> {
        let target = match plot_id {
            Some(id) => id.to_string(),
            None => match (&self.tomb, &self.section) {
                (Some(tomb), _) => tomb.plot.plot_id.clone(),
                (None, Some(section)) => section.section.clone(),
                (None, None) => return None,
            },
        };
        let steps = generate_directions(&target);
        self.bus.emit(MapEvent::DirectionsShown {
            plot_id: target,
            steps: steps.len(),
        });
        self.overlays.directions = Some(steps);
        self.overlays.directions.as_deref()
    }

    pub fn hide_directions(&mut self) {
        self.overlays.directions = None;
    }

    pub fn begin_refresh(&mut self) -> PendingRefresh {
        let token = self.issue_token();
        self.pending_refresh = Some(token);
        PendingRefresh { token }
    }

    /// Install a fresh plot list and repaint the whole map, unless a newer
    /// refresh has been started since.
    pub fn finish_refresh(&mut self, pending: PendingRefresh, plots: Vec<Plot>) -> Option<PaintReport> {
        if self.pending_refresh != Some(pending.token) {
            self.bus.emit(MapEvent::StaleResultDropped {
                token: pending.token,
            });
            return None;
        }
        self.pending_refresh = None;
        self.write_plots().replace_all(plots);
        Some(self.repaint_all())
    }

    pub async fn refresh(&mut self, store: &dyn PlotStore) -> Result<Option<PaintReport>, ControllerError> {
        let pending = self.begin_refresh();
        let plots = store.list_plots().await?;
        Ok(self.finish_refresh(pending, plots))
    }

    pub fn repaint_all(&self) -> PaintReport {
        let today = self.today();
        let plots = self.read_plots();
        let mut doc = self.lock_document();
        paint_document(&mut doc, &plots, today)
    }

    /// Record a written plot and repaint only its element.
    pub fn apply_plot(&mut self, plot: Plot) -> Option<ResolvedStatus> {
        let today = self.today();
        let resolved = {
            let mut doc = self.lock_document();
            paint_element(&mut doc, &plot.plot_id, Some(&plot), today)
        };
        if let Some(tomb) = self.tomb.as_mut() {
            if tomb.plot.plot_id.eq_ignore_ascii_case(&plot.plot_id) {
                tomb.resolved = resolve_status(Some(&plot), today);
                tomb.plot = plot.clone();
                tomb.placeholder = false;
            }
        }
        let status = resolve_status(Some(&plot), today).status;
        let plot_id = plot.plot_id.clone();
        self.write_plots().upsert(plot);
        self.bus.emit(MapEvent::PlotRepainted { plot_id, status });
        resolved
    }

    /// Apply a change notification from the plot store.
    pub fn apply_change(&mut self, change: PlotChange) -> Option<ResolvedStatus> {
        let plot = match change {
            PlotChange::Created { plot }
            | PlotChange::Updated { plot }
            | PlotChange::Cleared { plot } => plot,
        };
        self.apply_plot(plot)
    }

    /// Write an admin edit, then repaint the one affected identifier.
    pub async fn apply_admin_edit(
        &mut self,
        store: &dyn PlotStore,
        plot_id: &str,
        patch: PlotPatch,
    ) -> Result<Plot, ControllerError> {
        let plot = store.update_plot(plot_id, patch).await.map_err(|err| {
            warn!(target: "cemetery::controller", plot_id, error = %err, "admin.edit_failed");
            err
        })?;
        self.apply_plot(plot.clone());
        info!(target: "cemetery::controller", plot_id = %plot.plot_id, "admin.edit_applied");
        Ok(plot)
    }

    /// Clear a plot back to available (plots are never hard-deleted).
    pub async fn clear_plot(&mut self, store: &dyn PlotStore, plot_id: &str) -> Result<Plot, ControllerError> {
        let plot = store.delete_plot(plot_id).await?;
        self.apply_plot(plot.clone());
        info!(target: "cemetery::controller", plot_id = %plot.plot_id, "admin.plot_cleared");
        Ok(plot)
    }
}
