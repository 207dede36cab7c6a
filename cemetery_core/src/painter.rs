//! Applies resolved plot colours to the map document.
//!
//! Painting only annotates the document; plot records are never touched.
//! Because the document can be replaced or edited from outside, the
//! [`RepaintLoop`] re-applies colours periodically until it is stopped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use plot_proto::{Plot, PlotStatus};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::identifier::is_plot_element;
use crate::map_document::{id_variants, MapDocument};
use crate::status::{resolve_status, ResolvedStatus};

/// Attribute carrying the resolved status on painted elements.
pub const STATUS_ATTRIBUTE: &str = "data-status";

pub type SharedDocument = Arc<Mutex<MapDocument>>;
pub type SharedPlots = Arc<RwLock<PlotIndex>>;

/// Plot records keyed by id, with case-tolerant lookup.
#[derive(Debug, Clone, Default)]
pub struct PlotIndex {
    plots: HashMap<String, Plot>,
}

impl PlotIndex {
    pub fn from_plots(plots: impl IntoIterator<Item = Plot>) -> Self {
        let mut index = Self::default();
        for plot in plots {
            index.upsert(plot);
        }
        index
    }

    pub fn upsert(&mut self, plot: Plot) {
        self.plots.insert(plot.plot_id.clone(), plot);
    }

    pub fn replace_all(&mut self, plots: impl IntoIterator<Item = Plot>) {
        *self = Self::from_plots(plots);
    }

    pub fn get(&self, id: &str) -> Option<&Plot> {
        id_variants(id)
            .into_iter()
            .find_map(|candidate| self.plots.get(&candidate))
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plot> {
        self.plots.values()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaintReport {
    pub painted: usize,
    pub with_record: usize,
    pub by_status: HashMap<PlotStatus, usize>,
}

impl PaintReport {
    pub fn count(&self, status: PlotStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

fn apply(doc: &mut MapDocument, id: &str, resolved: ResolvedStatus) -> bool {
    let Some(element) = doc.find_mut(id) else {
        return false;
    };
    element.set_attribute("fill", resolved.fill);
    element.set_attribute("stroke", resolved.stroke);
    element.set_attribute(STATUS_ATTRIBUTE, resolved.status.as_str());
    true
}

/// Colour every plot element in the document.
pub fn paint_document(doc: &mut MapDocument, plots: &PlotIndex, today: NaiveDate) -> PaintReport {
    let targets: Vec<String> = doc
        .ids()
        .filter(|id| is_plot_element(id))
        .map(str::to_string)
        .collect();

    let mut report = PaintReport::default();
    for id in targets {
        let plot = plots.get(&id);
        let resolved = resolve_status(plot, today);
        if apply(doc, &id, resolved) {
            report.painted += 1;
            if plot.is_some() {
                report.with_record += 1;
            }
            *report.by_status.entry(resolved.status).or_default() += 1;
        }
    }
    report
}

/// Repaint a single identifier, e.g. after an admin edit.
///
/// Returns `None` when the document has no element for the id.
pub fn paint_element(
    doc: &mut MapDocument,
    id: &str,
    plot: Option<&Plot>,
    today: NaiveDate,
) -> Option<ResolvedStatus> {
    let resolved = resolve_status(plot, today);
    apply(doc, id, resolved).then_some(resolved)
}

/// Status last painted onto an element, if any.
pub fn painted_status(doc: &MapDocument, id: &str) -> Option<PlotStatus> {
    doc.get(id)
        .and_then(|element| element.attribute(STATUS_ATTRIBUTE))
        .and_then(|raw| raw.parse().ok())
}

/// Background task that re-applies plot colours at a fixed interval.
///
/// Stop it when the map view goes away; dropping the loop also aborts it.
pub struct RepaintLoop {
    handle: Option<JoinHandle<()>>,
    passes: Arc<AtomicU64>,
}

impl RepaintLoop {
    /// Must be called from within a tokio runtime.
    pub fn spawn(document: SharedDocument, plots: SharedPlots, interval: Duration) -> Self {
        let passes = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&passes);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let today = chrono::Local::now().date_naive();
                let report = {
                    let plots = match plots.read() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    let mut doc = match document.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    paint_document(&mut doc, &plots, today)
                };
                let pass = counter.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(
                    target: "cemetery::painter",
                    pass,
                    painted = report.painted,
                    "painter.repaint"
                );
            }
        });
        debug!(
            target: "cemetery::painter",
            interval_ms = interval.as_millis() as u64,
            "painter.loop_started"
        );
        Self {
            handle: Some(handle),
            passes,
        }
    }

    /// Number of completed repaint passes.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(
                target: "cemetery::painter",
                passes = self.passes(),
                "painter.loop_stopped"
            );
        }
    }
}

impl Drop for RepaintLoop {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg>
  <rect id="lb-10a"/>
  <rect id="LB-10B"/>
  <rect id="Veterans"/>
  <rect id="rect110"/>
  <rect id="office"/>
</svg>"#;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date")
    }

    fn plots() -> PlotIndex {
        PlotIndex::from_plots([
            Plot {
                occupant_name: "Ana Cruz".to_string(),
                ..Plot::placeholder("lb-10a")
            },
            Plot {
                date_of_interment: Some("2030-01-01".to_string()),
                status: None,
                ..Plot::placeholder("lb-10b")
            },
        ])
    }

    #[test]
    fn paints_only_plot_elements() {
        let mut doc = MapDocument::parse(SVG);
        let report = paint_document(&mut doc, &plots(), today());
        assert_eq!(report.painted, 3);
        assert_eq!(report.with_record, 2);
        assert_eq!(painted_status(&doc, "lb-10a"), Some(PlotStatus::Occupied));
        assert_eq!(painted_status(&doc, "LB-10B"), Some(PlotStatus::Reserved));
        assert_eq!(painted_status(&doc, "Veterans"), Some(PlotStatus::Available));
        assert_eq!(painted_status(&doc, "rect110"), None);
        assert_eq!(painted_status(&doc, "office"), None);
        assert_eq!(report.count(PlotStatus::Available), 1);
    }

    #[test]
    fn targeted_repaint_touches_one_element() {
        let mut doc = MapDocument::parse(SVG);
        paint_document(&mut doc, &PlotIndex::default(), today());
        let plot = Plot {
            status: Some("exhumed".to_string()),
            ..Plot::placeholder("lb-10a")
        };
        let resolved = paint_element(&mut doc, "LB-10A", Some(&plot), today());
        assert_eq!(resolved.map(|r| r.status), Some(PlotStatus::Exhumed));
        assert_eq!(painted_status(&doc, "lb-10a"), Some(PlotStatus::Exhumed));
        assert_eq!(painted_status(&doc, "LB-10B"), Some(PlotStatus::Available));
        assert_eq!(paint_element(&mut doc, "lb-99z", None, today()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn repaint_loop_heals_external_changes_until_stopped() {
        let document: SharedDocument = Arc::new(Mutex::new(MapDocument::parse(SVG)));
        let index: SharedPlots = Arc::new(RwLock::new(plots()));
        let repaint = RepaintLoop::spawn(
            Arc::clone(&document),
            Arc::clone(&index),
            Duration::from_secs(3),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(repaint.passes() >= 1);
        assert_eq!(
            painted_status(&document.lock().expect("doc"), "lb-10a"),
            Some(PlotStatus::Occupied)
        );

        document.lock().expect("doc").replace_source(SVG);
        assert_eq!(painted_status(&document.lock().expect("doc"), "lb-10a"), None);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(
            painted_status(&document.lock().expect("doc"), "lb-10a"),
            Some(PlotStatus::Occupied)
        );
        assert!(repaint.is_running());

        let passes = repaint.passes();
        repaint.stop();
        document.lock().expect("doc").replace_source(SVG);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(painted_status(&document.lock().expect("doc"), "lb-10a"), None);
        assert!(passes >= 2);
    }
}
