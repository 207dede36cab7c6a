//! Data contracts shared between the cemetery core, its stores and front ends.
//!
//! Everything here is plain serde data. Behaviour that interprets these
//! records (status inference, colouring, layout) lives in `cemetery_core`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical occupancy state of a plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotStatus {
    Available,
    Occupied,
    Reserved,
    Exhumed,
}

impl PlotStatus {
    pub const ALL: [PlotStatus; 4] = [
        PlotStatus::Available,
        PlotStatus::Occupied,
        PlotStatus::Reserved,
        PlotStatus::Exhumed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlotStatus::Available => "available",
            PlotStatus::Occupied => "occupied",
            PlotStatus::Reserved => "reserved",
            PlotStatus::Exhumed => "exhumed",
        }
    }
}

impl fmt::Display for PlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown plot status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for PlotStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(PlotStatus::Available),
            "occupied" => Ok(PlotStatus::Occupied),
            "reserved" => Ok(PlotStatus::Reserved),
            "exhumed" => Ok(PlotStatus::Exhumed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A single burial unit as stored by the plot store.
///
/// `status` is kept as the raw stored string: an unrecognised value must not
/// fail deserialization, it is simply ignored during status resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plot {
    pub plot_id: String,
    #[serde(default)]
    pub occupant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_interment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_of_kin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Plot {
    /// An unoccupied plot with only its identifier set.
    pub fn placeholder(plot_id: impl Into<String>) -> Self {
        Self {
            plot_id: plot_id.into(),
            occupant_name: String::new(),
            status: Some(PlotStatus::Available.as_str().to_string()),
            date_of_interment: None,
            section: None,
            level: None,
            age: None,
            religion: None,
            next_of_kin: None,
            contact_number: None,
            notes: None,
        }
    }

    /// Reset every descriptive field and mark the plot available.
    ///
    /// Plots are never removed from the store; this is what "delete" means.
    pub fn clear(&mut self) {
        let section = self.section.take();
        let level = self.level.take();
        *self = Plot::placeholder(std::mem::take(&mut self.plot_id));
        self.section = section;
        self.level = level;
    }

    pub fn apply_patch(&mut self, patch: &PlotPatch) {
        if let Some(name) = &patch.occupant_name {
            self.occupant_name = name.trim().to_string();
        }
        apply_text(&mut self.status, &patch.status);
        apply_text(&mut self.date_of_interment, &patch.date_of_interment);
        apply_text(&mut self.section, &patch.section);
        apply_text(&mut self.religion, &patch.religion);
        apply_text(&mut self.next_of_kin, &patch.next_of_kin);
        apply_text(&mut self.contact_number, &patch.contact_number);
        apply_text(&mut self.notes, &patch.notes);
        if let Some(level) = patch.level {
            self.level = Some(level);
        }
        if let Some(age) = patch.age {
            self.age = Some(age);
        }
    }

    pub fn is_occupied(&self) -> bool {
        !self.occupant_name.trim().is_empty()
    }
}

fn apply_text(target: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        let trimmed = value.trim();
        *target = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
}

/// Partial update applied by an admin edit. `Some("")` clears a text field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotPatch {
    pub occupant_name: Option<String>,
    pub status: Option<String>,
    pub date_of_interment: Option<String>,
    pub section: Option<String>,
    pub level: Option<u8>,
    pub age: Option<u32>,
    pub religion: Option<String>,
    pub next_of_kin: Option<String>,
    pub contact_number: Option<String>,
    pub notes: Option<String>,
}

impl PlotPatch {
    pub fn is_empty(&self) -> bool {
        self == &PlotPatch::default()
    }
}

/// Change notification emitted by a plot store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlotChange {
    Created { plot: Plot },
    Updated { plot: Plot },
    Cleared { plot: Plot },
}

impl PlotChange {
    pub fn plot(&self) -> &Plot {
        match self {
            PlotChange::Created { plot }
            | PlotChange::Updated { plot }
            | PlotChange::Cleared { plot } => plot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhumationStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl ExhumationStatus {
    pub fn can_transition_to(self, next: ExhumationStatus) -> bool {
        matches!(
            (self, next),
            (ExhumationStatus::Pending, ExhumationStatus::Approved)
                | (ExhumationStatus::Pending, ExhumationStatus::Rejected)
                | (ExhumationStatus::Approved, ExhumationStatus::Completed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExhumationStatus::Pending => "pending",
            ExhumationStatus::Approved => "approved",
            ExhumationStatus::Rejected => "rejected",
            ExhumationStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ExhumationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which store accepted an exhumation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestOrigin {
    Remote,
    LocalFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhumationRequest {
    pub id: String,
    pub plot_id: String,
    pub requester_name: String,
    pub requester_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_plot: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
    pub status: ExhumationStatus,
    pub created_at: DateTime<Utc>,
    pub origin: RequestOrigin,
}

pub fn encode_plots_json(plots: &[Plot]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(plots)
}

pub fn decode_plots_json(data: &str) -> serde_json::Result<Vec<Plot>> {
    serde_json::from_str(data)
}

pub fn encode_requests_json(requests: &[ExhumationRequest]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(requests)
}

pub fn decode_requests_json(data: &str) -> serde_json::Result<Vec<ExhumationRequest>> {
    serde_json::from_str(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!("Occupied".parse::<PlotStatus>(), Ok(PlotStatus::Occupied));
        assert_eq!(" RESERVED ".parse::<PlotStatus>(), Ok(PlotStatus::Reserved));
        assert!("pending".parse::<PlotStatus>().is_err());
    }

    #[test]
    fn clear_keeps_identity_and_location() {
        let mut plot = Plot {
            occupant_name: "Maria Santos".to_string(),
            status: Some("occupied".to_string()),
            date_of_interment: Some("2020-03-01".to_string()),
            section: Some("lb-10".to_string()),
            level: Some(1),
            notes: Some("flowers weekly".to_string()),
            ..Plot::placeholder("lb-10a")
        };
        plot.clear();
        assert_eq!(plot.plot_id, "lb-10a");
        assert_eq!(plot.section.as_deref(), Some("lb-10"));
        assert_eq!(plot.level, Some(1));
        assert!(!plot.is_occupied());
        assert_eq!(plot.status.as_deref(), Some("available"));
        assert!(plot.notes.is_none());
        assert!(plot.date_of_interment.is_none());
    }

    #[test]
    fn patch_with_empty_string_clears_field() {
        let mut plot = Plot {
            notes: Some("old".to_string()),
            ..Plot::placeholder("rb-2c")
        };
        let patch = PlotPatch {
            occupant_name: Some("  Jose Rizal ".to_string()),
            notes: Some(String::new()),
            ..PlotPatch::default()
        };
        plot.apply_patch(&patch);
        assert_eq!(plot.occupant_name, "Jose Rizal");
        assert!(plot.notes.is_none());
    }

    #[test]
    fn plot_json_tolerates_unknown_status_and_missing_fields() {
        let plots = decode_plots_json(r#"[{"plot_id":"veterans-level1-a","status":"pending"}]"#)
            .expect("plots decode");
        assert_eq!(plots[0].status.as_deref(), Some("pending"));
        assert!(plots[0].occupant_name.is_empty());
    }

    #[test]
    fn exhumation_transitions() {
        assert!(ExhumationStatus::Pending.can_transition_to(ExhumationStatus::Approved));
        assert!(ExhumationStatus::Approved.can_transition_to(ExhumationStatus::Completed));
        assert!(!ExhumationStatus::Rejected.can_transition_to(ExhumationStatus::Approved));
        assert!(!ExhumationStatus::Pending.can_transition_to(ExhumationStatus::Completed));
    }
}
