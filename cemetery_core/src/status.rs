//! Plot status resolution and the colours each status is drawn with.

use chrono::{DateTime, Local, NaiveDate};
use plot_proto::{Plot, PlotStatus};
use serde::Serialize;

/// Fill and stroke pair used to draw a plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusColors {
    pub fill: &'static str,
    pub stroke: &'static str,
}

pub const AVAILABLE_COLORS: StatusColors = StatusColors {
    fill: "#16a34a",
    stroke: "#15803d",
};
pub const OCCUPIED_COLORS: StatusColors = StatusColors {
    fill: "#dc2626",
    stroke: "#b91c1c",
};
pub const RESERVED_COLORS: StatusColors = StatusColors {
    fill: "#d97706",
    stroke: "#c2410c",
};
pub const EXHUMED_COLORS: StatusColors = StatusColors {
    fill: "#6b7280",
    stroke: "#4b5563",
};

pub fn colors_for(status: PlotStatus) -> StatusColors {
    match status {
        PlotStatus::Available => AVAILABLE_COLORS,
        PlotStatus::Occupied => OCCUPIED_COLORS,
        PlotStatus::Reserved => RESERVED_COLORS,
        PlotStatus::Exhumed => EXHUMED_COLORS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedStatus {
    pub status: PlotStatus,
    pub fill: &'static str,
    pub stroke: &'static str,
}

impl From<PlotStatus> for ResolvedStatus {
    fn from(status: PlotStatus) -> Self {
        let colors = colors_for(status);
        Self {
            status,
            fill: colors.fill,
            stroke: colors.stroke,
        }
    }
}

/// Resolve the display status of a plot as of `today`.
///
/// Rules apply in order, first match wins: missing record, explicit
/// non-available status, occupant name, interment date, available.
/// Unrecognised status strings and unparseable dates are ignored.
pub fn resolve_status(plot: Option<&Plot>, today: NaiveDate) -> ResolvedStatus {
    let Some(plot) = plot else {
        return PlotStatus::Available.into();
    };

    if let Some(explicit) = plot
        .status
        .as_deref()
        .and_then(|raw| raw.parse::<PlotStatus>().ok())
    {
        if explicit != PlotStatus::Available {
            return explicit.into();
        }
    }

    if plot.is_occupied() {
        return PlotStatus::Occupied.into();
    }

    if let Some(date) = plot.date_of_interment.as_deref().and_then(parse_interment_date) {
        return if date > today {
            PlotStatus::Reserved.into()
        } else {
            PlotStatus::Occupied.into()
        };
    }

    PlotStatus::Available.into()
}

/// [`resolve_status`] against the local calendar date.
pub fn resolve_status_now(plot: Option<&Plot>) -> ResolvedStatus {
    resolve_status(plot, Local::now().date_naive())
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; the time part is dropped.
pub fn parse_interment_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|stamp| stamp.date_naive())
        })
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date")
    }

    fn plot() -> Plot {
        Plot {
            status: None,
            ..Plot::placeholder("lb-10a")
        }
    }

    #[test]
    fn missing_plot_is_available() {
        let resolved = resolve_status(None, today());
        assert_eq!(resolved.status, PlotStatus::Available);
        assert_eq!(resolved.fill, "#16a34a");
        assert_eq!(resolved.stroke, "#15803d");
    }

    #[test]
    fn explicit_status_wins_over_inference() {
        let plot = Plot {
            status: Some("Exhumed".to_string()),
            occupant_name: "Ana Cruz".to_string(),
            ..plot()
        };
        let resolved = resolve_status(Some(&plot), today());
        assert_eq!(resolved.status, PlotStatus::Exhumed);
        assert_eq!(resolved.fill, "#6b7280");
    }

    #[test]
    fn occupant_name_means_occupied() {
        let plot = Plot {
            status: Some("available".to_string()),
            occupant_name: "  Ana Cruz ".to_string(),
            date_of_interment: Some("2099-01-01".to_string()),
            ..plot()
        };
        assert_eq!(resolve_status(Some(&plot), today()).status, PlotStatus::Occupied);
    }

    #[test]
    fn whitespace_name_is_not_an_occupant() {
        let plot = Plot {
            occupant_name: "   ".to_string(),
            ..plot()
        };
        assert_eq!(resolve_status(Some(&plot), today()).status, PlotStatus::Available);
    }

    #[test]
    fn interment_date_splits_reserved_and_occupied() {
        let future = Plot {
            date_of_interment: Some("2024-06-16".to_string()),
            ..plot()
        };
        let same_day = Plot {
            date_of_interment: Some("2024-06-15T23:30:00+08:00".to_string()),
            ..plot()
        };
        let past = Plot {
            date_of_interment: Some("1999-12-31".to_string()),
            ..plot()
        };
        let resolved = resolve_status(Some(&future), today());
        assert_eq!(resolved.status, PlotStatus::Reserved);
        assert_eq!((resolved.fill, resolved.stroke), ("#d97706", "#c2410c"));
        assert_eq!(resolve_status(Some(&same_day), today()).status, PlotStatus::Occupied);
        let resolved = resolve_status(Some(&past), today());
        assert_eq!(resolved.status, PlotStatus::Occupied);
        assert_eq!((resolved.fill, resolved.stroke), ("#dc2626", "#b91c1c"));
    }

    #[test]
    fn malformed_date_and_unknown_status_default_to_available() {
        let plot = Plot {
            status: Some("pending".to_string()),
            date_of_interment: Some("next tuesday".to_string()),
            ..plot()
        };
        let resolved = resolve_status(Some(&plot), today());
        assert_eq!(resolved.status, PlotStatus::Available);
        assert_eq!(resolved.fill, "#16a34a");
    }

    #[test]
    fn unknown_status_still_respects_occupant() {
        let plot = Plot {
            status: Some("pending".to_string()),
            occupant_name: "Ana Cruz".to_string(),
            ..plot()
        };
        assert_eq!(resolve_status(Some(&plot), today()).status, PlotStatus::Occupied);
    }
}
