//! Core logic for the interactive cemetery map.
//!
//! Maps SVG element ids to sections and tombs, derives deterministic tomb
//! layouts, resolves plot status colours, paints them onto the map document
//! and drives the overview / section / level / tomb view state. Storage and
//! delivery sit behind async traits ([`PlotStore`], [`ExhumationStore`],
//! [`NotificationDispatch`]).

pub mod config;
pub mod controller;
mod directions;
pub mod events;
pub mod exhumation;
mod identifier;
mod layout;
pub mod map_asset;
mod map_document;
pub mod notify;
pub mod painter;
mod plot_grid;
mod status;
pub mod store;

pub use config::{load_config, load_config_from_env, CemeteryConfig, ConfigError, ConfigMetadata};
pub use controller::{
    ClickOutcome, ControllerError, MapController, Overlays, PendingRefresh, PendingTomb, TombDetail,
    View,
};
pub use directions::{generate_directions, render_directions, DirectionStep};
pub use events::{EventBus, MapEvent};
pub use exhumation::{
    transition, ExhumationDraft, ExhumationError, ExhumationService, ExhumationStore, FieldError,
    LocalRequestStore, OfficeNotice, ValidationErrors,
};
pub use identifier::{
    format_plot_id, is_decorative, is_plot_element, parse_identifier, section_of, BlockSide,
    ParsedIdentifier, PlotKind, PLOT_ELEMENT_PREFIXES, SPECIAL_SECTIONS,
};
pub use layout::{
    generate_layout, section_seed, Rect, SectionLayout, SectionPolicy, SectionSeed, TombDescriptor,
    PLOT_HEIGHT, PLOT_SPACING, PLOT_WIDTH,
};
pub use map_asset::{load_map_asset, read_map_document, AssetSource, MapAsset, MapAssetError};
pub use map_document::{id_variants, MapDocument, MapElement};
pub use notify::{dispatch_detached, LogNotifier, Notification, NotificationDispatch, NotifyError};
pub use painter::{
    paint_document, paint_element, painted_status, PaintReport, PlotIndex, RepaintLoop,
    SharedDocument, SharedPlots, STATUS_ATTRIBUTE,
};
pub use plot_grid::{generate_plot_grid, GridKind, PlotCell, PlotGrid};
pub use status::{
    colors_for, parse_interment_date, resolve_status, resolve_status_now, ResolvedStatus,
    StatusColors, AVAILABLE_COLORS, EXHUMED_COLORS, OCCUPIED_COLORS, RESERVED_COLORS,
};
pub use store::{ChangeFeed, InMemoryPlotStore, PlotStore, PlotSubscription, StoreError};
