#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use cemetery_core::{CemeteryConfig, InMemoryPlotStore, MapDocument};
use chrono::NaiveDate;

static INIT: Once = Once::new();

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture("test_cemetery_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test cemetery config at {}",
            config_path.display()
        );

        std::env::set_var("CEMETERY_CONFIG_PATH", &config_path);
    });
}

pub fn test_config() -> CemeteryConfig {
    CemeteryConfig::from_file(&fixture("test_cemetery_config.json")).expect("test config parses")
}

pub fn fixture_map() -> MapDocument {
    let source = std::fs::read_to_string(fixture("test_map.svg")).expect("test map readable");
    MapDocument::parse(source)
}

pub fn fixture_store() -> InMemoryPlotStore {
    InMemoryPlotStore::from_json_file(&fixture("test_plots.json")).expect("test plots load")
}

pub fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date")
}
