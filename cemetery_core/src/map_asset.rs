//! Loading the map asset, with a fallback file and an empty last resort.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{info, warn};

use crate::map_document::MapDocument;

#[derive(Debug, Error)]
pub enum MapAssetError {
    #[error("failed to read map asset from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("map asset {path:?} contains no identified elements")]
    NoElements { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Primary(PathBuf),
    Fallback(PathBuf),
    /// Neither path produced a usable document.
    Empty,
}

#[derive(Debug, Clone)]
pub struct MapAsset {
    pub document: MapDocument,
    pub source: AssetSource,
}

/// Read and parse a single map file.
pub fn read_map_document(path: &Path) -> Result<MapDocument, MapAssetError> {
    let contents = fs::read_to_string(path).map_err(|source| MapAssetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document = MapDocument::parse(contents);
    if document.is_empty() {
        return Err(MapAssetError::NoElements {
            path: path.to_path_buf(),
        });
    }
    Ok(document)
}

/// Load the map from the primary path, then the fallback, then give up with
/// an empty document. A missing map is never fatal.
pub fn load_map_asset(primary: &Path, fallback: Option<&Path>) -> MapAsset {
    match read_map_document(primary) {
        Ok(document) => {
            info!(
                target: "cemetery::map",
                path = %primary.display(),
                elements = document.len(),
                "map_asset.loaded=primary"
            );
            return MapAsset {
                document,
                source: AssetSource::Primary(primary.to_path_buf()),
            };
        }
        Err(err) => {
            warn!(target: "cemetery::map", error = %err, "map_asset.primary_failed");
        }
    }

    if let Some(fallback) = fallback {
        match read_map_document(fallback) {
            Ok(document) => {
                info!(
                    target: "cemetery::map",
                    path = %fallback.display(),
                    elements = document.len(),
                    "map_asset.loaded=fallback"
                );
                return MapAsset {
                    document,
                    source: AssetSource::Fallback(fallback.to_path_buf()),
                };
            }
            Err(err) => {
                warn!(target: "cemetery::map", error = %err, "map_asset.fallback_failed");
            }
        }
    }

    warn!(target: "cemetery::map", "map_asset.loaded=empty");
    MapAsset {
        document: MapDocument::empty(),
        source: AssetSource::Empty,
    }
}
