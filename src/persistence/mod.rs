use std::path::{
    Path,
    PathBuf,
};

use tracing::info;

use crate::{
    core::SyncError,
    manifest::Manifest,
};

const APP_NAME: &str = "ankisync";
const MANIFEST_FILE: &str = "manifest.hjson";

pub fn get_app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManifestSource {
    File(PathBuf),
    Embedded,
}

/// An explicit path wins, then `<config dir>/ankisync/manifest.hjson`, then the built-in manifest.
pub fn locate_manifest(explicit: Option<&Path>, config_dir: Option<&Path>) -> ManifestSource {
    if let Some(path) = explicit {
        return ManifestSource::File(path.to_path_buf());
    }

    match config_dir.map(|dir| dir.join(MANIFEST_FILE)) {
        Some(path) if path.is_file() => ManifestSource::File(path),
        _ => ManifestSource::Embedded,
    }
}

/// Loads the manifest, optionally re-rooting its relative paths at `root`.
pub fn load_manifest(explicit: Option<&Path>, root: Option<&Path>) -> Result<Manifest, SyncError> {
    let config_dir = get_app_config_dir();
    load_manifest_from(locate_manifest(explicit, config_dir.as_deref()), root)
}

pub fn load_manifest_from(
    source: ManifestSource,
    root: Option<&Path>,
) -> Result<Manifest, SyncError> {
    let mut manifest = match &source {
        ManifestSource::File(path) => Manifest::load(path)?,
        ManifestSource::Embedded => Manifest::embedded(".")?,
    };

    if let Some(root) = root {
        manifest.root = root.to_path_buf();
    }

    match source {
        ManifestSource::File(path) => info!("Manifest loaded from: {}", path.display()),
        ManifestSource::Embedded => info!("Using built-in manifest"),
    }
    info!("Resolving local files against: {}", manifest.root.display());

    Ok(manifest)
}
