use std::{
    path::Path,
    time::Duration,
};

use base64::{
    engine::general_purpose::STANDARD,
    Engine,
};
use tracing::{
    info,
    warn,
};

use super::{
    ItemOutcome,
    Phase,
    Progress,
};
use crate::{
    anki::{
        Anki,
        Transport,
    },
    core::{
        SyncError,
        SyncOptions,
    },
    manifest::MediaAsset,
};

#[derive(Debug, Default)]
pub struct MediaReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub missing: usize,
    pub items: Vec<(String, ItemOutcome)>,
}

impl MediaReport {
    fn record(&mut self, name: &str, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Created | ItemOutcome::Updated => self.uploaded += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Missing => self.missing += 1,
            ItemOutcome::Failed(_) => {}
        }
        self.items.push((name.to_string(), outcome));
    }
}

/// Uploads declared media files that Anki does not have yet.
///
/// The first failed upload aborts the whole media run.
pub struct MediaReconciler<'a, T> {
    anki: &'a Anki<T>,
    root: &'a Path,
    force_all: bool,
    default_timeout: Duration,
}

impl<'a, T: Transport> MediaReconciler<'a, T> {
    pub fn new(
        anki: &'a Anki<T>,
        root: &'a Path,
        options: &SyncOptions,
        default_timeout: Duration,
    ) -> Self {
        Self { anki, root, force_all: options.force_media, default_timeout }
    }

    pub async fn sync(&self, assets: &[MediaAsset]) -> Result<MediaReport, SyncError> {
        let mut report = MediaReport::default();

        for asset in assets {
            let outcome = self.sync_asset(asset).await?;
            match outcome {
                ItemOutcome::Created => info!("Uploaded {}", asset.name),
                ItemOutcome::Skipped => info!("{} already exists, skipping", asset.name),
                _ => {}
            }
            report.record(&asset.name, outcome);
        }

        info!(
            "Media: {} uploaded, {} skipped, {} missing locally",
            report.uploaded, report.skipped, report.missing
        );
        Ok(report)
    }

    async fn sync_asset(&self, asset: &MediaAsset) -> Result<ItemOutcome, SyncError> {
        let mut progress = Progress::new("media", &asset.name);
        let path = self.root.join(&asset.path);

        if !path.is_file() {
            warn!("Skipping {}: {} does not exist", asset.name, path.display());
            return Ok(progress.finish(ItemOutcome::Missing));
        }

        progress.advance(Phase::Checking);
        let force = asset.force || self.force_all;
        if !force && self.exists_remotely(&asset.name).await? {
            progress.advance(Phase::Skipping);
            return Ok(progress.finish(ItemOutcome::Skipped));
        }

        progress.advance(Phase::Creating);
        let bytes = tokio::fs::read(&path).await?;
        let data = STANDARD.encode(&bytes);
        let timeout = asset.timeout_secs.map(Duration::from_secs).unwrap_or(self.default_timeout);
        self.anki.store_media_file(&asset.name, &data, timeout).await?;

        Ok(progress.finish(ItemOutcome::Created))
    }

    async fn exists_remotely(&self, name: &str) -> Result<bool, SyncError> {
        match self.anki.media_file_names(name).await {
            // The lookup is a glob, so only an exact name counts.
            Ok(names) => Ok(names.iter().any(|n| n == name)),
            Err(e) if e.is_connection() => Err(e),
            Err(e) => {
                warn!("Could not check whether {} exists, uploading anyway: {}", name, e);
                Ok(false)
            }
        }
    }
}
