//! Converges Anki towards a [`Manifest`]: media first, then note types, then example notes.

use std::fmt;

use tracing::{
    debug,
    error,
    info,
};

use crate::{
    anki::{
        Anki,
        Transport,
    },
    core::{
        ClientConfig,
        SyncError,
        SyncOptions,
    },
    manifest::Manifest,
};

pub mod media;
pub mod schema;
pub mod seed;

pub use media::{
    MediaReconciler,
    MediaReport,
};
pub use schema::{
    SchemaReconciler,
    SchemaReport,
};
pub use seed::{
    SeedReconciler,
    SeedReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Checking,
    Creating,
    Updating,
    Skipping,
    Done,
}

/// Tracks one declared item through
/// `NotStarted -> Checking -> {Creating | Updating | Skipping} -> Done`.
pub(crate) struct Progress<'a> {
    kind: &'static str,
    name: &'a str,
    phase: Phase,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(kind: &'static str, name: &'a str) -> Self {
        Self { kind, name, phase: Phase::NotStarted }
    }

    pub(crate) fn advance(&mut self, next: Phase) {
        debug!(kind = self.kind, item = self.name, from = ?self.phase, to = ?next, "phase change");
        self.phase = next;
    }

    /// Moves to `Done` and hands back the outcome for the report.
    pub(crate) fn finish(mut self, outcome: ItemOutcome) -> ItemOutcome {
        self.advance(Phase::Done);
        debug!(kind = self.kind, item = self.name, outcome = ?outcome, "item finished");
        outcome
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Created,
    Updated,
    Skipped,
    Missing,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct SyncSummary {
    pub anki_version: u32,
    pub media: Option<MediaReport>,
    pub schema: Option<SchemaReport>,
    pub seed: Option<SeedReport>,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AnkiConnect version {}", self.anki_version)?;
        if let Some(media) = &self.media {
            writeln!(
                f,
                "  media:      {} uploaded, {} already present, {} missing locally",
                media.uploaded, media.skipped, media.missing
            )?;
        }
        if let Some(schema) = &self.schema {
            writeln!(f, "  note types: {} created, {} updated", schema.created, schema.updated)?;
            for model in &schema.drifted {
                writeln!(f, "    field list of '{}' differs from Anki (not changed)", model)?;
            }
        }
        if let Some(seed) = &self.seed {
            writeln!(
                f,
                "  examples:   {} created, {} skipped, {} failed",
                seed.created,
                seed.skipped,
                seed.failed.len()
            )?;
            for (index, reason) in &seed.failed {
                writeln!(f, "    example {}: {}", index, reason)?;
            }
        }
        Ok(())
    }
}

/// Runs every enabled reconciler in order and stops at the first fatal error.
pub async fn run<T: Transport>(
    anki: &Anki<T>,
    manifest: &Manifest,
    config: &ClientConfig,
    options: &SyncOptions,
) -> Result<SyncSummary, SyncError> {
    let anki_version = anki.version().await?;
    info!("AnkiConnect connected (version {})", anki_version);

    let mut summary = SyncSummary { anki_version, ..Default::default() };

    if !options.skip_media {
        let reconciler =
            MediaReconciler::new(anki, &manifest.root, options, config.media_timeout());
        let report = reconciler.sync(&manifest.media).await.inspect_err(|e| {
            error!("Media sync failed: {}", e);
        })?;
        summary.media = Some(report);
    }

    if !options.skip_schema {
        let reconciler = SchemaReconciler::new(anki, &manifest.root, options);
        let report = reconciler.sync(&manifest.note_types).await.inspect_err(|e| {
            error!("Note type sync failed: {}", e);
        })?;
        summary.schema = Some(report);
    }

    if !options.skip_examples {
        let report = SeedReconciler::new(anki).seed(&manifest.examples).await.inspect_err(|e| {
            error!("Example note creation failed: {}", e);
        })?;
        summary.seed = Some(report);
    }

    Ok(summary)
}
