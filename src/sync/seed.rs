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
        NewNote,
        NoteOptions,
        Transport,
    },
    core::SyncError,
    manifest::ExampleNote,
};

#[derive(Debug, Default)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
    /// 1-based example index and the reason it could not be added.
    pub failed: Vec<(usize, String)>,
    pub items: Vec<ItemOutcome>,
}

/// Adds example notes, creating their decks on demand.
///
/// One failing note never stops the others; only a lost connection does.
pub struct SeedReconciler<'a, T> {
    anki: &'a Anki<T>,
}

impl<'a, T: Transport> SeedReconciler<'a, T> {
    pub fn new(anki: &'a Anki<T>) -> Self {
        Self { anki }
    }

    pub async fn seed(&self, notes: &[ExampleNote]) -> Result<SeedReport, SyncError> {
        let mut report = SeedReport::default();

        for (i, note) in notes.iter().enumerate() {
            let index = i + 1;
            let label = format!("example {}", index);
            let mut progress = Progress::new("note", &label);
            progress.advance(Phase::Checking);

            if let Err(e) = self.ensure_deck(&note.deck).await {
                if e.is_connection() {
                    return Err(e);
                }
                warn!("Example {} could not be created: {}", index, e);
                report.failed.push((index, e.to_string()));
                report.items.push(progress.finish(ItemOutcome::Failed(e.to_string())));
                continue;
            }

            progress.advance(Phase::Creating);
            let outcome = match self.anki.add_note(&new_note(note)).await {
                Ok(Some(id)) => {
                    info!("Example {} created (id {})", index, id);
                    report.created += 1;
                    ItemOutcome::Created
                }
                Ok(None) => {
                    info!("Example {} was not added, it probably exists already", index);
                    progress.advance(Phase::Skipping);
                    report.skipped += 1;
                    ItemOutcome::Skipped
                }
                Err(e) if e.is_connection() => return Err(e),
                Err(e) if e.is_duplicate() => {
                    info!("Example {} already exists, skipping", index);
                    progress.advance(Phase::Skipping);
                    report.skipped += 1;
                    ItemOutcome::Skipped
                }
                Err(e) => {
                    warn!("Example {} could not be created: {}", index, e);
                    report.failed.push((index, e.to_string()));
                    ItemOutcome::Failed(e.to_string())
                }
            };

            report.items.push(progress.finish(outcome));
        }

        info!(
            "Examples: {} created, {} skipped, {} failed",
            report.created,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }

    async fn ensure_deck(&self, deck: &str) -> Result<(), SyncError> {
        let decks = self.anki.deck_names().await?;
        if !decks.iter().any(|d| d == deck) {
            self.anki.create_deck(deck).await?;
            info!("Created deck '{}'", deck);
        }
        Ok(())
    }
}

fn new_note(note: &ExampleNote) -> NewNote {
    NewNote {
        deck_name: note.deck.clone(),
        model_name: note.note_type.clone(),
        fields: note.fields.clone(),
        tags: note.tags.iter().cloned().collect(),
        options: NoteOptions { allow_duplicate: false },
    }
}
