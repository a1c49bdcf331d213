use std::{
    collections::{
        BTreeMap,
        HashSet,
    },
    path::Path,
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
        CardTemplate,
        CreateModelParams,
        TemplateContent,
        Transport,
    },
    core::{
        SyncError,
        SyncOptions,
    },
    manifest::NoteTypeDefinition,
};

#[derive(Debug, Default)]
pub struct SchemaReport {
    pub created: usize,
    pub updated: usize,
    /// Existing note types whose field list differs from the declaration.
    pub drifted: Vec<String>,
    pub items: Vec<(String, ItemOutcome)>,
}

/// Creates missing note types and rewrites styling and templates of existing ones.
///
/// Fields of an existing note type are never changed. Remote templates that are
/// not declared are left alone.
pub struct SchemaReconciler<'a, T> {
    anki: &'a Anki<T>,
    root: &'a Path,
    strict_fields: bool,
}

struct Resolved {
    css: String,
    templates: Vec<CardTemplate>,
}

impl<'a, T: Transport> SchemaReconciler<'a, T> {
    pub fn new(anki: &'a Anki<T>, root: &'a Path, options: &SyncOptions) -> Self {
        Self { anki, root, strict_fields: options.strict_fields }
    }

    pub async fn sync(&self, defs: &[NoteTypeDefinition]) -> Result<SchemaReport, SyncError> {
        let mut report = SchemaReport::default();
        if defs.is_empty() {
            return Ok(report);
        }

        // Fetched once; nothing else is expected to touch note types during a run.
        let mut existing: HashSet<String> = self.anki.model_names().await?.into_iter().collect();

        for def in defs {
            let mut progress = Progress::new("note type", &def.name);
            progress.advance(Phase::Checking);
            let resolved = self.resolve(def)?;

            let outcome = if existing.contains(&def.name) {
                progress.advance(Phase::Updating);
                self.update(def, resolved).await?;
                if !self.check_fields(def).await? {
                    report.drifted.push(def.name.clone());
                }
                report.updated += 1;
                info!(
                    "Updated note type '{}' (styling and {} templates)",
                    def.name,
                    def.templates.len()
                );
                ItemOutcome::Updated
            } else {
                progress.advance(Phase::Creating);
                self.create(def, resolved).await?;
                existing.insert(def.name.clone());
                report.created += 1;
                info!("Created note type '{}'", def.name);
                ItemOutcome::Created
            };

            report.items.push((def.name.clone(), progress.finish(outcome)));
        }

        Ok(report)
    }

    fn resolve(&self, def: &NoteTypeDefinition) -> Result<Resolved, SyncError> {
        let css = def.stylesheet.load(self.root)?;
        let templates = def
            .templates
            .iter()
            .map(|t| {
                Ok(CardTemplate {
                    name: t.name.clone(),
                    front: t.front.load(self.root)?,
                    back: t.back.load(self.root)?,
                })
            })
            .collect::<Result<Vec<_>, SyncError>>()?;
        Ok(Resolved { css, templates })
    }

    async fn create(&self, def: &NoteTypeDefinition, resolved: Resolved) -> Result<(), SyncError> {
        let params = CreateModelParams {
            model_name: def.name.clone(),
            in_order_fields: def.fields.clone(),
            css: resolved.css,
            is_cloze: def.kind.is_cloze(),
            card_templates: resolved.templates,
        };
        self.anki.create_model(&params).await
    }

    async fn update(&self, def: &NoteTypeDefinition, resolved: Resolved) -> Result<(), SyncError> {
        self.anki.update_model_styling(&def.name, &resolved.css).await?;

        let templates: BTreeMap<String, TemplateContent> = resolved
            .templates
            .into_iter()
            .map(|t| (t.name, TemplateContent { front: t.front, back: t.back }))
            .collect();
        self.anki.update_model_templates(&def.name, &templates).await
    }

    /// Returns false when Anki's field list differs from the declared one.
    async fn check_fields(&self, def: &NoteTypeDefinition) -> Result<bool, SyncError> {
        let remote = match self.anki.model_field_names(&def.name).await {
            Ok(fields) => fields,
            Err(e) if e.is_connection() => return Err(e),
            Err(e) => {
                warn!("Could not read fields of '{}': {}", def.name, e);
                return Ok(true);
            }
        };

        if remote == def.fields {
            return Ok(true);
        }

        if self.strict_fields {
            return Err(SyncError::FieldDrift {
                model: def.name.clone(),
                declared: def.fields.clone(),
                remote,
            });
        }

        warn!(
            "Note type '{}' has fields {:?} in Anki but {:?} are declared; fields are not updated",
            def.name, remote, def.fields
        );
        Ok(false)
    }
}
