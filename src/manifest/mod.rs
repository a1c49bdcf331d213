//! Declarative description of what should exist in Anki.
//!
//! A manifest is an HJSON (or plain JSON) document with three sections:
//! `media`, `note_types` and `examples`. Relative paths inside it are resolved
//! against the manifest root, which is the directory holding the manifest file.

use std::{
    collections::{
        BTreeMap,
        BTreeSet,
        HashSet,
    },
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::core::{
    ClientConfig,
    SyncError,
};

pub const DEFAULT_MANIFEST: &str = include_str!("../../assets/manifest.hjson");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Cloze,
    Basic,
}

impl NoteKind {
    pub fn is_cloze(self) -> bool {
        self == NoteKind::Cloze
    }
}

/// Text that is either written inline or read from a UTF-8 file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextSource {
    Inline { inline: String },
    File { path: PathBuf },
}

impl TextSource {
    pub fn inline(text: impl Into<String>) -> Self {
        TextSource::Inline { inline: text.into() }
    }

    pub fn load(&self, root: &Path) -> Result<String, SyncError> {
        match self {
            TextSource::Inline { inline } => Ok(inline.clone()),
            TextSource::File { path } => {
                let path = root.join(path);
                if !path.is_file() {
                    return Err(SyncError::MissingResource(path));
                }
                Ok(fs::read_to_string(&path)?)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// File name inside Anki's media folder.
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    pub front: TextSource,
    pub back: TextSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTypeDefinition {
    pub name: String,
    pub kind: NoteKind,
    /// Order matters: it is the field order of the created note type.
    pub fields: Vec<String>,
    pub templates: Vec<TemplateSpec>,
    pub stylesheet: TextSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleNote {
    pub deck: String,
    pub note_type: String,
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub connection: Option<ClientConfig>,
    #[serde(default)]
    pub media: Vec<MediaAsset>,
    #[serde(default)]
    pub note_types: Vec<NoteTypeDefinition>,
    #[serde(default)]
    pub examples: Vec<ExampleNote>,
    #[serde(skip)]
    pub root: PathBuf,
}

impl Manifest {
    /// Parses HJSON text. JSON is accepted as well since HJSON is a superset.
    pub fn parse(text: &str, root: impl Into<PathBuf>) -> Result<Self, SyncError> {
        // Go through a JSON value so enums and untagged sources follow serde_json rules.
        let value: serde_hjson::Value = serde_hjson::from_str(text)?;
        let json = serde_json::to_value(&value)?;
        let mut manifest: Manifest = serde_json::from_value(json)?;
        manifest.root = root.into();
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.is_file() {
            return Err(SyncError::MissingResource(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&text, root)
    }

    pub fn embedded(root: impl Into<PathBuf>) -> Result<Self, SyncError> {
        Self::parse(DEFAULT_MANIFEST, root)
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn note_type(&self, name: &str) -> Option<&NoteTypeDefinition> {
        self.note_types.iter().find(|def| def.name == name)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let mut media_names = HashSet::new();
        for asset in &self.media {
            if asset.name.is_empty() {
                return Err(invalid(format!(
                    "media asset for {} has no name",
                    asset.path.display()
                )));
            }
            if !media_names.insert(asset.name.as_str()) {
                return Err(invalid(format!("media asset '{}' is declared twice", asset.name)));
            }
        }

        let mut type_names = HashSet::new();
        for def in &self.note_types {
            if !type_names.insert(def.name.as_str()) {
                return Err(invalid(format!("note type '{}' is declared twice", def.name)));
            }
            if def.fields.is_empty() {
                return Err(invalid(format!("note type '{}' has no fields", def.name)));
            }
            if def.templates.is_empty() {
                return Err(invalid(format!("note type '{}' has no templates", def.name)));
            }
            let mut field_names = HashSet::new();
            for field in &def.fields {
                if !field_names.insert(field.as_str()) {
                    return Err(invalid(format!(
                        "note type '{}' declares field '{}' twice",
                        def.name, field
                    )));
                }
            }
            let mut template_names = HashSet::new();
            for template in &def.templates {
                if !template_names.insert(template.name.as_str()) {
                    return Err(invalid(format!(
                        "note type '{}' declares template '{}' twice",
                        def.name, template.name
                    )));
                }
            }
        }

        for (index, note) in self.examples.iter().enumerate() {
            if note.deck.is_empty() || note.note_type.is_empty() {
                return Err(invalid(format!(
                    "example {} needs both a deck and a note type",
                    index + 1
                )));
            }
            // Note types that only exist remotely are checked by Anki itself.
            if let Some(def) = self.note_type(&note.note_type) {
                if let Some(unknown) = note.fields.keys().find(|f| !def.fields.contains(*f)) {
                    return Err(invalid(format!(
                        "example {} uses field '{}' which note type '{}' does not declare",
                        index + 1,
                        unknown,
                        def.name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> SyncError {
    SyncError::Manifest(message)
}
