use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(
        "Cannot reach AnkiConnect at {endpoint}. Make sure that:\n\
         \x20 1. Anki is running\n\
         \x20 2. the AnkiConnect add-on is installed (code: 2055492159)\n\
         Underlying error: {reason}"
    )]
    Connection { endpoint: String, reason: String },

    #[error("AnkiConnect rejected '{action}': {message}")]
    Remote { action: String, message: String },

    #[error("Local resource not found: {}", .0.display())]
    MissingResource(PathBuf),

    #[error("Note type '{model}' has fields {remote:?} in Anki but {declared:?} are declared")]
    FieldDrift { model: String, declared: Vec<String>, remote: Vec<String> },

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HJson error: {0}")]
    HJson(#[from] serde_hjson::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Reqwest error: {0}")]
    Reqwest(Box<reqwest::Error>),
}

impl SyncError {
    /// True when the remote side refused an item because identical content already exists.
    pub fn is_duplicate(&self) -> bool {
        match self {
            SyncError::Remote { message, .. } => is_duplicate_rejection(message),
            _ => false,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, SyncError::Connection { .. })
    }
}

/// AnkiConnect has no error codes, so duplicate notes are recognised by the
/// wording of the rejection ("cannot create note because it is a duplicate").
pub fn is_duplicate_rejection(message: &str) -> bool {
    message.to_lowercase().contains("duplicate")
}

impl From<std::io::Error> for SyncError {
    fn from(error: std::io::Error) -> Self {
        SyncError::Io(Box::new(error))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        SyncError::Reqwest(Box::new(error))
    }
}
