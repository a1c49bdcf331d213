//! Sets up Anki through AnkiConnect: uploads media assets, creates or updates
//! note types and seeds example notes. Every step is safe to run again.

pub mod anki;
pub mod core;
pub mod inspect;
pub mod manifest;
pub mod persistence;
pub mod sync;

pub use crate::core::{
    ClientConfig,
    SyncError,
    SyncOptions,
};
pub use anki::{
    Anki,
    AnkiConnect,
    Transport,
};
pub use manifest::Manifest;
pub use sync::{
    run,
    SyncSummary,
};
