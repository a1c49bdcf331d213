pub mod api;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use api::{
    note_query,
    Anki,
    AnkiConnect,
    Transport,
};
pub use types::{
    CardInfo,
    CardTemplate,
    CreateModelParams,
    NewNote,
    NoteOptions,
    TemplateContent,
};
