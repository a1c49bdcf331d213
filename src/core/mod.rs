pub mod config;
pub mod errors;

pub use config::{
    ClientConfig,
    SyncOptions,
};
pub use errors::{
    is_duplicate_rejection,
    SyncError,
};
