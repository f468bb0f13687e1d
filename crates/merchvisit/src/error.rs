use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MerchError {
    #[error("Pack error: {0}")]
    Pack(#[from] PackError),

    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),

    #[error("Photo error: {0}")]
    Photo(#[from] PhotoError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum PackError {
    #[error("Failed to read pack file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pack file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Structural validation failed. `first` is the message surfaced to the
    /// user; the full list is logged by the loader.
    #[error("Pack rejected: {first}")]
    Invalid { first: String, all: Vec<String> },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("No draft exists for visit '{0}'")]
    NotFound(String),

    #[error("Visit '{0}' is not in the current pack")]
    UnknownVisit(String),

    #[error("Visit '{0}' was cancelled in the job pack")]
    VisitCancelled(String),

    #[error("Draft for visit '{0}' is in a terminal state and cannot be modified")]
    Terminal(String),

    #[error("Visit '{visit_id}' references template '{template_id}' which is not in the current pack")]
    TemplateMissing {
        visit_id: String,
        template_id: String,
    },

    #[error("Question '{0}' is not part of the draft's template")]
    UnknownQuestion(String),

    #[error("Template '{0}' declares no furniture question")]
    TriggerMissing(String),

    #[error("Question '{key}' accepts at most {max} photos")]
    TooManyPhotos { key: String, max: u32 },

    #[error("Observation '{0}' not found")]
    ObservationNotFound(String),

    /// Completion validation failed. The draft stays `open`; `first` is the
    /// message shown to the user, the rest is logged by the repository.
    #[error("Cannot complete visit: {first}")]
    Incomplete { first: String, all: Vec<String> },

    #[error("No pack is loaded")]
    NoPack,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Photo error: {0}")]
    Photo(#[from] PhotoError),
}

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Photo '{0}' not found")]
    NotFound(String),

    #[error("Failed to re-encode image '{name}': {reason}")]
    Transcode { name: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No pack is loaded; import a pack before exporting")]
    NoPack,

    #[error("No completed or cancelled visits for {0}; nothing to export")]
    NothingToExport(String),

    #[error("Failed to build archive: {0}")]
    Archive(String),

    #[error("Failed to write archive '{path}': {source}")]
    WriteArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Stored document '{collection}/{key}' is corrupt: {source}")]
    CorruptDocument {
        collection: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, MerchError>;
