use thiserror::Error;

use crate::data_structs::typedef::Lid;

/// Errors surfaced by the locus store and the query engine.
///
/// Every variant is raised to the immediate caller; the crate performs no
/// silent retries and never suppresses partial results.
#[derive(Debug, Error)]
pub enum LocusError {
    /// A lookup by LID or by name found no record.
    #[error("no locus found for {0}")]
    MissingLocus(String),

    /// Strand-aware logic was requested on an unrecognized strand.
    #[error("unrecognized strand '{0}' where '+' or '-' is required")]
    Strand(char),

    /// A locus or probe interval collapsed to zero width.
    #[error("zero-width window {chromosome}:{position}")]
    ZeroWindow { chromosome: String, position: u32 },

    /// Interval coordinates are out of order.
    #[error("invalid interval: start {start} > end {end}")]
    InvalidCoordinates { start: u32, end: u32 },

    /// Mutually exclusive query flags were set together.
    #[error("conflicting flags: {0}")]
    ConflictingFlags(&'static str),

    /// An attribute key was inserted twice for the same record.
    #[error("duplicate attribute key '{key}' for LID {lid}")]
    DuplicateAttr { lid: Lid, key: String },

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, LocusError>;
