use std::path::PathBuf;

/// Failures of the collaborators the placement engine cannot work around.
///
/// Rejected candidates and unplaceable labels are not errors: they are reported
/// through [`crate::placement::PlacementOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("failed to measure {text:?} at {font_size}pt: {reason}")]
    Measure {
        text: String,
        font_size: f64,
        reason: String,
    },
    #[error("invalid axis transform: {0}")]
    Transform(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{origin}: header key `{key}` does not match any series option")]
    UnknownKey { origin: String, key: String },
    #[error("{origin}: header key `{key}` expects a number, got {value:?}")]
    BadValue {
        origin: String,
        key: String,
        value: String,
    },
    #[error("{origin}: line {line} is not a (mass, cross-section) row: {content:?}")]
    BadRow {
        origin: String,
        line: usize,
        content: String,
    },
    #[error("{origin}: no data rows")]
    Empty { origin: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("unknown series `{0}`")]
    UnknownSeries(String),
    #[error("duplicate series key `{0}`")]
    DuplicateSeries(String),
    #[error("invalid scene manifest: {0}")]
    Manifest(String),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
}
