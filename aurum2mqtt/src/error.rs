use thiserror::Error;

/// Anything that prevents a cycle from producing a complete `Snapshot`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("element <{key}> has no value attribute")]
    MissingValue { key: String },
    #[error("selected measurement {key} is missing from the device response")]
    MissingMeasurement { key: &'static str },
}

/// Invalid setup. Surfaced before the first cycle is scheduled.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("selected index {index} is outside the measurement catalog (0..{len})")]
    UnknownIndex { index: usize, len: usize },
    #[error("selected key {0:?} is not a known measurement")]
    UnknownKey(String),
    #[error("measurement {0} is selected more than once")]
    DuplicateSelection(&'static str),
    #[error("selection is empty, nothing to publish")]
    EmptySelection,
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to publish to {topic}: {reason}")]
    Rejected { topic: String, reason: String },
    #[error("failed to serialize payload for {topic}: {source}")]
    Serialize {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to close broker session: {0}")]
    Disconnect(String),
}
