//! Error type shared by every stage of the synthesis pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("no coordinate samples found")]
    InputEmpty,
    #[error("malformed sample at index {index}: {reason}")]
    MalformedSample { index: usize, reason: String },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("failed to read GPX: {0}")]
    GpxRead(#[from] gpx::errors::GpxError),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("tuning file error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid timestamp: {0}")]
    TimeParse(#[from] chrono::ParseError),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, SynthError>;
