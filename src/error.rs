use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML deserialization failed: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("download failed with status {status}: {body}")]
    Download { status: u16, body: String },

    #[error("coded-choice value {value:?} is out of range for {field}")]
    Choice { field: &'static str, value: String },

    #[error("failed to parse filing {filing_id}: {message}")]
    Filing { filing_id: String, message: String },

    #[error("warehouse error: {0}")]
    Warehouse(String),

    #[error("task dispatch failed: {0}")]
    Dispatch(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
