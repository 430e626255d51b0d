use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HotspotError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid site identifier: {0:?}")]
    InvalidSiteId(String),

    #[error("invalid species identifier: {0:?}")]
    InvalidSpeciesId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("input file not found: {0}")]
    FileNotFound(Utf8PathBuf),

    #[error("failed to read {path}: {message}")]
    CsvRead { path: Utf8PathBuf, message: String },

    #[error("missing column `{column}` in {path}")]
    MissingColumn { column: String, path: Utf8PathBuf },

    #[error("bad value in {path} at line {line}: {message}")]
    CsvParse {
        path: Utf8PathBuf,
        line: u64,
        message: String,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
