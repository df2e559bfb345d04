use thiserror::Error;

/// Failures surfaced to the caller of an ingestion session.
///
/// Period-endpoint exhaustion is deliberately absent: the period source
/// absorbs it by substituting a built-in default payload, so no error
/// value ever escapes that path.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("unsupported file type: {name} (expected .xlsx, .xls or .csv)")]
    UnsupportedFileType { name: String },

    #[error("the selected file contains no rows")]
    EmptyFile,

    #[error("could not read {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{0}")]
    MissingSelection(&'static str),

    #[error("upload failed: {source}")]
    UploadFailed {
        #[source]
        source: anyhow::Error,
    },
}
