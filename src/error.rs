use thiserror::Error;

use crate::expression::ExpressionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The password expression of a report could not be parsed or evaluated.
    #[error("password expression is invalid: {source}\n{expression}")]
    Configuration {
        expression: String,
        #[source]
        source: ExpressionError,
    },
    /// The rendered bytes are not a usable PDF document.
    #[error("malformed PDF document: {0}")]
    MalformedDocument(#[from] DocumentError),
    /// Encryption could not be applied.
    #[error("couldn't encrypt PDF document: {0}")]
    Encryption(#[from] EncryptionError),
    /// The record a report is rendered for does not exist in the record store.
    #[error("record {model}({id}) does not exist")]
    RecordNotFound { model: String, id: i64 },
    /// A renderer reported a failure.
    #[error("couldn't render report: {0}")]
    Render(String),
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[cfg(feature = "pdf")]
    #[error("couldn't parse input: {0}")]
    Parse(#[source] lopdf::Error),
    #[error("document has no pages")]
    NoPages,
    #[error("page object {0} {1} R is not a dictionary")]
    InvalidPage(u32, u16),
}

#[derive(Debug, Error)]
pub enum EncryptionError {
    /// The crate was built without a PDF backend.
    #[error("PDF encryption is not available; build with the `pdf` feature")]
    Unavailable,
    #[error("document is already protected by a password")]
    AlreadyEncrypted,
    #[error("couldn't generate a file identifier: {0}")]
    Random(String),
    #[error("couldn't set up the security handler: {0}")]
    State(String),
    #[error("couldn't encrypt objects: {0}")]
    Encrypt(String),
    #[error("couldn't serialize document: {0}")]
    Write(String),
}

impl Error {
    pub(crate) fn configuration(expression: &str, source: ExpressionError) -> Self {
        Error::Configuration {
            expression: expression.to_string(),
            source,
        }
    }
}
