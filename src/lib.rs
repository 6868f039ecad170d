//! Password protection of rendered PDF reports.
//!
//! A [`PasswordResolver`] decides which password, if any, applies to a report,
//! either leaving it to the user (manual mode) or evaluating a sandboxed
//! [`Expression`] against the printed record (auto mode). A [`PdfEncryptor`]
//! then copies the pages of the rendered PDF into a new document and encrypts
//! it. [`pipeline`] wires both into a report's render hook.

mod config;
pub use config::{Cipher, EncryptionMode, EncryptionSettings, EncryptionSettingsBuilder, ParseModeError, Permissions, ReportConfig};

mod error;
pub use error::{DocumentError, EncryptionError, Error, Result};

pub mod expression;
pub use expression::{Clock, Expression, ExpressionError, FixedClock, Scope, SystemClock};

mod record;
pub use record::{MemoryStore, Record, RecordData, RecordStore};

mod value;
pub use value::Value;

mod resolver;
pub use resolver::{Password, PasswordResolver};

mod encryptor;
pub use encryptor::PdfEncryptor;

#[cfg(feature = "pdf")]
mod pages;

pub mod pipeline;
pub use pipeline::{PasswordProtection, PostProcessor, RenderedReport, Renderer, ReportAction, ReportFormat};
