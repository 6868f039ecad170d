//! The render hook of a report: a renderer followed by post-processing
//! transforms over the produced bytes.

use crate::config::ReportConfig;
use crate::encryptor::PdfEncryptor;
use crate::expression::{Clock, SystemClock};
use crate::record::RecordStore;
use crate::resolver::PasswordResolver;
use crate::{Error, Result};
use log::{debug, info};
use std::fmt;

/// Output format of a rendered report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    Pdf,
    Html,
    Text,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Html => "html",
            ReportFormat::Text => "text",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedReport {
    pub content: Vec<u8>,
    pub format: ReportFormat,
}

impl RenderedReport {
    pub fn pdf(content: Vec<u8>) -> RenderedReport {
        RenderedReport {
            content,
            format: ReportFormat::Pdf,
        }
    }
}

/// Produces the report for a set of records.
pub trait Renderer {
    fn render(&self, record_ids: &[i64]) -> Result<RenderedReport>;
}

impl<F> Renderer for F
where
    F: Fn(&[i64]) -> Result<RenderedReport>,
{
    fn render(&self, record_ids: &[i64]) -> Result<RenderedReport> {
        self(record_ids)
    }
}

/// Transforms the bytes of a rendered PDF report.
pub trait PostProcessor {
    fn process(&self, content: Vec<u8>, record_ids: &[i64]) -> Result<Vec<u8>>;
}

/// A report bound to a model, with the transforms applied to its PDF output.
pub struct ReportAction<R> {
    model: String,
    renderer: R,
    processors: Vec<Box<dyn PostProcessor + Send + Sync>>,
}

impl<R: Renderer> ReportAction<R> {
    pub fn new<S: Into<String>>(model: S, renderer: R) -> ReportAction<R> {
        ReportAction {
            model: model.into(),
            renderer,
            processors: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Appends a transform; transforms run in the order they were added.
    pub fn with_processor<P>(mut self, processor: P) -> Self
    where
        P: PostProcessor + Send + Sync + 'static,
    {
        self.processors.push(Box::new(processor));
        self
    }

    /// Adds password protection of the PDF output for records of this report's model.
    pub fn with_password_protection<S>(self, config: ReportConfig, store: S) -> Self
    where
        S: RecordStore + Send + Sync + 'static,
    {
        let protection = PasswordProtection::new(self.model.clone(), config, store);
        self.with_processor(protection)
    }

    /// Renders the report for `record_ids` and runs the transforms on PDF output.
    pub fn render(&self, record_ids: &[i64]) -> Result<(Vec<u8>, ReportFormat)> {
        let RenderedReport { mut content, format } = self.renderer.render(record_ids)?;
        debug!("rendered {} report for {} {:?}: {} bytes", format, self.model, record_ids, content.len());

        if format != ReportFormat::Pdf {
            return Ok((content, format));
        }
        for processor in &self.processors {
            content = processor.process(content, record_ids)?;
        }
        Ok((content, format))
    }
}

impl<R> fmt::Debug for ReportAction<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportAction")
            .field("model", &self.model)
            .field("processors", &self.processors.len())
            .finish()
    }
}

/// Encrypts the PDF output of a report with the password resolved for the
/// first record it was printed for.
#[derive(Debug)]
pub struct PasswordProtection<S, C = SystemClock> {
    model: String,
    config: ReportConfig,
    store: S,
    resolver: PasswordResolver<C>,
    encryptor: PdfEncryptor,
}

impl<S: RecordStore> PasswordProtection<S> {
    pub fn new<M: Into<String>>(model: M, config: ReportConfig, store: S) -> PasswordProtection<S> {
        let encryptor = PdfEncryptor::new(config.settings.clone());
        PasswordProtection {
            model: model.into(),
            config,
            store,
            resolver: PasswordResolver::new(),
            encryptor,
        }
    }
}

impl<S: RecordStore, C: Clock> PasswordProtection<S, C> {
    pub fn with_resolver<D: Clock>(self, resolver: PasswordResolver<D>) -> PasswordProtection<S, D> {
        PasswordProtection {
            model: self.model,
            config: self.config,
            store: self.store,
            resolver,
            encryptor: self.encryptor,
        }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }
}

impl<S: RecordStore, C: Clock> PostProcessor for PasswordProtection<S, C> {
    fn process(&self, content: Vec<u8>, record_ids: &[i64]) -> Result<Vec<u8>> {
        if !self.config.computes_password() {
            return self.encryptor.encrypt(content, None);
        }

        let record = match record_ids.first() {
            Some(&id) => Some(self.store.browse(&self.model, id).ok_or_else(|| Error::RecordNotFound {
                model: self.model.clone(),
                id,
            })?),
            None => None,
        };
        let password = self.resolver.resolve(&self.config, record)?;
        if password.is_some() {
            info!("encrypting {} report for {:?}", self.model, record_ids);
        }
        self.encryptor.encrypt(content, password.as_ref())
    }
}
