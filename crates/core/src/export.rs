//! Export of stored annotations into a stored source document

use storage::{Storage, StorageError};
use thiserror::Error;

use crate::annotation::Annotation;
use crate::pdf_export::{write_annotations, ExportOptions, PdfWriteError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("source document {0:?} not found")]
    NotFound(String),

    #[error("invalid export request: {0}")]
    Validation(String),

    #[error("failed to serialize annotations into {document:?}: {source}")]
    Serialization {
        document: String,
        #[source]
        source: PdfWriteError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Source document plus the annotations to write into it
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub document_id: String,
    pub annotations: Vec<Annotation>,
    pub options: ExportOptions,
}

impl ExportRequest {
    pub fn new(document_id: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        Self { document_id: document_id.into(), annotations, options: ExportOptions::default() }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    fn validate(&self) -> Result<(), ExportError> {
        storage::validate_identifier(&self.document_id)
            .map_err(|err| ExportError::Validation(err.to_string()))?;

        if self.annotations.is_empty() {
            return Err(ExportError::Validation("no annotations to export".to_owned()));
        }

        for annotation in &self.annotations {
            annotation
                .validate()
                .map_err(|err| ExportError::Validation(format!("annotation {}: {err}", annotation.id())))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub bytes: Vec<u8>,
    pub written: usize,
    pub skipped: usize,
    /// Suggested download name, `<stem>_annotated.pdf`
    pub file_name: String,
}

/// Write the request's annotations into its source document
///
/// The source is left untouched; the annotated bytes are returned.
pub fn export_document(storage: &Storage, request: &ExportRequest) -> Result<ExportOutcome, ExportError> {
    request.validate()?;

    let source = storage.read_document(&request.document_id).map_err(|err| match err {
        StorageError::NotFound(id) => ExportError::NotFound(id),
        other => ExportError::Storage(other),
    })?;

    let outcome = write_annotations(&source, &request.annotations, &request.options).map_err(|source| {
        ExportError::Serialization { document: request.document_id.clone(), source }
    })?;

    tracing::info!(
        document = %request.document_id,
        written = outcome.written,
        skipped = outcome.skipped,
        "export complete"
    );

    Ok(ExportOutcome {
        bytes: outcome.bytes,
        written: outcome.written,
        skipped: outcome.skipped,
        file_name: storage::export_file_name(&request.document_id)?,
    })
}
