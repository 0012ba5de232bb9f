//! Document-level driver.
//!
//! Documents are handled one at a time in the order given. For each one the
//! processor reads and parses the file, opens a single directory
//! connection, executes every entry in document order and unbinds, whatever
//! happened to the individual directives. A failing directive is recorded
//! and the next one runs; only read, parse and connect failures stop a
//! document.

use crate::document::{ChangeDocument, Directive, parse_document, parse_document_bytes};
use crate::error::{DirectiveError, ParseError, ParseResult, ProcessError};
use crate::executor::{DirectiveExecutor, DirectiveOutcome};
use crate::gateway::{DirectoryConnector, DirectoryGateway};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Per-directive line in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveReport {
    pub directive: String,
    /// Operations issued successfully (or, in a dry run, planned)
    pub operations: Vec<String>,
    pub error: Option<String>,
    /// Failures of operations issued after the first failure
    pub further_errors: Vec<String>,
    /// Failed parsing or validation, so nothing was sent to the directory
    pub rejected: bool,
}

impl From<&DirectiveOutcome> for DirectiveReport {
    fn from(outcome: &DirectiveOutcome) -> Self {
        Self {
            directive: outcome.label.clone(),
            operations: outcome.applied.iter().map(ToString::to_string).collect(),
            error: outcome.error.as_ref().map(ToString::to_string),
            further_errors: outcome.further_errors.iter().map(ToString::to_string).collect(),
            rejected: outcome
                .error
                .as_ref()
                .is_some_and(DirectiveError::is_rejected_before_write),
        }
    }
}

/// Everything that happened to one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub processed_at: DateTime<Utc>,
    pub directives: Vec<DirectiveReport>,
    /// Set when the document could not be processed at all
    pub error: Option<String>,
    /// Set when releasing the connection failed
    pub unbind_error: Option<String>,
    #[serde(skip)]
    outcomes: Vec<DirectiveOutcome>,
}

impl DocumentReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            processed_at: Utc::now(),
            directives: Vec::new(),
            error: None,
            unbind_error: None,
            outcomes: Vec::new(),
        }
    }

    fn failed(path: &Path, error: &ProcessError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(path)
        }
    }

    fn record(&mut self, outcome: DirectiveOutcome) {
        self.directives.push(DirectiveReport::from(&outcome));
        self.outcomes.push(outcome);
    }

    /// Typed outcomes, in document order.
    pub fn outcomes(&self) -> &[DirectiveOutcome] {
        &self.outcomes
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_success()).count()
    }

    pub fn failed_directives(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// No document-level error and every directive applied.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed_directives() == 0
    }
}

/// Reports for a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.documents.iter().all(DocumentReport::is_success)
    }

    pub fn directives_succeeded(&self) -> usize {
        self.documents.iter().map(DocumentReport::succeeded).sum()
    }

    pub fn directives_failed(&self) -> usize {
        self.documents.iter().map(DocumentReport::failed_directives).sum()
    }

    pub fn documents_failed(&self) -> usize {
        self.documents.iter().filter(|doc| doc.error.is_some()).count()
    }
}

/// Applies change documents through a connector.
#[derive(Debug, Clone)]
pub struct DocumentProcessor<C> {
    connector: C,
    executor: DirectiveExecutor,
    dry_run: bool,
}

impl<C: DirectoryConnector> DocumentProcessor<C> {
    pub fn new(connector: C, executor: DirectiveExecutor) -> Self {
        Self {
            connector,
            executor,
            dry_run: false,
        }
    }

    /// Plan only: validate and list operations, never connect.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Process documents strictly one after another, in the given order.
    pub async fn process_all<P: AsRef<Path>>(&self, paths: &[P]) -> BatchReport {
        let mut report = BatchReport::default();
        for path in paths {
            report.documents.push(self.process_document(path.as_ref()).await);
        }
        report
    }

    /// Read, parse and apply one document file. The file is decoded per its
    /// XML encoding declaration.
    pub async fn process_document(&self, path: &Path) -> DocumentReport {
        info!("Processing {}", path.display());
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(source) => {
                let error = ProcessError::Io {
                    path: path.display().to_string(),
                    source,
                };
                warn!("{}", error);
                return DocumentReport::failed(path, &error);
            }
        };
        self.apply(path, parse_document_bytes(&bytes)).await
    }

    /// Parse and apply document text; `path` only labels the report.
    pub async fn process_source(&self, path: &Path, xml: &str) -> DocumentReport {
        self.apply(path, parse_document(xml)).await
    }

    async fn apply(&self, path: &Path, parsed: ParseResult<ChangeDocument>) -> DocumentReport {
        let document = match parsed {
            Ok(document) => document,
            Err(source) => {
                let error = ProcessError::Parse {
                    path: path.display().to_string(),
                    source,
                };
                warn!("{}", error);
                return DocumentReport::failed(path, &error);
            }
        };
        debug!("{} holds {} directives", path.display(), document.len());

        let mut report = DocumentReport::new(path);
        if self.dry_run {
            for (index, entry) in document.entries().iter().enumerate() {
                report.record(self.plan_entry(index, entry));
            }
            return report;
        }

        let mut gateway = match self.connector.connect().await {
            Ok(gateway) => gateway,
            Err(source) => {
                let error = ProcessError::Connect {
                    path: path.display().to_string(),
                    source,
                };
                warn!("{}", error);
                return DocumentReport::failed(path, &error);
            }
        };

        for (index, entry) in document.into_entries().into_iter().enumerate() {
            let outcome = match entry {
                Ok(directive) => self.executor.execute(&mut gateway, &directive).await,
                Err(error) => {
                    warn!("Skipping element #{} of {}: {}", index + 1, path.display(), error);
                    DirectiveOutcome::rejected(element_label(index), error)
                }
            };
            if let Some(DirectiveError::Directory { source, .. }) = &outcome.error
                && source.is_connection_error()
            {
                warn!("Connection to the directory lost while processing {}", path.display());
            }
            report.record(outcome);
        }

        if let Err(error) = gateway.unbind().await {
            warn!("Unbind after {} failed: {}", path.display(), error);
            report.unbind_error = Some(error.to_string());
        }

        info!(
            "Finished {}: {} applied, {} failed",
            path.display(),
            report.succeeded(),
            report.failed_directives()
        );
        report
    }

    fn plan_entry(
        &self,
        index: usize,
        entry: &Result<Directive, ParseError>,
    ) -> DirectiveOutcome {
        let directive = match entry {
            Ok(directive) => directive,
            Err(error) => return DirectiveOutcome::rejected(element_label(index), error.clone()),
        };
        match self.executor.plan(directive) {
            Ok(operations) => {
                for operation in &operations {
                    info!("[dry run] {}: {}", directive, operation);
                }
                DirectiveOutcome::applied(directive.to_string(), operations)
            }
            Err(error) => DirectiveOutcome::rejected(directive.to_string(), error),
        }
    }
}

fn element_label(index: usize) -> String {
    format!("element #{}", index + 1)
}
