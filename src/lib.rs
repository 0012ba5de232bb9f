//! Directory provisioning from XML change documents.
//!
//! Reads change documents describing new users, new groups and group
//! membership changes, validates each directive, and applies it to an LDAP
//! directory one operation at a time.
//!
//! # Core Components
//!
//! - [`parse_document`] - Decode a change document into [`Directive`]s
//! - [`DirectiveExecutor`] - Validate, plan and issue the operations of one directive
//! - [`DocumentProcessor`] - Apply whole documents over one connection each
//! - [`DirectoryGateway`] - Trait for directory backends ([`LdapConnector`], [`InMemoryDirectory`])
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ldap_provisioner::{DirectiveExecutor, DirectoryConfig, DocumentProcessor, LdapConnector};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(DirectoryConfig::from_file("provision.toml")?);
//! let processor = DocumentProcessor::new(
//!     LdapConnector::new(Arc::clone(&config)),
//!     DirectiveExecutor::new(config),
//! );
//! let report = processor.process_all(&["changes.xml"]).await;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod membership;
pub mod processor;
pub mod validation;

pub use config::{DirectoryConfig, DirectoryConfigBuilder};
pub use document::{
    AddGroup, AddUser, ChangeDocument, Directive, ModifyUserGroups, parse_document,
    parse_document_bytes,
};
pub use error::{
    ConfigError, DirectiveError, GatewayError, ParseError, ProcessError, ValidationError,
};
pub use executor::{DirectiveExecutor, DirectiveOutcome};
pub use gateway::{
    DirectoryConnector, DirectoryGateway, DirectoryOperation, InMemoryDirectory, LdapConnector,
};
pub use membership::MembershipDiff;
pub use processor::{BatchReport, DirectiveReport, DocumentProcessor, DocumentReport};
