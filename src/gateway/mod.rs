//! Directory access.
//!
//! [`DirectoryGateway`] is the narrow client surface the executor needs:
//! add an entry, add or delete attribute values, unbind. A
//! [`DirectoryConnector`] opens one bound gateway per document.
//!
//! Two implementations ship with the crate:
//!
//! - [`LdapConnector`] talks to a real server through `ldap3`
//! - [`InMemoryDirectory`] keeps entries in a map, for tests and local runs
//!
//! ```rust
//! use ldap_provisioner::gateway::{
//!     AttributeModification, DirectoryConnector, DirectoryGateway, InMemoryDirectory, NewEntry,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = InMemoryDirectory::new();
//! let mut session = directory.connect().await?;
//!
//! let group = NewEntry::new("cn=TI,ou=groups,dc=example,dc=com", ["groupOfNames", "top"])
//!     .with_attribute("cn", ["TI"]);
//! session.add_entry(&group).await?;
//! session
//!     .modify_attribute(
//!         "cn=TI,ou=groups,dc=example,dc=com",
//!         &AttributeModification::add_value("member", "cn=msilva,ou=users,dc=example,dc=com"),
//!     )
//!     .await?;
//! session.unbind().await?;
//! # Ok(())
//! # }
//! ```

pub mod in_memory;
pub mod ldap;

pub use in_memory::{InMemoryDirectory, InMemorySession, InMemoryStats};
pub use ldap::{LdapConnector, LdapSession};

use crate::error::GatewayResult;
use serde::Serialize;
use std::fmt;
use std::future::Future;

/// A directory entry to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub dn: String,
    pub object_classes: Vec<String>,
    /// Attribute name and its values, in insertion order
    pub attributes: Vec<(String, Vec<String>)>,
}

impl NewEntry {
    pub fn new<I, S>(dn: impl Into<String>, object_classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dn: dn.into(),
            object_classes: object_classes.into_iter().map(Into::into).collect(),
            attributes: Vec::new(),
        }
    }

    /// Append an attribute. Attributes without values are skipped.
    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if !values.is_empty() {
            self.attributes.push((name.into(), values));
        }
        self
    }

    /// Values of an attribute, matched case-insensitively by name.
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }
}

/// Kind of single-attribute modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifyOperation {
    AddValue,
    DeleteValue,
}

impl fmt::Display for ModifyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddValue => write!(f, "add"),
            Self::DeleteValue => write!(f, "delete"),
        }
    }
}

/// Add or delete specific values of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeModification {
    pub operation: ModifyOperation,
    pub attribute: String,
    pub values: Vec<String>,
}

impl AttributeModification {
    pub fn add_value(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            operation: ModifyOperation::AddValue,
            attribute: attribute.into(),
            values: vec![value.into()],
        }
    }

    pub fn delete_value(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            operation: ModifyOperation::DeleteValue,
            attribute: attribute.into(),
            values: vec![value.into()],
        }
    }
}

/// One planned or issued directory call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOperation {
    AddEntry(NewEntry),
    Modify {
        dn: String,
        modification: AttributeModification,
    },
}

impl DirectoryOperation {
    /// DN the operation targets.
    pub fn dn(&self) -> &str {
        match self {
            Self::AddEntry(entry) => &entry.dn,
            Self::Modify { dn, .. } => dn,
        }
    }

    /// Attribute the operation touches (`*` for a whole-entry add).
    pub fn attribute(&self) -> &str {
        match self {
            Self::AddEntry(_) => "*",
            Self::Modify { modification, .. } => &modification.attribute,
        }
    }
}

/// Attribute values are left out so credentials never reach logs or reports.
impl fmt::Display for DirectoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddEntry(entry) => {
                let names: Vec<&str> = entry.attributes.iter().map(|(name, _)| name.as_str()).collect();
                write!(f, "add entry {} [{}]", entry.dn, names.join(", "))
            }
            Self::Modify { dn, modification } => write!(
                f,
                "{} {} value {} on {}",
                modification.operation,
                modification.attribute,
                modification.values.join(", "),
                dn
            ),
        }
    }
}

/// Client operations against one bound directory connection.
///
/// Every call is issued immediately; implementations keep no local cache,
/// so a successful call is visible to the next one.
pub trait DirectoryGateway {
    /// Create an entry. Fails with `GatewayError::AlreadyExists` when the DN
    /// is taken; the existing entry is never overwritten.
    fn add_entry(&mut self, entry: &NewEntry) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Add or delete values of one attribute of an existing entry.
    fn modify_attribute(
        &mut self,
        dn: &str,
        modification: &AttributeModification,
    ) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Release the connection.
    fn unbind(&mut self) -> impl Future<Output = GatewayResult<()>> + Send;
}

/// Opens bound gateways.
pub trait DirectoryConnector {
    type Gateway: DirectoryGateway + Send;

    fn connect(&self) -> impl Future<Output = GatewayResult<Self::Gateway>> + Send;
}
