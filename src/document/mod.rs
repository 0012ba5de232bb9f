//! Change documents and the directives decoded from them.
//!
//! A change document is an XML file whose root holds `add` and `modify`
//! elements. Each element becomes one [`Directive`], decoded once so that
//! validation and execution switch on the variant instead of re-reading
//! raw `class-name`/`attr-name` strings.
//!
//! ```xml
//! <input>
//!   <add class-name="Usuario">
//!     <add-attr attr-name="Nome Completo"><value>Maria Silva</value></add-attr>
//!     <add-attr attr-name="Login"><value>msilva</value></add-attr>
//!     <add-attr attr-name="Telefone"><value>5551234</value></add-attr>
//!     <add-attr attr-name="Grupo"><value>TI</value></add-attr>
//!   </add>
//! </input>
//! ```

mod parser;
mod xml;

pub use parser::{ChangeDocument, parse_document, parse_document_bytes};

use serde::Serialize;
use std::fmt;

/// Create a user entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddUser {
    pub full_name: String,
    pub login: String,
    pub phone: String,
    /// Groups the new user joins, in document order
    pub groups: Vec<String>,
}

/// Create a group entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddGroup {
    pub identifier: String,
    /// Stored as the LDAP `description` attribute
    pub description: String,
    /// Logins of the initial members, in document order
    pub members: Vec<String>,
}

/// Move an existing user between groups.
///
/// The lists are raw candidates exactly as written in the document; see
/// [`MembershipDiff`](crate::membership::MembershipDiff) for the
/// deduplicated, disjoint form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifyUserGroups {
    pub login: String,
    pub remove_groups: Vec<String>,
    pub add_groups: Vec<String>,
}

/// One unit of change intent from a change document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    AddUser(AddUser),
    AddGroup(AddGroup),
    ModifyUserGroups(ModifyUserGroups),
}

/// Short label used in logs and reports, e.g. `add user msilva`.
impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddUser(user) => write!(f, "add user {}", user.login),
            Self::AddGroup(group) => write!(f, "add group {}", group.identifier),
            Self::ModifyUserGroups(modify) => write!(f, "modify groups of {}", modify.login),
        }
    }
}
