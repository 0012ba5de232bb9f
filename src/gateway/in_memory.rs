//! In-memory directory for tests and local runs.
//!
//! Entries live in a map keyed by normalized DN behind an async `RwLock`.
//! The directory enforces the same result codes a real server returns for
//! the operations this crate issues:
//!
//! * add of an existing DN → already exists (68)
//! * modify of a missing DN → no such object (32)
//! * add of a value already present → attribute or value exists (20)
//! * delete of a value not present → no such attribute (16)
//!
//! Every issued operation is recorded in order, and connects and unbinds
//! are counted, so tests can assert on ordering and connection release.
//!
//! ```rust
//! use ldap_provisioner::gateway::{DirectoryConnector, DirectoryGateway, InMemoryDirectory, NewEntry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = InMemoryDirectory::new();
//! let mut session = directory.connect().await?;
//! session
//!     .add_entry(&NewEntry::new("cn=msilva,ou=users,dc=example,dc=com", ["inetOrgPerson"]))
//!     .await?;
//! session.unbind().await?;
//!
//! assert!(directory.contains("CN=msilva, OU=users, DC=example, DC=com").await);
//! assert_eq!(directory.stats().await.unbinds, 1);
//! # Ok(())
//! # }
//! ```

use super::{
    AttributeModification, DirectoryConnector, DirectoryGateway, DirectoryOperation,
    ModifyOperation, NewEntry,
};
use crate::config::normalize_dn;
use crate::error::{GatewayError, GatewayResult};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

const RC_NO_SUCH_ATTRIBUTE: u32 = 16;
const RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
const RC_UNWILLING_TO_PERFORM: u32 = 53;

/// A stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub dn: String,
    pub object_classes: Vec<String>,
    /// Lowercased attribute name → values
    pub attributes: HashMap<String, Vec<String>>,
}

impl StoredEntry {
    /// Values of an attribute, matched case-insensitively by name.
    pub fn values(&self, attribute: &str) -> &[String] {
        self.attributes
            .get(&attribute.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    entries: HashMap<String, StoredEntry>,
    operations: Vec<DirectoryOperation>,
    /// Normalized DNs whose operations are refused, for failure tests
    refused: HashSet<String>,
    refuse_connections: bool,
    connections: usize,
    unbinds: usize,
}

/// Counters for assertions and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InMemoryStats {
    pub entry_count: usize,
    pub operation_count: usize,
    pub connections: usize,
    pub unbinds: usize,
}

/// Shared in-memory directory. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an entry exists at `dn`.
    pub async fn contains(&self, dn: &str) -> bool {
        self.state.read().await.entries.contains_key(&normalize_dn(dn))
    }

    /// A copy of the entry at `dn`, if present.
    pub async fn entry(&self, dn: &str) -> Option<StoredEntry> {
        self.state.read().await.entries.get(&normalize_dn(dn)).cloned()
    }

    /// Every operation issued through any session, in order.
    pub async fn operations(&self) -> Vec<DirectoryOperation> {
        self.state.read().await.operations.clone()
    }

    pub async fn stats(&self) -> InMemoryStats {
        let state = self.state.read().await;
        InMemoryStats {
            entry_count: state.entries.len(),
            operation_count: state.operations.len(),
            connections: state.connections,
            unbinds: state.unbinds,
        }
    }

    /// Insert an entry directly, bypassing the operation log.
    pub async fn seed(&self, entry: NewEntry) {
        let mut state = self.state.write().await;
        let stored = to_stored(&entry);
        state.entries.insert(normalize_dn(&entry.dn), stored);
    }

    /// Make every later operation targeting `dn` fail with "unwilling to
    /// perform".
    pub async fn refuse_operations_on(&self, dn: &str) {
        self.state.write().await.refused.insert(normalize_dn(dn));
    }

    /// Make every later `connect` fail.
    pub async fn refuse_connections(&self) {
        self.state.write().await.refuse_connections = true;
    }

    /// Remove all entries and history.
    pub async fn clear(&self) {
        *self.state.write().await = DirectoryState::default();
    }
}

impl DirectoryConnector for InMemoryDirectory {
    type Gateway = InMemorySession;

    async fn connect(&self) -> GatewayResult<InMemorySession> {
        let mut state = self.state.write().await;
        if state.refuse_connections {
            return Err(GatewayError::connection("in-memory directory refuses connections"));
        }
        state.connections += 1;
        Ok(InMemorySession {
            state: Arc::clone(&self.state),
            bound: true,
        })
    }
}

/// One bound session against an [`InMemoryDirectory`].
#[derive(Debug)]
pub struct InMemorySession {
    state: Arc<RwLock<DirectoryState>>,
    bound: bool,
}

impl InMemorySession {
    fn ensure_bound(&self) -> GatewayResult<()> {
        if self.bound {
            Ok(())
        } else {
            Err(GatewayError::connection("session already unbound"))
        }
    }
}

impl DirectoryGateway for InMemorySession {
    async fn add_entry(&mut self, entry: &NewEntry) -> GatewayResult<()> {
        self.ensure_bound()?;
        let mut state = self.state.write().await;
        state.operations.push(DirectoryOperation::AddEntry(entry.clone()));

        let key = normalize_dn(&entry.dn);
        if state.refused.contains(&key) {
            return Err(GatewayError::operation(&entry.dn, RC_UNWILLING_TO_PERFORM, "unwillingToPerform"));
        }
        if state.entries.contains_key(&key) {
            return Err(GatewayError::AlreadyExists {
                dn: entry.dn.clone(),
            });
        }

        debug!("in-memory add {}", entry.dn);
        state.entries.insert(key, to_stored(entry));
        Ok(())
    }

    async fn modify_attribute(
        &mut self,
        dn: &str,
        modification: &AttributeModification,
    ) -> GatewayResult<()> {
        self.ensure_bound()?;
        let mut state = self.state.write().await;
        state.operations.push(DirectoryOperation::Modify {
            dn: dn.to_string(),
            modification: modification.clone(),
        });

        let key = normalize_dn(dn);
        if state.refused.contains(&key) {
            return Err(GatewayError::operation(dn, RC_UNWILLING_TO_PERFORM, "unwillingToPerform"));
        }
        let entry = state
            .entries
            .get_mut(&key)
            .ok_or_else(|| GatewayError::NoSuchObject { dn: dn.to_string() })?;

        let attribute = modification.attribute.to_lowercase();
        let is_dn_valued = attribute == "member";
        let same = |a: &str, b: &str| {
            if is_dn_valued {
                normalize_dn(a) == normalize_dn(b)
            } else {
                a == b
            }
        };

        match modification.operation {
            ModifyOperation::AddValue => {
                let values = entry.attributes.entry(attribute).or_default();
                for value in &modification.values {
                    if values.iter().any(|existing| same(existing, value)) {
                        return Err(GatewayError::operation(
                            dn,
                            RC_ATTRIBUTE_OR_VALUE_EXISTS,
                            format!("attributeOrValueExists: {value}"),
                        ));
                    }
                }
                values.extend(modification.values.iter().cloned());
            }
            ModifyOperation::DeleteValue => {
                let values = entry.attributes.get_mut(&attribute).ok_or_else(|| {
                    GatewayError::operation(
                        dn,
                        RC_NO_SUCH_ATTRIBUTE,
                        format!("noSuchAttribute: {}", modification.attribute),
                    )
                })?;
                for value in &modification.values {
                    if !values.iter().any(|existing| same(existing, value)) {
                        return Err(GatewayError::operation(
                            dn,
                            RC_NO_SUCH_ATTRIBUTE,
                            format!("noSuchAttribute: {value}"),
                        ));
                    }
                }
                values.retain(|existing| !modification.values.iter().any(|v| same(existing, v)));
                if values.is_empty() {
                    entry.attributes.remove(&attribute);
                }
            }
        }

        debug!("in-memory {} {} on {}", modification.operation, modification.attribute, dn);
        Ok(())
    }

    async fn unbind(&mut self) -> GatewayResult<()> {
        self.ensure_bound()?;
        self.bound = false;
        self.state.write().await.unbinds += 1;
        Ok(())
    }
}

fn to_stored(entry: &NewEntry) -> StoredEntry {
    let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
    for (name, values) in &entry.attributes {
        attributes
            .entry(name.to_lowercase())
            .or_default()
            .extend(values.iter().cloned());
    }
    StoredEntry {
        dn: entry.dn.clone(),
        object_classes: entry.object_classes.clone(),
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP_DN: &str = "cn=TI,ou=groups,dc=example,dc=com";
    const USER_DN: &str = "cn=msilva,ou=users,dc=example,dc=com";

    fn group() -> NewEntry {
        NewEntry::new(GROUP_DN, ["groupOfNames", "top"]).with_attribute("cn", ["TI"])
    }

    #[tokio::test]
    async fn test_add_rejects_existing_dn() {
        let directory = InMemoryDirectory::new();
        let mut session = directory.connect().await.unwrap();

        session.add_entry(&group()).await.unwrap();
        let replacement = group().with_attribute("description", ["other"]);
        let err = session.add_entry(&replacement).await.unwrap_err();

        assert!(matches!(err, GatewayError::AlreadyExists { .. }));
        let stored = directory.entry(GROUP_DN).await.unwrap();
        assert!(stored.values("description").is_empty());
    }

    #[tokio::test]
    async fn test_member_values_add_and_delete() {
        let directory = InMemoryDirectory::new();
        let mut session = directory.connect().await.unwrap();
        session.add_entry(&group()).await.unwrap();

        session
            .modify_attribute(GROUP_DN, &AttributeModification::add_value("member", USER_DN))
            .await
            .unwrap();
        let duplicate = session
            .modify_attribute(
                GROUP_DN,
                &AttributeModification::add_value("Member", "CN=msilva, ou=users, dc=example, dc=com"),
            )
            .await
            .unwrap_err();
        assert!(matches!(duplicate, GatewayError::Operation { code: 20, .. }));

        session
            .modify_attribute(GROUP_DN, &AttributeModification::delete_value("member", USER_DN))
            .await
            .unwrap();
        let missing = session
            .modify_attribute(GROUP_DN, &AttributeModification::delete_value("member", USER_DN))
            .await
            .unwrap_err();
        assert!(matches!(missing, GatewayError::Operation { code: 16, .. }));
    }

    #[tokio::test]
    async fn test_modify_missing_entry() {
        let directory = InMemoryDirectory::new();
        let mut session = directory.connect().await.unwrap();
        let err = session
            .modify_attribute(GROUP_DN, &AttributeModification::add_value("member", USER_DN))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::NoSuchObject { dn: GROUP_DN.to_string() });
    }

    #[tokio::test]
    async fn test_unbind_counts_and_closes_session() {
        let directory = InMemoryDirectory::new();
        let mut session = directory.connect().await.unwrap();
        session.unbind().await.unwrap();

        assert!(session.add_entry(&group()).await.is_err());
        let stats = directory.stats().await;
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.unbinds, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn test_refused_operations_and_connections() {
        let directory = InMemoryDirectory::new();
        directory.refuse_operations_on(GROUP_DN).await;
        let mut session = directory.connect().await.unwrap();
        let err = session.add_entry(&group()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Operation { code: 53, .. }));

        directory.refuse_connections().await;
        assert!(directory.connect().await.unwrap_err().is_connection_error());
    }
}
