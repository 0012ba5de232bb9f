//! LDAP gateway built on `ldap3`.
//!
//! One [`LdapSession`] wraps one bound connection. The connection driver is
//! spawned on the current runtime and ends when the session unbinds.

use super::{
    AttributeModification, DirectoryConnector, DirectoryGateway, ModifyOperation, NewEntry,
};
use crate::config::DirectoryConfig;
use crate::error::{GatewayError, GatewayResult};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Mod};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_ENTRY_ALREADY_EXISTS: u32 = 68;

/// Opens bound `ldap3` connections using a [`DirectoryConfig`].
#[derive(Debug, Clone)]
pub struct LdapConnector {
    config: Arc<DirectoryConfig>,
}

impl LdapConnector {
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }
}

impl DirectoryConnector for LdapConnector {
    type Gateway = LdapSession;

    async fn connect(&self) -> GatewayResult<LdapSession> {
        let url = &self.config.url;
        debug!("Connecting to LDAP server at {}", url);

        let settings = LdapConnSettings::new().set_conn_timeout(self.config.connect_timeout());
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, url)
            .await
            .map_err(|e| GatewayError::connection(format!("cannot connect to {url}: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection driver error: {}", e);
            }
        });

        let bind_dn = &self.config.bind_dn;
        let result = ldap
            .simple_bind(bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| GatewayError::connection(format!("bind as {bind_dn} failed: {e}")))?;

        match result.rc {
            RC_SUCCESS => {}
            RC_INVALID_CREDENTIALS => {
                return Err(GatewayError::InvalidCredentials {
                    bind_dn: bind_dn.clone(),
                });
            }
            rc => {
                return Err(GatewayError::connection(format!(
                    "bind as {bind_dn} failed with code {rc}: {}",
                    result.text
                )));
            }
        }

        info!("Bound to {} as {}", url, bind_dn);
        Ok(LdapSession { ldap })
    }
}

/// One bound `ldap3` connection.
pub struct LdapSession {
    ldap: Ldap,
}

impl std::fmt::Debug for LdapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSession").finish_non_exhaustive()
    }
}

impl DirectoryGateway for LdapSession {
    async fn add_entry(&mut self, entry: &NewEntry) -> GatewayResult<()> {
        let mut attributes: Vec<(String, HashSet<String>)> =
            Vec::with_capacity(entry.attributes.len() + 1);
        attributes.push((
            "objectClass".to_string(),
            entry.object_classes.iter().cloned().collect(),
        ));
        attributes.extend(
            entry
                .attributes
                .iter()
                .map(|(name, values)| (name.clone(), values.iter().cloned().collect())),
        );

        let result = self
            .ldap
            .add(&entry.dn, attributes)
            .await
            .map_err(|e| GatewayError::connection(format!("add {} failed: {e}", entry.dn)))?;

        check_result(&entry.dn, result.rc, &result.text)
    }

    async fn modify_attribute(
        &mut self,
        dn: &str,
        modification: &AttributeModification,
    ) -> GatewayResult<()> {
        let values: HashSet<String> = modification.values.iter().cloned().collect();
        let change = match modification.operation {
            ModifyOperation::AddValue => Mod::Add(modification.attribute.clone(), values),
            ModifyOperation::DeleteValue => Mod::Delete(modification.attribute.clone(), values),
        };

        let result = self
            .ldap
            .modify(dn, vec![change])
            .await
            .map_err(|e| GatewayError::connection(format!("modify {dn} failed: {e}")))?;

        check_result(dn, result.rc, &result.text)
    }

    async fn unbind(&mut self) -> GatewayResult<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| GatewayError::connection(format!("unbind failed: {e}")))
    }
}

/// Map an LDAP result code to the gateway error taxonomy.
fn check_result(dn: &str, rc: u32, text: &str) -> GatewayResult<()> {
    match rc {
        RC_SUCCESS => Ok(()),
        RC_ENTRY_ALREADY_EXISTS => Err(GatewayError::AlreadyExists { dn: dn.to_string() }),
        RC_NO_SUCH_OBJECT => Err(GatewayError::NoSuchObject { dn: dn.to_string() }),
        rc => Err(GatewayError::operation(dn, rc, text)),
    }
}
