//! Shared helpers for provisioning tests.
//!
//! Fixture documents live in `tests/fixtures/` and mirror the change
//! documents the tool is fed in production: one group per `AddGrupoN.xml`,
//! users in `AddUsuario1.xml`, a membership edit in `ModifyUsuario1.xml`.

#![allow(dead_code)]

use ldap_provisioner::gateway::{InMemoryDirectory, NewEntry};
use ldap_provisioner::{DirectiveExecutor, DirectoryConfig, DocumentProcessor};
use std::path::PathBuf;
use std::sync::Arc;

pub const USERS_BASE: &str = "ou=users,dc=example,dc=com";
pub const GROUPS_BASE: &str = "ou=groups,dc=example,dc=com";

/// Absolute path of a fixture document.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn user_dn(login: &str) -> String {
    format!("cn={},{}", login, USERS_BASE)
}

pub fn group_dn(identifier: &str) -> String {
    format!("cn={},{}", identifier, GROUPS_BASE)
}

pub fn test_config() -> DirectoryConfig {
    DirectoryConfig::builder()
        .users_base(USERS_BASE)
        .groups_base(GROUPS_BASE)
        .initial_password("changeit")
        .build()
        .expect("test configuration should be valid")
}

/// A processor writing to `directory`.
pub fn processor(directory: &InMemoryDirectory) -> DocumentProcessor<InMemoryDirectory> {
    let config = Arc::new(test_config());
    DocumentProcessor::new(directory.clone(), DirectiveExecutor::new(config))
}

/// Create the TI, RH and Financeiro groups without going through a document.
pub async fn seed_groups(directory: &InMemoryDirectory) {
    for identifier in ["TI", "RH", "Financeiro"] {
        directory
            .seed(
                NewEntry::new(group_dn(identifier), ["groupOfNames", "top"])
                    .with_attribute("cn", [identifier]),
            )
            .await;
    }
}
