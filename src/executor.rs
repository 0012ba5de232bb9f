//! Turning directives into directory operations.
//!
//! [`DirectiveExecutor::plan`] validates a directive and lays out the exact
//! operations it needs, without touching the directory.
//! [`DirectiveExecutor::execute`] then issues them one by one. A failed
//! entry add ends the directive; a failed membership modify is recorded and
//! the remaining modifies are still issued.
//!
//! Operation order per directive:
//!
//! - add user: the user entry, then one `member` add per listed group
//! - add group: the group entry (with its initial members)
//! - modify user groups: every `member` delete, then every `member` add

use crate::config::{DirectoryConfig, GROUP_OBJECT_CLASSES, USER_OBJECT_CLASSES};
use crate::document::{AddGroup, AddUser, Directive, ModifyUserGroups};
use crate::error::{DirectiveError, DirectiveResult, GatewayError};
use crate::gateway::{AttributeModification, DirectoryGateway, DirectoryOperation, NewEntry};
use crate::membership::{MembershipDiff, dedup_names};
use crate::validation::validate_directive;
use log::{debug, info, warn};
use std::sync::Arc;

const MEMBER_ATTRIBUTE: &str = "member";

/// Result of executing one directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveOutcome {
    /// Human-readable directive label, e.g. `add user msilva`
    pub label: String,
    /// Operations that succeeded, in issue order
    pub applied: Vec<DirectoryOperation>,
    /// First failure, if any
    pub error: Option<DirectiveError>,
    /// Failures of later operations, in issue order
    pub further_errors: Vec<DirectiveError>,
}

impl DirectiveOutcome {
    /// Outcome for a directive that never reached the directory.
    pub fn rejected(label: impl Into<String>, error: impl Into<DirectiveError>) -> Self {
        Self {
            label: label.into(),
            applied: Vec::new(),
            error: Some(error.into()),
            further_errors: Vec::new(),
        }
    }

    /// Outcome for operations that were all applied, or planned in a dry run.
    pub fn applied(label: impl Into<String>, applied: Vec<DirectoryOperation>) -> Self {
        Self {
            label: label.into(),
            applied,
            error: None,
            further_errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Every failure, in issue order.
    pub fn errors(&self) -> impl Iterator<Item = &DirectiveError> {
        self.error.iter().chain(&self.further_errors)
    }
}

/// Plans and issues the directory operations for directives.
#[derive(Debug, Clone)]
pub struct DirectiveExecutor {
    config: Arc<DirectoryConfig>,
}

impl DirectiveExecutor {
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Validate a directive and return the operations it would issue.
    pub fn plan(&self, directive: &Directive) -> DirectiveResult<Vec<DirectoryOperation>> {
        validate_directive(directive)?;
        let operations = match directive {
            Directive::AddUser(user) => self.plan_add_user(user),
            Directive::AddGroup(group) => self.plan_add_group(group),
            Directive::ModifyUserGroups(modify) => self.plan_modify(modify)?,
        };
        Ok(operations)
    }

    /// Validate, plan and issue a directive through `gateway`.
    ///
    /// Nothing is issued for a directive that fails validation. A failed
    /// entry add skips everything after it; a failed modify does not stop the
    /// modifies that follow. Operations already applied stay applied and are
    /// listed in the outcome.
    pub async fn execute<G: DirectoryGateway>(
        &self,
        gateway: &mut G,
        directive: &Directive,
    ) -> DirectiveOutcome {
        let label = directive.to_string();
        let operations = match self.plan(directive) {
            Ok(operations) => operations,
            Err(error) => {
                warn!("Rejected {}: {}", label, error);
                return DirectiveOutcome::rejected(label, error);
            }
        };

        let mut applied = Vec::with_capacity(operations.len());
        let mut errors = Vec::new();
        for operation in operations {
            debug!("{}: {}", label, operation);
            match issue(gateway, &operation).await {
                Ok(()) => applied.push(operation),
                Err(error) => {
                    let entry_failed = matches!(operation, DirectoryOperation::AddEntry(_));
                    let error = classify_failure(&operation, error);
                    warn!("Failed {}: {}", label, error);
                    errors.push(error);
                    if entry_failed {
                        break;
                    }
                }
            }
        }

        let mut errors = errors.into_iter();
        let error = errors.next();
        if error.is_none() {
            info!("Applied {} ({} operations)", label, applied.len());
        }
        DirectiveOutcome {
            label,
            applied,
            error,
            further_errors: errors.collect(),
        }
    }

    fn plan_add_user(&self, user: &AddUser) -> Vec<DirectoryOperation> {
        let user_dn = self.config.user_dn(&user.login);
        let password = self
            .config
            .initial_password
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let entry = NewEntry::new(&user_dn, USER_OBJECT_CLASSES.iter().copied())
            .with_attribute("cn", [user.full_name.as_str()])
            .with_attribute("sn", [user.login.as_str()])
            .with_attribute("uid", [user.login.as_str()])
            .with_attribute("telephoneNumber", [user.phone.as_str()])
            .with_attribute("userPassword", [password]);

        let mut operations = vec![DirectoryOperation::AddEntry(entry)];
        operations.extend(dedup_names(&user.groups).iter().map(|group| {
            self.member_change(group, AttributeModification::add_value(MEMBER_ATTRIBUTE, &user_dn))
        }));
        operations
    }

    fn plan_add_group(&self, group: &AddGroup) -> Vec<DirectoryOperation> {
        let members: Vec<String> = dedup_names(&group.members)
            .iter()
            .map(|login| self.config.user_dn(login))
            .collect();

        let entry = NewEntry::new(
            self.config.group_dn(&group.identifier),
            GROUP_OBJECT_CLASSES.iter().copied(),
        )
        .with_attribute("cn", [group.identifier.as_str()])
        .with_attribute("description", [group.description.as_str()])
        .with_attribute(MEMBER_ATTRIBUTE, members);

        vec![DirectoryOperation::AddEntry(entry)]
    }

    fn plan_modify(&self, modify: &ModifyUserGroups) -> DirectiveResult<Vec<DirectoryOperation>> {
        let diff = MembershipDiff::from_directive(modify)?;
        let user_dn = self.config.user_dn(&modify.login);

        let removals = diff.remove_set().iter().map(|group| {
            self.member_change(group, AttributeModification::delete_value(MEMBER_ATTRIBUTE, &user_dn))
        });
        let additions = diff.add_set().iter().map(|group| {
            self.member_change(group, AttributeModification::add_value(MEMBER_ATTRIBUTE, &user_dn))
        });

        Ok(removals.chain(additions).collect())
    }

    fn member_change(&self, group: &str, modification: AttributeModification) -> DirectoryOperation {
        DirectoryOperation::Modify {
            dn: self.config.group_dn(group),
            modification,
        }
    }
}

async fn issue<G: DirectoryGateway>(
    gateway: &mut G,
    operation: &DirectoryOperation,
) -> Result<(), GatewayError> {
    match operation {
        DirectoryOperation::AddEntry(entry) => gateway.add_entry(entry).await,
        DirectoryOperation::Modify { dn, modification } => {
            gateway.modify_attribute(dn, modification).await
        }
    }
}

fn classify_failure(operation: &DirectoryOperation, error: GatewayError) -> DirectiveError {
    match (operation, error) {
        (DirectoryOperation::AddEntry(entry), GatewayError::AlreadyExists { .. }) => {
            DirectiveError::Conflict {
                dn: entry.dn.clone(),
            }
        }
        (operation, source) => DirectiveError::Directory {
            dn: operation.dn().to_string(),
            attribute: operation.attribute().to_string(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::gateway::{DirectoryConnector, InMemoryDirectory, ModifyOperation};

    fn executor() -> DirectiveExecutor {
        let config = DirectoryConfig::builder()
            .initial_password("changeit")
            .build()
            .unwrap();
        DirectiveExecutor::new(Arc::new(config))
    }

    fn maria() -> Directive {
        Directive::AddUser(AddUser {
            full_name: "Maria Silva".to_string(),
            login: "msilva".to_string(),
            phone: "5551234".to_string(),
            groups: vec!["TI".to_string()],
        })
    }

    #[test]
    fn test_plan_add_user() {
        let operations = executor().plan(&maria()).unwrap();
        assert_eq!(operations.len(), 2);

        let DirectoryOperation::AddEntry(entry) = &operations[0] else {
            panic!("expected an entry add first");
        };
        assert_eq!(entry.dn, "cn=msilva,ou=users,dc=example,dc=com");
        assert_eq!(entry.attribute("cn"), Some(&["Maria Silva".to_string()][..]));
        assert_eq!(entry.attribute("uid"), Some(&["msilva".to_string()][..]));
        assert_eq!(entry.attribute("telephoneNumber"), Some(&["5551234".to_string()][..]));
        assert_eq!(entry.attribute("userPassword"), Some(&["changeit".to_string()][..]));
        assert!(entry.object_classes.contains(&"inetOrgPerson".to_string()));

        assert_eq!(
            operations[1],
            DirectoryOperation::Modify {
                dn: "cn=TI,ou=groups,dc=example,dc=com".to_string(),
                modification: AttributeModification::add_value(
                    "member",
                    "cn=msilva,ou=users,dc=example,dc=com"
                ),
            }
        );
    }

    #[test]
    fn test_generated_password_when_unset() {
        let executor = DirectiveExecutor::new(Arc::new(DirectoryConfig::default()));
        let operations = executor.plan(&maria()).unwrap();
        let DirectoryOperation::AddEntry(entry) = &operations[0] else {
            panic!("expected an entry add first");
        };
        let password = &entry.attribute("userPassword").unwrap()[0];
        assert_eq!(password.len(), 32);
    }

    #[test]
    fn test_plan_add_group_members() {
        let directive = Directive::AddGroup(AddGroup {
            identifier: "TI".to_string(),
            description: "Tecnologia".to_string(),
            members: vec!["msilva".to_string(), "jsouza".to_string(), "msilva".to_string()],
        });
        let operations = executor().plan(&directive).unwrap();
        let DirectoryOperation::AddEntry(entry) = &operations[0] else {
            panic!("expected an entry add");
        };
        assert_eq!(entry.dn, "cn=TI,ou=groups,dc=example,dc=com");
        assert_eq!(entry.attribute("description"), Some(&["Tecnologia".to_string()][..]));
        assert_eq!(
            entry.attribute("member").unwrap(),
            [
                "cn=msilva,ou=users,dc=example,dc=com",
                "cn=jsouza,ou=users,dc=example,dc=com"
            ]
        );
    }

    #[test]
    fn test_plan_group_without_members_omits_attribute() {
        let directive = Directive::AddGroup(AddGroup {
            identifier: "RH".to_string(),
            description: "Recursos Humanos".to_string(),
            members: vec![],
        });
        let operations = executor().plan(&directive).unwrap();
        let DirectoryOperation::AddEntry(entry) = &operations[0] else {
            panic!("expected an entry add");
        };
        assert_eq!(entry.attribute("member"), None);
    }

    #[test]
    fn test_plan_modify_removes_before_adding() {
        let directive = Directive::ModifyUserGroups(ModifyUserGroups {
            login: "msilva".to_string(),
            remove_groups: vec!["A".to_string()],
            add_groups: vec!["B".to_string()],
        });
        let operations = executor().plan(&directive).unwrap();
        let kinds: Vec<_> = operations
            .iter()
            .map(|operation| match operation {
                DirectoryOperation::Modify { dn, modification } => (dn.as_str(), modification.operation),
                DirectoryOperation::AddEntry(_) => panic!("no entry adds expected"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("cn=A,ou=groups,dc=example,dc=com", ModifyOperation::DeleteValue),
                ("cn=B,ou=groups,dc=example,dc=com", ModifyOperation::AddValue),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_directive_issues_nothing() {
        let directory = InMemoryDirectory::new();
        let mut session = directory.connect().await.unwrap();
        let directive = Directive::AddUser(AddUser {
            full_name: "Maria123".to_string(),
            login: "msilva".to_string(),
            phone: "5551234".to_string(),
            groups: vec![],
        });

        let outcome = executor().execute(&mut session, &directive).await;

        assert_eq!(
            outcome.error,
            Some(DirectiveError::Validation(ValidationError::invalid_text(
                "Nome Completo",
                "Maria123"
            )))
        );
        assert!(directory.operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_existing_user_reports_conflict_and_skips_memberships() {
        let directory = InMemoryDirectory::new();
        directory
            .seed(NewEntry::new("cn=msilva,ou=users,dc=example,dc=com", ["inetOrgPerson"]))
            .await;
        directory
            .seed(NewEntry::new("cn=TI,ou=groups,dc=example,dc=com", ["groupOfNames"]))
            .await;
        let mut session = directory.connect().await.unwrap();

        let outcome = executor().execute(&mut session, &maria()).await;

        assert_eq!(
            outcome.error,
            Some(DirectiveError::Conflict {
                dn: "cn=msilva,ou=users,dc=example,dc=com".to_string()
            })
        );
        assert!(outcome.applied.is_empty());
        assert_eq!(directory.operations().await.len(), 1);
        let group = directory.entry("cn=TI,ou=groups,dc=example,dc=com").await.unwrap();
        assert!(group.values("member").is_empty());
    }

    #[tokio::test]
    async fn test_failed_removal_does_not_block_additions() {
        let directory = InMemoryDirectory::new();
        for group in ["RH", "Financeiro", "Vendas"] {
            directory
                .seed(NewEntry::new(
                    format!("cn={group},ou=groups,dc=example,dc=com"),
                    ["groupOfNames"],
                ))
                .await;
        }
        let mut session = directory.connect().await.unwrap();
        let directive = Directive::ModifyUserGroups(ModifyUserGroups {
            login: "msilva".to_string(),
            remove_groups: vec!["RH".to_string(), "Compras".to_string()],
            add_groups: vec!["Financeiro".to_string(), "Vendas".to_string()],
        });

        let outcome = executor().execute(&mut session, &directive).await;

        assert_eq!(directory.operations().await.len(), 4);
        assert_eq!(outcome.applied.len(), 2);
        let failed: Vec<_> = outcome
            .errors()
            .map(|error| match error {
                DirectiveError::Directory { dn, .. } => dn.clone(),
                other => panic!("unexpected error: {other:?}"),
            })
            .collect();
        assert_eq!(
            failed,
            vec![
                "cn=RH,ou=groups,dc=example,dc=com",
                "cn=Compras,ou=groups,dc=example,dc=com"
            ]
        );
        for group in ["Financeiro", "Vendas"] {
            let entry = directory
                .entry(&format!("cn={group},ou=groups,dc=example,dc=com"))
                .await
                .unwrap();
            assert_eq!(entry.values("member"), ["cn=msilva,ou=users,dc=example,dc=com"]);
        }
    }

    #[tokio::test]
    async fn test_directory_failure_names_dn_and_attribute() {
        let directory = InMemoryDirectory::new();
        let mut session = directory.connect().await.unwrap();

        let outcome = executor().execute(&mut session, &maria()).await;

        assert_eq!(outcome.applied.len(), 1);
        match outcome.error {
            Some(DirectiveError::Directory { dn, attribute, source }) => {
                assert_eq!(dn, "cn=TI,ou=groups,dc=example,dc=com");
                assert_eq!(attribute, "member");
                assert!(matches!(source, GatewayError::NoSuchObject { .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
