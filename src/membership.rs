//! Group membership diffs.
//!
//! A [`MembershipDiff`] is the disjoint pair of groups a user leaves and
//! joins in one modify directive. Candidates are deduplicated keeping their
//! first position, so the resulting directory operations follow document
//! order. Group names compare case-insensitively, as `cn` values do in the
//! directory.

use crate::document::ModifyUserGroups;
use crate::error::{ValidationError, ValidationResult};
use serde::Serialize;
use std::collections::HashSet;

/// Disjoint, deduplicated remove/add sets for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipDiff {
    remove: Vec<String>,
    add: Vec<String>,
}

impl MembershipDiff {
    /// Build a diff from raw candidate lists.
    ///
    /// Rejects a group named in both lists instead of guessing which intent
    /// wins.
    pub fn new<R, A>(login: &str, remove_candidates: R, add_candidates: A) -> ValidationResult<Self>
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let remove = dedup_names(remove_candidates);
        let add = dedup_names(add_candidates);

        let removed: HashSet<String> = remove.iter().map(|group| group.to_lowercase()).collect();
        if let Some(group) = add.iter().find(|group| removed.contains(&group.to_lowercase())) {
            return Err(ValidationError::AmbiguousGroup {
                login: login.to_string(),
                group: group.clone(),
            });
        }

        Ok(Self { remove, add })
    }

    /// Diff for a modify directive.
    pub fn from_directive(modify: &ModifyUserGroups) -> ValidationResult<Self> {
        Self::new(&modify.login, &modify.remove_groups, &modify.add_groups)
    }

    /// Groups the user leaves, first-occurrence order.
    pub fn remove_set(&self) -> &[String] {
        &self.remove
    }

    /// Groups the user joins, first-occurrence order.
    pub fn add_set(&self) -> &[String] {
        &self.add
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Drop repeated names, compared case-insensitively, keeping each name's
/// first position.
pub fn dedup_names<I>(candidates: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let candidate = candidate.as_ref();
            seen.insert(candidate.to_lowercase())
                .then(|| candidate.to_string())
        })
        .collect()
}
