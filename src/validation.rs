//! Field syntax rules applied before any directory mutation.
//!
//! Names, logins and group identifiers must be letters and whitespace only;
//! telephone numbers must be digits only. Every directive is checked
//! field by field and the first violation is returned.

use crate::document::{AddGroup, AddUser, Directive, ModifyUserGroups};
use crate::error::{ValidationError, ValidationResult};
use regex::Regex;
use std::sync::LazyLock;

static TEXT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\s]+$").expect("text pattern is valid"));

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("phone pattern is valid"));

/// Accept only letters and whitespace (at least one character).
pub fn validate_text(field: &str, value: &str) -> ValidationResult<()> {
    if TEXT_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::invalid_text(field, value))
    }
}

/// Accept only ASCII digits (at least one).
pub fn validate_phone(field: &str, value: &str) -> ValidationResult<()> {
    if PHONE_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::invalid_phone(field, value))
    }
}

/// Check every field of a directive, stopping at the first violation.
pub fn validate_directive(directive: &Directive) -> ValidationResult<()> {
    match directive {
        Directive::AddUser(user) => validate_add_user(user),
        Directive::AddGroup(group) => validate_add_group(group),
        Directive::ModifyUserGroups(modify) => validate_modify(modify),
    }
}

fn validate_add_user(user: &AddUser) -> ValidationResult<()> {
    validate_text("Nome Completo", &user.full_name)?;
    validate_text("Login", &user.login)?;
    validate_phone("Telefone", &user.phone)?;
    user.groups
        .iter()
        .try_for_each(|group| validate_text("Grupo", group))
}

fn validate_add_group(group: &AddGroup) -> ValidationResult<()> {
    validate_text("Identificador", &group.identifier)?;
    group
        .members
        .iter()
        .try_for_each(|member| validate_text("Membro", member))
}

fn validate_modify(modify: &ModifyUserGroups) -> ValidationResult<()> {
    validate_text("Login", &modify.login)?;
    modify
        .remove_groups
        .iter()
        .chain(&modify.add_groups)
        .try_for_each(|group| validate_text("Grupo", group))
}
