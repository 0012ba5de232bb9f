//! Error types for change-document processing.
//!
//! Each layer owns one error enum: document decoding ([`ParseError`]), field
//! rules ([`ValidationError`]), directory access ([`GatewayError`]),
//! configuration ([`ConfigError`]). [`DirectiveError`] is what a single
//! directive reports, and [`ProcessError`] covers failures that stop a whole
//! document before any directive runs.

/// Errors raised while decoding a change document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The document is not well-formed XML
    #[error("Malformed document: {message}")]
    Syntax { message: String },

    /// The document contains no root element
    #[error("Document has no root element")]
    MissingRoot,

    /// An `add`/`modify` element names a class this tool does not handle
    #[error("Unsupported class-name '{class_name}' on <{element}> element")]
    UnknownClass { element: String, class_name: String },

    /// A required attribute element is absent
    #[error("Required attribute '{attribute}' is missing from {class_name} element")]
    MissingAttribute {
        class_name: String,
        attribute: String,
    },

    /// A required attribute element has no `value` node
    #[error("Attribute '{attribute}' of {class_name} element has no value")]
    MissingValue {
        class_name: String,
        attribute: String,
    },

    /// A required value is present but blank
    #[error("Attribute '{attribute}' of {class_name} element has an empty value")]
    EmptyValue {
        class_name: String,
        attribute: String,
    },

    /// A single-valued attribute carries more than one value
    #[error("Attribute '{attribute}' of {class_name} element must have exactly one value, found {count}")]
    MultipleValues {
        class_name: String,
        attribute: String,
        count: usize,
    },

    /// A modify element lacks its association node
    #[error("Modify element for {class_name} has no association")]
    MissingAssociation { class_name: String },
}

impl ParseError {
    /// Create a syntax error from any displayable reader error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    pub(crate) fn missing_attribute(class_name: &str, attribute: &str) -> Self {
        Self::MissingAttribute {
            class_name: class_name.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn missing_value(class_name: &str, attribute: &str) -> Self {
        Self::MissingValue {
            class_name: class_name.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn empty_value(class_name: &str, attribute: &str) -> Self {
        Self::EmptyValue {
            class_name: class_name.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

/// Field syntax violations.
///
/// Raised before any directory operation for the offending directive is
/// issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Field must contain only letters and whitespace
    #[error("Field '{field}' must contain only letters and spaces, got '{value}'")]
    InvalidText { field: String, value: String },

    /// Field must contain only digits
    #[error("Field '{field}' must contain only digits, got '{value}'")]
    InvalidPhone { field: String, value: String },

    /// The same group is both added and removed in one membership edit
    #[error("Group '{group}' appears in both the remove and add lists for user '{login}'")]
    AmbiguousGroup { login: String, group: String },
}

impl ValidationError {
    pub fn invalid_text(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidText {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn invalid_phone(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidPhone {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Name of the field that failed, or `"Grupo"` for membership conflicts.
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidText { field, .. } | Self::InvalidPhone { field, .. } => field,
            Self::AmbiguousGroup { .. } => "Grupo",
        }
    }
}

/// Errors reported by a [`DirectoryGateway`](crate::gateway::DirectoryGateway).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Could not reach or bind to the directory server
    #[error("Directory connection failed: {message}")]
    Connection { message: String },

    /// Bind credentials were rejected
    #[error("Directory bind rejected for '{bind_dn}'")]
    InvalidCredentials { bind_dn: String },

    /// The target DN is already present
    #[error("Entry '{dn}' already exists")]
    AlreadyExists { dn: String },

    /// The target DN does not exist
    #[error("Entry '{dn}' does not exist")]
    NoSuchObject { dn: String },

    /// Any other non-success result from the server
    #[error("Directory operation on '{dn}' failed with code {code}: {message}")]
    Operation {
        dn: String,
        code: u32,
        message: String,
    },
}

impl GatewayError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn operation(dn: impl Into<String>, code: u32, message: impl Into<String>) -> Self {
        Self::Operation {
            dn: dn.into(),
            code,
            message: message.into(),
        }
    }

    /// Whether this error means the server could not be used at all.
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::InvalidCredentials { .. }
        )
    }
}

/// Why a single directive was not (fully) applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The entry to create already exists; it was left untouched
    #[error("Conflict: entry '{dn}' already exists")]
    Conflict { dn: String },

    /// A directory-side failure for one operation
    #[error("Directory operation failed on '{dn}' (attribute '{attribute}'): {source}")]
    Directory {
        dn: String,
        attribute: String,
        #[source]
        source: GatewayError,
    },
}

impl DirectiveError {
    /// Whether the directive was rejected before touching the directory.
    pub const fn is_rejected_before_write(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Validation(_))
    }
}

/// Invalid or inconsistent configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Cannot read configuration file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse configuration file '{path}': {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Failures that stop a whole document.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Cannot read document '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse document '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("Cannot open directory connection for '{path}': {source}")]
    Connect {
        path: String,
        #[source]
        source: GatewayError,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type GatewayResult<T> = Result<T, GatewayError>;
pub type DirectiveResult<T> = Result<T, DirectiveError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field() {
        let err = ValidationError::invalid_text("Login", "ms1lva");
        assert_eq!(err.field(), "Login");
        assert!(err.to_string().contains("ms1lva"));
    }

    #[test]
    fn test_directive_error_classification() {
        let rejected: DirectiveError = ValidationError::invalid_phone("Telefone", "12a").into();
        assert!(rejected.is_rejected_before_write());

        let conflict = DirectiveError::Conflict {
            dn: "cn=msilva,ou=users,dc=example,dc=com".to_string(),
        };
        assert!(!conflict.is_rejected_before_write());
    }

    #[test]
    fn test_gateway_error_categories() {
        assert!(GatewayError::connection("refused").is_connection_error());
        assert!(
            GatewayError::InvalidCredentials {
                bind_dn: "uid=admin,ou=system".to_string()
            }
            .is_connection_error()
        );
        assert!(!GatewayError::operation("cn=x", 50, "insufficient access").is_connection_error());
    }
}
