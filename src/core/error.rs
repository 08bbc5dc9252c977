use thiserror::Error;

/// Broad classification of every failure the crate can report.
///
/// Callers decide whether to retry, fix input or give up based on the kind
/// alone; the concrete [`TbaiError`] variant carries the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or ineligible invoice, or content rejected by the regulator.
    /// Not retryable: the input must be fixed.
    Validation,
    /// The gateway already holds a record for this invoice.
    Duplicate,
    /// Transport or server-side failure. Safe to retry.
    Connection,
    /// Unexpected or programmer error. Fatal.
    Internal,
}

/// Errors that can occur while converting, signing or submitting a document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TbaiError {
    /// The invoice cannot be expressed as a TicketBAI document, or the
    /// gateway rejected its content.
    #[error("validation failed: {}", describe(.code, .message))]
    Validation {
        code: Option<String>,
        message: String,
    },

    /// The gateway reports the record as already registered.
    #[error("duplicate: {}", describe(.code, .message))]
    Duplicate {
        code: Option<String>,
        message: String,
    },

    /// A previous submission with the same identifiers exists and its
    /// signature differs from the one just generated.
    #[error("already processed with different content")]
    AlreadyProcessed,

    /// Network failure or server-side technical error.
    #[error("connection error: {}", describe(.code, .message))]
    Connection {
        code: Option<String>,
        message: String,
    },

    /// The signing collaborator failed. The original error is the source.
    #[error("signing failed: {0}")]
    Signing(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Unexpected internal condition.
    #[error("internal error: {0}")]
    Internal(String),
}

fn describe(code: &Option<String>, message: &str) -> String {
    match code {
        Some(code) if message.is_empty() => code.clone(),
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    }
}

impl TbaiError {
    /// Validation error without a remote code.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: None,
            message: message.into(),
        }
    }

    /// Connection error without a remote code.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            code: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::AlreadyProcessed => ErrorKind::Validation,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Signing(_) | Self::Xml(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Machine-readable code supplied by the gateway, when there is one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Validation { code, .. }
            | Self::Duplicate { code, .. }
            | Self::Connection { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Human-readable message, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Validation { message, .. }
            | Self::Duplicate { message, .. }
            | Self::Connection { message, .. } => message.clone(),
            Self::Xml(message) | Self::Internal(message) => message.clone(),
            Self::Signing(source) => source.to_string(),
            Self::AlreadyProcessed => self.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}

/// A single invoice precondition failure with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the offending field (e.g. "supplier.tax_id.zone").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// Short rule identifier when the check maps to a named rule.
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}

impl From<Vec<ValidationError>> for TbaiError {
    fn from(errors: Vec<ValidationError>) -> Self {
        let message = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        TbaiError::validation(message)
    }
}
