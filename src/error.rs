//! Error types for sfcd
//!
//! Every dialog operation returns [`SfcdError`]. The first six variants are the
//! error kinds the broker relays over the wire; [`SfcdError::Transport`] only
//! ever originates on the client side of a broker connection.

use thiserror::Error;

/// D-Bus error-name prefix shared by every error kind.
pub const ERROR_DOMAIN: &str = "org.sfcd.Error";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SfcdError {
    #[error("Could not create dialog: {0}")]
    Creation(String),

    #[error("Dialog not found: {0}")]
    Lookup(String),

    #[error("Change not allowed: {0}")]
    ForbiddenChange(String),

    #[error("Query not allowed: {0}")]
    ForbiddenQuery(String),

    #[error("Toolkit call failed: {0}")]
    ToolkitCallFailed(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Broker connection error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, SfcdError>;

/// Error kinds with stable numeric codes and wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Creation,
    Lookup,
    ForbiddenChange,
    ForbiddenQuery,
    ToolkitCallFailed,
    Unknown,
    Transport,
}

impl ErrorKind {
    /// Kinds the broker can put on the wire.
    pub const WIRE: [ErrorKind; 6] = [
        ErrorKind::Creation,
        ErrorKind::Lookup,
        ErrorKind::ForbiddenChange,
        ErrorKind::ForbiddenQuery,
        ErrorKind::ToolkitCallFailed,
        ErrorKind::Unknown,
    ];

    pub fn code(self) -> u32 {
        match self {
            ErrorKind::Creation => 0,
            ErrorKind::Lookup => 1,
            ErrorKind::ForbiddenChange => 2,
            ErrorKind::ForbiddenQuery => 3,
            ErrorKind::ToolkitCallFailed => 4,
            ErrorKind::Unknown => 5,
            ErrorKind::Transport => 6,
        }
    }

    /// Last component of the D-Bus error name.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Creation => "Creation",
            ErrorKind::Lookup => "Lookup",
            ErrorKind::ForbiddenChange => "ForbiddenChange",
            ErrorKind::ForbiddenQuery => "ForbiddenQuery",
            ErrorKind::ToolkitCallFailed => "ToolkitCallFailed",
            ErrorKind::Unknown => "Unknown",
            ErrorKind::Transport => "Transport",
        }
    }

    /// Parse a full D-Bus error name such as `org.sfcd.Error.Lookup`.
    ///
    /// Only the wire kinds are accepted; anything else is `None`.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        let short = name.strip_prefix(ERROR_DOMAIN)?.strip_prefix('.')?;
        Self::WIRE.into_iter().find(|kind| kind.name() == short)
    }
}

impl SfcdError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SfcdError::Creation(_) => ErrorKind::Creation,
            SfcdError::Lookup(_) => ErrorKind::Lookup,
            SfcdError::ForbiddenChange(_) => ErrorKind::ForbiddenChange,
            SfcdError::ForbiddenQuery(_) => ErrorKind::ForbiddenQuery,
            SfcdError::ToolkitCallFailed(_) => ErrorKind::ToolkitCallFailed,
            SfcdError::Unknown(_) => ErrorKind::Unknown,
            SfcdError::Transport(_) => ErrorKind::Transport,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SfcdError::Creation(m)
            | SfcdError::Lookup(m)
            | SfcdError::ForbiddenChange(m)
            | SfcdError::ForbiddenQuery(m)
            | SfcdError::ToolkitCallFailed(m)
            | SfcdError::Unknown(m)
            | SfcdError::Transport(m) => m,
        }
    }

    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Creation => SfcdError::Creation(message),
            ErrorKind::Lookup => SfcdError::Lookup(message),
            ErrorKind::ForbiddenChange => SfcdError::ForbiddenChange(message),
            ErrorKind::ForbiddenQuery => SfcdError::ForbiddenQuery(message),
            ErrorKind::ToolkitCallFailed => SfcdError::ToolkitCallFailed(message),
            ErrorKind::Unknown => SfcdError::Unknown(message),
            ErrorKind::Transport => SfcdError::Transport(message),
        }
    }

    /// Errors the user can do something about ("could not open dialog"),
    /// as opposed to calls made in the wrong dialog state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SfcdError::Creation(_)
                | SfcdError::Lookup(_)
                | SfcdError::ToolkitCallFailed(_)
                | SfcdError::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_name_roundtrip() {
        for kind in ErrorKind::WIRE {
            let full = format!("{}.{}", ERROR_DOMAIN, kind.name());
            assert_eq!(ErrorKind::from_wire_name(&full), Some(kind));
        }
    }

    #[test]
    fn test_foreign_names_rejected() {
        assert_eq!(ErrorKind::from_wire_name("org.freedesktop.DBus.Error.Failed"), None);
        assert_eq!(ErrorKind::from_wire_name("org.sfcd.ErrorLookup"), None);
        // Transport never travels over the wire
        assert_eq!(ErrorKind::from_wire_name("org.sfcd.Error.Transport"), None);
    }

    #[test]
    fn test_kind_preserved() {
        let err = SfcdError::from_kind(ErrorKind::ForbiddenQuery, "running");
        assert_eq!(err.kind(), ErrorKind::ForbiddenQuery);
        assert_eq!(err.message(), "running");
        assert!(!err.is_recoverable());
        assert!(SfcdError::Lookup("x".into()).is_recoverable());
    }
}
