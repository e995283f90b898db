//! Reconciliation error types

use crate::identity::IdentityKey;
use std::time::Duration;
use thiserror::Error;

/// Error reported by a backend client wrapper.
///
/// The wrapper decides whether a failure can be cured by waiting
/// (`Transient`) or not (`Permanent`); the retry wrapper only looks at the tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("transient backend error: {0}")]
    Transient(String),

    #[error("permanent backend error: {0}")]
    Permanent(String),
}

impl ApiError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, ApiError::Permanent(_))
    }

    /// Backend error text without the classification prefix
    pub fn message(&self) -> &str {
        match self {
            ApiError::Transient(msg) | ApiError::Permanent(msg) => msg,
        }
    }
}

/// Planned operation kind, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Detach,
    Attach,
    SecurityGroups,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Detach => write!(f, "detach"),
            OperationKind::Attach => write!(f, "attach"),
            OperationKind::SecurityGroups => write!(f, "security group update"),
        }
    }
}

/// Reconciliation engine errors
#[derive(Error, Debug)]
pub enum NicError {
    #[error("Duplicate interface identity: {0}")]
    DuplicateIdentity(IdentityKey),

    #[error("Interface of type {interface_type} is missing its {field}")]
    MissingDiscriminant {
        interface_type: String,
        field: &'static str,
    },

    #[error("Only one interface may be marked default, found {0}")]
    MultipleDefaults(usize),

    #[error(
        "Cannot detach parent interface {0}: the trunk interface of a running bare metal instance is immutable"
    )]
    TrunkImmutable(IdentityKey),

    #[error("Interface {0} has no port id and ip address to detach by")]
    NotDetachable(IdentityKey),

    #[error("Allowed address pairs cannot be assigned to a VIP reserved fixed IP ({0})")]
    VipWithAllowedAddressPairs(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Attached interface {key} did not appear in the listing of {instance_id}: {reason}")]
    InterfaceNotListed {
        key: IdentityKey,
        instance_id: String,
        reason: String,
    },

    #[error("Task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("Task {task_id} did not finish within {timeout:?}")]
    TaskTimeout { task_id: String, timeout: Duration },

    #[error("{kind} of interface {key} failed after {completed} of {planned} operations: {source}")]
    Operation {
        kind: OperationKind,
        key: IdentityKey,
        completed: usize,
        planned: usize,
        #[source]
        source: Box<NicError>,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl NicError {
    /// Configuration errors are detected before any backend call and never retried
    pub fn is_configuration_error(&self) -> bool {
        match self {
            NicError::DuplicateIdentity(_)
            | NicError::MissingDiscriminant { .. }
            | NicError::MultipleDefaults(_)
            | NicError::TrunkImmutable(_)
            | NicError::NotDetachable(_)
            | NicError::VipWithAllowedAddressPairs(_)
            | NicError::InvalidConfig(_) => true,
            NicError::Operation { source, .. } => source.is_configuration_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NicError>;
