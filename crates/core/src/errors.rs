use thiserror::Error;

use crate::domain::ids::{InvestorId, SignalId, TenantId};
use crate::domain::market::SignalStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid signal transition from {from:?} to {to:?}")]
    InvalidSignalTransition { from: SignalStatus, to: SignalStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure raised by a store implementation. Carries strings so the core crate
/// stays independent of the persistence driver.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(String),
    #[error("store decode failed: {0}")]
    Decode(String),
    #[error("store source unavailable: {0}")]
    Unavailable(String),
}

/// Lookup of a collaborator record that the caller named explicitly.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("investor `{investor_id}` was not found for tenant `{tenant_id}`")]
    InvestorNotFound { tenant_id: TenantId, investor_id: InvestorId },
    #[error("investor lookup failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TriageError {
    #[error("signal `{signal_id}` was not found for tenant `{tenant_id}`")]
    SignalNotFound { tenant_id: TenantId, signal_id: SignalId },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
