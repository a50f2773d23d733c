//! Address-check orchestration: a priority process queue, a per-address result
//! cache and the correction workflow that ties them to a remote verifier.

pub mod address;
pub mod cache;
pub mod check;
pub mod config;
pub mod entity;
pub mod error;
pub mod observable;
pub mod queue;
pub mod status;
pub mod telemetry;
pub mod validity;
pub mod verification;

pub use address::{AddressField, AddressSnapshot, Fingerprint};
pub use cache::{CacheEntry, CheckCache, RequestStatus};
pub use check::{
    AddressCheckEngine, AddressSource, CheckContext, CheckOptions, DecisionPresenter,
    DecisionRequest, IntegrityError, ProcessResult, ProcessStatus, UserDecision,
};
pub use entity::{
    AddressEntity, EntityHooks, FieldBinding, HookContext, HookError, HookList,
    InMemoryFieldBinding, PersistedState,
};
pub use queue::{ProcessQueue, TurnTimeout};
pub use status::{StatusCode, StatusSet};
pub use validity::{DiffSegment, DiffTag, FieldValidity, WordDiff};
pub use verification::{
    AddressVerifier, TransportError, VerificationRequest, VerificationResponse,
};
