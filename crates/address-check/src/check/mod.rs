//! The address-check state machine.
//!
//! A pass fingerprints the entity's address, joins or enqueues a queue entry,
//! verifies (cache first), then either corrects automatically, asks the user,
//! or accepts the input, re-verifying whatever address is finally chosen.
//! Every async boundary is followed by an integrity check so a pass never
//! persists a verdict for an address the user has since changed.

mod pass;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::address::{AddressField, AddressSnapshot};
use crate::config::{ConfigError, EngineConfig};
use crate::entity::AddressEntity;
use crate::status::StatusSet;
use crate::validity::{diff_snapshots, WordDiff};
use crate::verification::AddressVerifier;

pub use pass::IntegrityError;
use pass::{Pass, QueueRelease};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSource {
    UnverifiedUserInput,
    ConfirmedUserSelection,
    AutomaticCopyFromCorrection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// The pass did not reach a verdict (the user chose to keep editing).
    Started,
    Skipped,
    NetworkError,
    InvalidResult,
    Finished,
}

impl ProcessStatus {
    pub const fn is_persisted(self) -> bool {
        matches!(self, Self::Finished | Self::Skipped)
    }
}

/// Terminal output of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub address: AddressSnapshot,
    pub address_status: StatusSet,
    pub address_predictions: Vec<AddressSnapshot>,
    pub source_of_address: AddressSource,
    pub process_status: ProcessStatus,
}

/// Everything the presentation layer needs to render a correction dialog.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub entity_id: String,
    pub original: AddressSnapshot,
    pub predictions: Vec<AddressSnapshot>,
    pub statuses: StatusSet,
    /// Per prediction, word diffs of the fields that differ from `original`.
    pub diffs: Vec<BTreeMap<AddressField, WordDiff>>,
}

impl DecisionRequest {
    pub fn new(
        entity_id: impl Into<String>,
        original: AddressSnapshot,
        predictions: Vec<AddressSnapshot>,
        statuses: StatusSet,
    ) -> Self {
        let diffs = predictions
            .iter()
            .map(|prediction| diff_snapshots(&original, prediction))
            .collect();
        Self {
            entity_id: entity_id.into(),
            original,
            predictions,
            statuses,
            diffs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDecision {
    /// The user wants to fix the input themselves; nothing is persisted.
    EditIntent,
    /// The user confirmed this address (their own input or a prediction).
    Confirmed(AddressSnapshot),
}

/// Presentation layer (driving the correction/confirmation dialog).
#[async_trait]
pub trait DecisionPresenter: Send + Sync {
    /// May never resolve if the user walks away; the pass then stays pending.
    async fn ask_user_for_decision(&self, request: DecisionRequest) -> UserDecision;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    pub level: u32,
}

impl CheckOptions {
    /// Page-load or blur triggered checks.
    pub const fn background() -> Self {
        Self { level: 0 }
    }

    /// Checks spawned from inside a correction dialog.
    pub const fn interactive() -> Self {
        Self { level: 1 }
    }
}

/// Shared collaborators every pass runs against. Construct once per page/session.
pub struct CheckContext {
    config: EngineConfig,
    verifier: Arc<dyn AddressVerifier>,
    presenter: Arc<dyn DecisionPresenter>,
    open_modals: AtomicUsize,
}

impl CheckContext {
    pub fn new(
        config: EngineConfig,
        verifier: Arc<dyn AddressVerifier>,
        presenter: Arc<dyn DecisionPresenter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            verifier,
            presenter,
            open_modals: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Correction dialogs currently awaiting a user decision.
    pub fn open_modals(&self) -> usize {
        self.open_modals.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct AddressCheckEngine {
    context: Arc<CheckContext>,
}

impl AddressCheckEngine {
    pub fn new(context: CheckContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &CheckContext {
        &self.context
    }

    /// Runs (or joins) a check of the entity's current address.
    ///
    /// Callers triggering a check for an address that is already being checked
    /// receive the in-flight pass's result instead of starting another one.
    /// Must be called from within a tokio runtime.
    pub async fn check_address(
        &self,
        entity: &Arc<AddressEntity>,
        options: CheckOptions,
    ) -> ProcessResult {
        let captured = entity.snapshot();
        let fingerprint = captured.fingerprint();
        let key = fingerprint.queue_key(entity.id());

        let (pending, queued) = entity.queue().join_or_enqueue(&key, options.level, || {
            let release = QueueRelease::new(entity.clone(), key.clone());
            Pass {
                context: self.context.clone(),
                entity: entity.clone(),
                key: key.clone(),
                level: options.level,
                statuses: entity.statuses(),
                captured,
                fingerprint,
            }
            .run(release)
            .boxed()
        });

        if queued {
            // Drive the pass on its own task so a cancelled caller cannot strand
            // the queue entry.
            tokio::spawn(pending.clone());
        } else {
            debug!(entity = entity.id(), %key, "joining in-flight address check");
        }

        pending.await
    }
}
