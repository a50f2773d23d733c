use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    AddressSource, CheckContext, DecisionRequest, ProcessResult, ProcessStatus, UserDecision,
};
use crate::address::{AddressSnapshot, Fingerprint};
use crate::cache::CacheEntry;
use crate::entity::AddressEntity;
use crate::queue::TurnTimeout;
use crate::status::{StatusCode, StatusSet};
use crate::verification::{TransportError, VerificationResponse};

/// Raised when the entity no longer matches the address a pass started with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("address changed while checking (expected {expected}, found {actual})")]
    FingerprintChanged {
        expected: Fingerprint,
        actual: Fingerprint,
    },
    #[error("address fields were disabled while checking")]
    FieldsDisabled,
}

#[derive(Debug, thiserror::Error)]
enum PassAbort {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Turn(#[from] TurnTimeout),
}

impl PassAbort {
    fn process_status(&self) -> ProcessStatus {
        match self {
            PassAbort::Transport(_) | PassAbort::Turn(_) => ProcessStatus::NetworkError,
            PassAbort::Integrity(_) => ProcessStatus::InvalidResult,
        }
    }
}

/// Deletes the queue entry when the pass finishes or is dropped unpolled.
pub(super) struct QueueRelease {
    entity: Arc<AddressEntity>,
    key: String,
}

impl QueueRelease {
    pub(super) fn new(entity: Arc<AddressEntity>, key: String) -> Self {
        Self { entity, key }
    }
}

impl Drop for QueueRelease {
    fn drop(&mut self) {
        self.entity.queue().delete(&self.key);
    }
}

/// Decrements the open-dialog counter even if the pass is dropped mid-dialog.
struct ModalGuard<'a>(&'a CheckContext);

impl Drop for ModalGuard<'_> {
    fn drop(&mut self) {
        self.0.open_modals.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Classification {
    AutoCorrect,
    ManualAction,
    AcceptAsIs,
}

const CORRECT_OUTCOMES: [StatusCode; 2] = [
    StatusCode::ADDRESS_CORRECT,
    StatusCode::ADDRESS_MINOR_CORRECTION,
];

const CORRECTION_OUTCOMES: [StatusCode; 3] = [
    StatusCode::ADDRESS_MULTIPLE_VARIANTS,
    StatusCode::ADDRESS_NEEDS_CORRECTION,
    StatusCode::ADDRESS_MINOR_CORRECTION,
];

/// Only the first pass of an entity may correct automatically.
pub(crate) fn classify(
    sequence: u64,
    auto_correction: bool,
    response: &VerificationResponse,
) -> Classification {
    let statuses = &response.statuses;
    let has_predictions = !response.predictions.is_empty();

    let auto_eligible = sequence == 1
        && auto_correction
        && has_predictions
        && statuses.contains_any(&CORRECT_OUTCOMES)
        && !statuses.contains(&StatusCode::ADDRESS_MULTIPLE_VARIANTS);
    if auto_eligible {
        return Classification::AutoCorrect;
    }

    let needs_choice = has_predictions && statuses.contains_any(&CORRECTION_OUTCOMES);
    let not_found = statuses.contains(&StatusCode::ADDRESS_NOT_FOUND) || !has_predictions;
    if needs_choice || not_found {
        Classification::ManualAction
    } else {
        Classification::AcceptAsIs
    }
}

pub(super) struct Pass {
    pub(super) context: Arc<CheckContext>,
    pub(super) entity: Arc<AddressEntity>,
    pub(super) key: String,
    pub(super) level: u32,
    pub(super) captured: AddressSnapshot,
    pub(super) statuses: StatusSet,
    pub(super) fingerprint: Fingerprint,
}

impl Pass {
    pub(super) async fn run(self, release: QueueRelease) -> ProcessResult {
        let _release = release;
        match self.execute().await {
            Ok(result) => result,
            Err(abort) => {
                match &abort {
                    PassAbort::Integrity(error) => {
                        info!(entity = self.entity.id(), fingerprint = %self.fingerprint, %error, "address check discarded");
                    }
                    PassAbort::Transport(_) | PassAbort::Turn(_) => {
                        warn!(entity = self.entity.id(), fingerprint = %self.fingerprint, error = %abort, "address check failed");
                    }
                }
                self.unresolved(abort.process_status())
            }
        }
    }

    async fn execute(&self) -> Result<ProcessResult, PassAbort> {
        let config = self.context.config();
        let sequence = self.entity.next_sequence();
        debug!(
            entity = self.entity.id(),
            fingerprint = %self.fingerprint,
            sequence,
            level = self.level,
            "address check started"
        );

        self.entity
            .queue()
            .wait_for_turn(
                &self.key,
                self.level,
                config.poll_interval,
                config.turn_timeout,
            )
            .await?;
        self.ensure_intact()?;

        if self.statuses.is_terminal() {
            let state = self.entity.state();
            let result = ProcessResult {
                address: self.captured.clone(),
                address_status: self.statuses.clone(),
                address_predictions: state.predictions,
                source_of_address: state.source,
                process_status: ProcessStatus::Skipped,
            };
            debug!(entity = self.entity.id(), "address already decided; skipping");
            self.entity.persist(&result);
            return Ok(result);
        }

        let response = self.verify(&self.captured).await?;

        match classify(sequence, config.auto_correction, &response) {
            Classification::AutoCorrect => self.auto_correct(response).await,
            Classification::ManualAction => self.ask_user(response).await,
            Classification::AcceptAsIs => {
                let result = ProcessResult {
                    address: self.captured.clone(),
                    address_status: response
                        .statuses
                        .with(StatusCode::ADDRESS_SELECTED_BY_CUSTOMER),
                    address_predictions: response.predictions,
                    source_of_address: AddressSource::ConfirmedUserSelection,
                    process_status: ProcessStatus::Finished,
                };
                self.commit(&result)?;
                self.entity
                    .hooks()
                    .no_action
                    .run(self.entity.id(), Some(&result));
                Ok(result)
            }
        }
    }

    async fn auto_correct(
        &self,
        response: VerificationResponse,
    ) -> Result<ProcessResult, PassAbort> {
        let Some(top) = response.predictions.into_iter().next() else {
            return Ok(self.unresolved(ProcessStatus::Started));
        };

        let reverified = self.verify(&top).await?;
        let result = ProcessResult {
            address: top,
            address_status: reverified
                .statuses
                .with(StatusCode::ADDRESS_SELECTED_AUTOMATICALLY),
            address_predictions: reverified.predictions,
            source_of_address: AddressSource::AutomaticCopyFromCorrection,
            process_status: ProcessStatus::Finished,
        };
        self.commit(&result)?;
        info!(entity = self.entity.id(), "address corrected automatically");
        Ok(result)
    }

    async fn ask_user(&self, response: VerificationResponse) -> Result<ProcessResult, PassAbort> {
        let request = DecisionRequest::new(
            self.entity.id(),
            self.captured.clone(),
            response.predictions.clone(),
            response.statuses.clone(),
        );

        let decision = {
            self.context.open_modals.fetch_add(1, Ordering::SeqCst);
            let _modal = ModalGuard(&self.context);
            self.entity
                .hooks()
                .modal_opened
                .run(self.entity.id(), None);
            let decision = self.context.presenter.ask_user_for_decision(request).await;
            self.entity
                .hooks()
                .modal_closed
                .run(self.entity.id(), None);
            decision
        };
        self.ensure_intact()?;

        match decision {
            UserDecision::EditIntent => {
                debug!(entity = self.entity.id(), "user chose to edit the address");
                Ok(ProcessResult {
                    address: self.captured.clone(),
                    address_status: response.statuses,
                    address_predictions: response.predictions,
                    source_of_address: AddressSource::UnverifiedUserInput,
                    process_status: ProcessStatus::Started,
                })
            }
            UserDecision::Confirmed(chosen) => {
                let reverified = self.verify(&chosen).await?;
                let result = ProcessResult {
                    address: chosen,
                    address_status: reverified
                        .statuses
                        .with(StatusCode::ADDRESS_SELECTED_BY_CUSTOMER),
                    address_predictions: reverified.predictions,
                    source_of_address: AddressSource::ConfirmedUserSelection,
                    process_status: ProcessStatus::Finished,
                };
                self.commit(&result)?;
                info!(entity = self.entity.id(), "address confirmed by customer");
                Ok(result)
            }
        }
    }

    /// Cache-or-network verification, followed by an integrity check before
    /// anything is cached.
    async fn verify(&self, address: &AddressSnapshot) -> Result<VerificationResponse, PassAbort> {
        let fingerprint = address.fingerprint();
        if let Some(entry) = self.entity.cache().get(&fingerprint) {
            debug!(entity = self.entity.id(), %fingerprint, "verification cache hit");
            self.ensure_intact()?;
            return Ok(entry.response());
        }

        let response = self.context.verifier.verify(address).await?;
        self.ensure_intact()?;
        self.entity.cache().put(
            fingerprint,
            CacheEntry::succeeded(address.clone(), response.clone()),
        );
        Ok(response)
    }

    fn commit(&self, result: &ProcessResult) -> Result<(), PassAbort> {
        self.ensure_intact()?;
        self.entity.persist(result);
        Ok(())
    }

    fn ensure_intact(&self) -> Result<(), IntegrityError> {
        if !self.entity.fields_intact(&self.captured) {
            return Err(IntegrityError::FieldsDisabled);
        }
        let actual = self.entity.fingerprint();
        if actual != self.fingerprint {
            return Err(IntegrityError::FingerprintChanged {
                expected: self.fingerprint.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn unresolved(&self, process_status: ProcessStatus) -> ProcessResult {
        ProcessResult {
            address: self.captured.clone(),
            address_status: self.statuses.clone(),
            address_predictions: Vec::new(),
            source_of_address: AddressSource::UnverifiedUserInput,
            process_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressField;

    fn response(statuses: &[&str], predictions: usize) -> VerificationResponse {
        let prediction = AddressSnapshot::new().with(AddressField::Locality, "Berlin");
        VerificationResponse {
            statuses: statuses.iter().copied().collect(),
            predictions: vec![prediction; predictions],
        }
    }

    #[test]
    fn first_pass_with_minor_correction_is_corrected_automatically() {
        let minor = response(&["address_minor_correction"], 1);
        assert_eq!(classify(1, true, &minor), Classification::AutoCorrect);
        assert_eq!(classify(2, true, &minor), Classification::ManualAction);
        assert_eq!(classify(1, false, &minor), Classification::ManualAction);
    }

    #[test]
    fn multiple_variants_always_need_a_choice() {
        let variants = response(&["address_correct", "address_multiple_variants"], 3);
        assert_eq!(classify(1, true, &variants), Classification::ManualAction);
    }

    #[test]
    fn not_found_or_empty_predictions_need_confirmation() {
        assert_eq!(
            classify(1, true, &response(&["address_not_found"], 0)),
            Classification::ManualAction
        );
        assert_eq!(
            classify(3, true, &response(&["address_correct"], 0)),
            Classification::ManualAction
        );
    }

    #[test]
    fn later_correct_pass_is_accepted_as_is() {
        assert_eq!(
            classify(2, true, &response(&["address_correct"], 1)),
            Classification::AcceptAsIs
        );
    }
}
