use address_check::{
    AddressField, AddressSnapshot, AddressVerifier, DecisionPresenter, DecisionRequest, DiffTag,
    TransportError, UserDecision, VerificationRequest, VerificationResponse,
};
use async_trait::async_trait;
use clap::ValueEnum;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Verifier replaying responses recorded per address fingerprint.
#[derive(Debug, Default, Clone)]
pub(crate) struct FixtureVerifier {
    responses: HashMap<String, VerificationResponse>,
}

impl FixtureVerifier {
    pub(crate) fn new(responses: HashMap<String, VerificationResponse>) -> Self {
        Self { responses }
    }
}

#[async_trait]
impl AddressVerifier for FixtureVerifier {
    async fn verify(
        &self,
        address: &AddressSnapshot,
    ) -> Result<VerificationResponse, TransportError> {
        let fingerprint = address.fingerprint();
        let request = VerificationRequest::from_snapshot(address);
        debug!(
            %fingerprint,
            request = %serde_json::to_string(&request).unwrap_or_default(),
            "replaying recorded verification"
        );
        match self.responses.get(fingerprint.as_str()) {
            Some(response) => Ok(response.clone()),
            None => {
                warn!(%fingerprint, "no recorded response for address");
                Err(TransportError::Unavailable(format!(
                    "no recorded response for {fingerprint}"
                )))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum DecisionChoice {
    /// Confirm the address exactly as entered
    #[default]
    Keep,
    /// Confirm the top prediction, falling back to the entered address
    First,
    /// Close the dialog and keep editing
    Edit,
}

/// Non-interactive stand-in for the correction dialog.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScriptedPresenter {
    choice: DecisionChoice,
}

impl ScriptedPresenter {
    pub(crate) fn new(choice: DecisionChoice) -> Self {
        Self { choice }
    }
}

#[async_trait]
impl DecisionPresenter for ScriptedPresenter {
    async fn ask_user_for_decision(&self, request: DecisionRequest) -> UserDecision {
        info!(
            entity = %request.entity_id,
            predictions = request.predictions.len(),
            changed_fields = %changed_field_labels(&request),
            choice = ?self.choice,
            "correction dialog answered from script"
        );

        match self.choice {
            DecisionChoice::Keep => UserDecision::Confirmed(request.original),
            DecisionChoice::First => UserDecision::Confirmed(
                request
                    .predictions
                    .into_iter()
                    .next()
                    .unwrap_or(request.original),
            ),
            DecisionChoice::Edit => UserDecision::EditIntent,
        }
    }
}

/// Labels of every field any prediction changes, in form order.
fn changed_field_labels(request: &DecisionRequest) -> String {
    let changed: BTreeSet<AddressField> = request
        .diffs
        .iter()
        .flat_map(|diff| diff.keys().copied())
        .collect();
    changed
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Inline JSON when the argument looks like JSON, otherwise a path to a JSON file.
pub(crate) fn read_json_arg(raw: &str) -> std::io::Result<String> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        Ok(raw.to_string())
    } else {
        std::fs::read_to_string(Path::new(raw))
    }
}

pub(crate) fn parse_diff_tag(raw: &str) -> Result<DiffTag, String> {
    DiffTag::parse(raw).ok_or_else(|| {
        format!("unknown diff tag '{raw}' (expected unchanged, added or removed)")
    })
}
