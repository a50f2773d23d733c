#![allow(dead_code)]

use address_check::config::EngineConfig;
use address_check::{
    AddressCheckEngine, AddressEntity, AddressField, AddressSnapshot, AddressVerifier,
    CheckContext, DecisionPresenter, DecisionRequest, Fingerprint, InMemoryFieldBinding,
    StatusSet, TransportError, UserDecision, VerificationResponse,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

pub fn torstr() -> AddressSnapshot {
    AddressSnapshot::new()
        .with(AddressField::CountryCode, "DE")
        .with(AddressField::PostalCode, "10115")
        .with(AddressField::Locality, "Berlin")
        .with(AddressField::StreetName, "Torstr")
        .with(AddressField::BuildingNumber, "1")
}

pub fn statuses(tokens: &[&str]) -> StatusSet {
    tokens.iter().copied().collect()
}

pub fn response(tokens: &[&str], predictions: Vec<AddressSnapshot>) -> VerificationResponse {
    VerificationResponse {
        statuses: statuses(tokens),
        predictions,
    }
}

pub fn entity(id: &str, address: &AddressSnapshot) -> (Arc<InMemoryFieldBinding>, Arc<AddressEntity>) {
    let binding = Arc::new(InMemoryFieldBinding::from_snapshot(address));
    let entity = Arc::new(AddressEntity::new(id, binding.clone()));
    (binding, entity)
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_millis(5),
        turn_timeout: Some(Duration::from_secs(2)),
        auto_correction: true,
    }
}

pub fn engine_with(
    config: EngineConfig,
    verifier: Arc<RecordingVerifier>,
    presenter: Arc<ScriptedPresenter>,
) -> AddressCheckEngine {
    let context = CheckContext::new(config, verifier, presenter).expect("valid test config");
    AddressCheckEngine::new(context)
}

pub fn engine(verifier: Arc<RecordingVerifier>, presenter: Arc<ScriptedPresenter>) -> AddressCheckEngine {
    engine_with(fast_config(), verifier, presenter)
}

/// Closed until `open` is called; signals every arrival.
struct Gate {
    closed: Mutex<bool>,
    permits: Semaphore,
    entered: Notify,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            closed: Mutex::new(false),
            permits: Semaphore::new(0),
            entered: Notify::new(),
        }
    }
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        let closed = *self.closed.lock().expect("gate mutex poisoned");
        if closed {
            let _permit = self.permits.acquire().await.expect("gate semaphore closed");
        }
    }

    fn close(&self) {
        *self.closed.lock().expect("gate mutex poisoned") = true;
    }

    fn open(&self) {
        self.permits.add_permits(1024);
    }
}

type Scripted = Result<VerificationResponse, TransportError>;

/// Verifier answering from per-fingerprint scripts and recording every call.
///
/// Each fingerprint replays its scripted answers in order; the last one repeats.
#[derive(Default)]
pub struct RecordingVerifier {
    scripts: Mutex<HashMap<Fingerprint, VecDeque<Scripted>>>,
    calls: Mutex<Vec<AddressSnapshot>>,
    gate: Gate,
}

impl RecordingVerifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, address: &AddressSnapshot, answer: Scripted) {
        self.scripts
            .lock()
            .expect("scripts mutex poisoned")
            .entry(address.fingerprint())
            .or_default()
            .push_back(answer);
    }

    pub fn calls(&self) -> Vec<AddressSnapshot> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls mutex poisoned").len()
    }

    /// Holds every call until `release` is called.
    pub fn hold(&self) {
        self.gate.close();
    }

    pub fn release(&self) {
        self.gate.open();
    }

    pub async fn entered(&self) {
        self.gate.entered.notified().await;
    }
}

#[async_trait]
impl AddressVerifier for RecordingVerifier {
    async fn verify(&self, address: &AddressSnapshot) -> Result<VerificationResponse, TransportError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(address.clone());
        self.gate.pass().await;

        let mut scripts = self.scripts.lock().expect("scripts mutex poisoned");
        match scripts.get_mut(&address.fingerprint()) {
            Some(answers) if answers.len() > 1 => answers.pop_front().expect("non-empty script"),
            Some(answers) => answers
                .front()
                .cloned()
                .expect("scripted answers are never empty"),
            None => Err(TransportError::Unavailable(format!(
                "no scripted answer for {}",
                address.fingerprint()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    KeepOriginal,
    Prediction(usize),
    Edit,
}

/// Presenter replaying scripted choices; defaults to keeping the original.
#[derive(Default)]
pub struct ScriptedPresenter {
    choices: Mutex<VecDeque<Choice>>,
    requests: Mutex<Vec<DecisionRequest>>,
    gate: Gate,
}

impl ScriptedPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_choices(choices: &[Choice]) -> Arc<Self> {
        let presenter = Self::default();
        presenter
            .choices
            .lock()
            .expect("choices mutex poisoned")
            .extend(choices.iter().copied());
        Arc::new(presenter)
    }

    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }

    pub fn hold(&self) {
        self.gate.close();
    }

    pub fn release(&self) {
        self.gate.open();
    }

    pub async fn entered(&self) {
        self.gate.entered.notified().await;
    }
}

#[async_trait]
impl DecisionPresenter for ScriptedPresenter {
    async fn ask_user_for_decision(&self, request: DecisionRequest) -> UserDecision {
        self.requests
            .lock()
            .expect("requests mutex poisoned")
            .push(request.clone());
        self.gate.pass().await;

        let choice = self
            .choices
            .lock()
            .expect("choices mutex poisoned")
            .pop_front()
            .unwrap_or(Choice::KeepOriginal);
        match choice {
            Choice::KeepOriginal => UserDecision::Confirmed(request.original),
            Choice::Prediction(index) => UserDecision::Confirmed(
                request
                    .predictions
                    .get(index)
                    .cloned()
                    .unwrap_or(request.original),
            ),
            Choice::Edit => UserDecision::EditIntent,
        }
    }
}
