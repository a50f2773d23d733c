use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::warn;

use crate::check::ProcessResult;

/// Failure reported by an observer callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("hook '{label}' failed: {message}")]
    Failed { label: String, message: String },
    #[error("hook '{label}' panicked: {message}")]
    Panicked { label: String, message: String },
}

impl HookError {
    pub fn failed(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            label: label.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    BeforePersist,
    AfterPersist,
    NoAction,
    ModalOpened,
    ModalClosed,
}

impl HookEvent {
    pub const fn label(self) -> &'static str {
        match self {
            Self::BeforePersist => "before_persist",
            Self::AfterPersist => "after_persist",
            Self::NoAction => "no_action",
            Self::ModalOpened => "modal_opened",
            Self::ModalClosed => "modal_closed",
        }
    }
}

/// What observers see when a hook fires.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub entity_id: &'a str,
    pub event: HookEvent,
    pub result: Option<&'a ProcessResult>,
}

type Hook = Arc<dyn Fn(&HookContext<'_>) -> Result<(), HookError> + Send + Sync>;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs `call` inside an error boundary, turning panics into [`HookError::Panicked`].
pub(crate) fn call_guarded<F>(label: &str, call: F) -> Result<(), HookError>
where
    F: FnOnce() -> Result<(), HookError>,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(outcome) => outcome,
        Err(payload) => Err(HookError::Panicked {
            label: label.to_string(),
            message: panic_message(payload),
        }),
    }
}

/// Ordered handler list. A failing handler is logged and skipped; the rest still run.
pub struct HookList {
    event: HookEvent,
    handlers: RwLock<Vec<(String, Hook)>>,
}

impl HookList {
    pub fn new(event: HookEvent) -> Self {
        Self {
            event,
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn register<F>(&self, label: impl Into<String>, handler: F)
    where
        F: Fn(&HookContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .expect("hook list lock poisoned")
            .push((label.into(), Arc::new(handler)));
    }

    pub fn len(&self) -> usize {
        self.handlers.read().expect("hook list lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every handler in registration order and returns the failures.
    pub fn run(&self, entity_id: &str, result: Option<&ProcessResult>) -> Vec<HookError> {
        let handlers: Vec<(String, Hook)> = self
            .handlers
            .read()
            .expect("hook list lock poisoned")
            .clone();
        let context = HookContext {
            entity_id,
            event: self.event,
            result,
        };

        let mut failures = Vec::new();
        for (label, handler) in handlers {
            if let Err(error) = call_guarded(&label, || handler(&context)) {
                warn!(entity = entity_id, hook = self.event.label(), %error, "address hook failed");
                failures.push(error);
            }
        }
        failures
    }
}

/// Observer lists exposed by an address entity.
pub struct EntityHooks {
    pub before_persist: HookList,
    pub after_persist: HookList,
    pub no_action: HookList,
    pub modal_opened: HookList,
    pub modal_closed: HookList,
}

impl Default for EntityHooks {
    fn default() -> Self {
        Self {
            before_persist: HookList::new(HookEvent::BeforePersist),
            after_persist: HookList::new(HookEvent::AfterPersist),
            no_action: HookList::new(HookEvent::NoAction),
            modal_opened: HookList::new(HookEvent::ModalOpened),
            modal_closed: HookList::new(HookEvent::ModalClosed),
        }
    }
}
