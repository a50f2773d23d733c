use std::sync::{Arc, Mutex, RwLock};
use tracing::warn;

use crate::entity::hooks::call_guarded;
use crate::entity::HookError;

type Sink<T> = Arc<dyn Fn(&T) -> Result<(), HookError> + Send + Sync>;

/// Combined outcome of notifying every sink after a `set`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Completion {
    pub delivered: usize,
    pub failures: Vec<HookError>,
}

impl Completion {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Typed value with an explicit, ordered subscriber list.
pub struct ObservableField<T> {
    name: &'static str,
    value: RwLock<T>,
    sinks: Mutex<Vec<(String, Sink<T>)>>,
}

impl<T> ObservableField<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            value: RwLock::new(initial),
            sinks: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self) -> T {
        self.value
            .read()
            .expect("observable field lock poisoned")
            .clone()
    }

    pub fn subscribe<F>(&self, label: impl Into<String>, sink: F)
    where
        F: Fn(&T) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.sinks
            .lock()
            .expect("observable sinks mutex poisoned")
            .push((label.into(), Arc::new(sink)));
    }

    /// Stores `value` and synchronously notifies sinks in subscription order.
    pub fn set(&self, value: T) -> Completion {
        *self
            .value
            .write()
            .expect("observable field lock poisoned") = value.clone();

        let sinks: Vec<(String, Sink<T>)> = self
            .sinks
            .lock()
            .expect("observable sinks mutex poisoned")
            .clone();

        let mut completion = Completion::default();
        for (label, sink) in sinks {
            match call_guarded(&label, || sink(&value)) {
                Ok(()) => completion.delivered += 1,
                Err(error) => {
                    warn!(field = self.name, %error, "observable sink failed");
                    completion.failures.push(error);
                }
            }
        }
        completion
    }
}
