use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::address::{AddressField, AddressSnapshot};

/// Field synchronization layer owned by the host form.
pub trait FieldBinding: Send + Sync {
    fn value(&self, field: AddressField) -> Option<String>;
    fn set_value(&self, field: AddressField, value: &str);
    /// Whether the current form actively exposes `field`.
    fn is_active(&self, field: AddressField) -> bool;
}

#[derive(Debug, Default)]
struct BindingState {
    values: BTreeMap<AddressField, String>,
    active: BTreeSet<AddressField>,
}

/// Binding backed by plain memory, for headless hosts and tests.
#[derive(Debug, Default)]
pub struct InMemoryFieldBinding {
    state: Mutex<BindingState>,
}

impl InMemoryFieldBinding {
    /// Binding exposing exactly the fields present in `snapshot`.
    pub fn from_snapshot(snapshot: &AddressSnapshot) -> Self {
        let values: BTreeMap<AddressField, String> = snapshot
            .iter()
            .map(|(field, value)| (field, value.to_string()))
            .collect();
        let active = values.keys().copied().collect();
        Self {
            state: Mutex::new(BindingState { values, active }),
        }
    }

    pub fn activate(&self, field: AddressField) {
        let mut guard = self.state.lock().expect("field binding mutex poisoned");
        guard.active.insert(field);
    }

    pub fn deactivate(&self, field: AddressField) {
        let mut guard = self.state.lock().expect("field binding mutex poisoned");
        guard.active.remove(&field);
    }
}

impl FieldBinding for InMemoryFieldBinding {
    fn value(&self, field: AddressField) -> Option<String> {
        let guard = self.state.lock().expect("field binding mutex poisoned");
        guard.values.get(&field).cloned()
    }

    fn set_value(&self, field: AddressField, value: &str) {
        let mut guard = self.state.lock().expect("field binding mutex poisoned");
        guard.values.insert(field, value.to_string());
    }

    fn is_active(&self, field: AddressField) -> bool {
        let guard = self.state.lock().expect("field binding mutex poisoned");
        guard.active.contains(&field)
    }
}
