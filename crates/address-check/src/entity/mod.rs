//! The address entity: one logical address on a form (billing, shipping, ...)
//! together with its persisted verification state, result cache and observers.

mod binding;
pub(crate) mod hooks;

pub use binding::{FieldBinding, InMemoryFieldBinding};
pub use hooks::{EntityHooks, HookContext, HookError, HookEvent, HookList};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::address::{AddressField, AddressSnapshot, Fingerprint};
use crate::cache::CheckCache;
use crate::check::{AddressSource, ProcessResult};
use crate::observable::ObservableField;
use crate::queue::ProcessQueue;
use crate::status::StatusSet;
use crate::validity::{derive_validity_map, ValidityMap};

/// Public verification state of an entity, written only by `persist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedState {
    pub address: AddressSnapshot,
    pub statuses: StatusSet,
    pub predictions: Vec<AddressSnapshot>,
    pub source: AddressSource,
    pub checked_at: Option<DateTime<Utc>>,
}

/// Lowers the re-entrancy flag even if a collaborator panics mid-persist.
struct PersistingGuard<'a>(&'a AtomicBool);

impl Drop for PersistingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AddressEntity {
    id: String,
    binding: Arc<dyn FieldBinding>,
    cache: CheckCache,
    queue: ProcessQueue<ProcessResult>,
    state: Mutex<PersistedState>,
    sequence: AtomicU64,
    persisting: AtomicBool,
    validity: ObservableField<ValidityMap>,
    hooks: EntityHooks,
}

impl AddressEntity {
    pub fn new(id: impl Into<String>, binding: Arc<dyn FieldBinding>) -> Self {
        let address = snapshot_from(binding.as_ref());
        Self {
            id: id.into(),
            binding,
            cache: CheckCache::new(),
            queue: ProcessQueue::new(),
            state: Mutex::new(PersistedState {
                address,
                statuses: StatusSet::new(),
                predictions: Vec::new(),
                source: AddressSource::UnverifiedUserInput,
                checked_at: None,
            }),
            sequence: AtomicU64::new(0),
            persisting: AtomicBool::new(false),
            validity: ObservableField::new("field_validity", ValidityMap::new()),
            hooks: EntityHooks::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn binding(&self) -> &dyn FieldBinding {
        self.binding.as_ref()
    }

    pub fn cache(&self) -> &CheckCache {
        &self.cache
    }

    /// Passes of this entity, ordered by level and arrival. Other entities
    /// never share it.
    pub fn queue(&self) -> &ProcessQueue<ProcessResult> {
        &self.queue
    }

    pub fn hooks(&self) -> &EntityHooks {
        &self.hooks
    }

    /// Field-validity indicators, republished after every persist or reset.
    pub fn validity(&self) -> &ObservableField<ValidityMap> {
        &self.validity
    }

    /// Current values of every active field.
    pub fn snapshot(&self) -> AddressSnapshot {
        snapshot_from(self.binding.as_ref())
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.snapshot().fingerprint()
    }

    pub fn state(&self) -> PersistedState {
        self.state.lock().expect("entity state mutex poisoned").clone()
    }

    pub fn statuses(&self) -> StatusSet {
        self.state
            .lock()
            .expect("entity state mutex poisoned")
            .statuses
            .clone()
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of passes that have run for this entity.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// True while a multi-field transactional update is being written.
    pub fn is_persisting(&self) -> bool {
        self.persisting.load(Ordering::Acquire)
    }

    /// True when the core fields and every field of `captured` are still exposed.
    pub fn fields_intact(&self, captured: &AddressSnapshot) -> bool {
        AddressField::core()
            .into_iter()
            .chain(captured.fields())
            .all(|field| self.binding.is_active(field))
    }

    /// User edit: writes through the binding and marks the address dirty.
    pub fn edit_field(&self, field: AddressField, value: &str) {
        self.binding.set_value(field, value);
        self.mark_dirty();
    }

    /// Drops any verdict for the previous values. Ignored while persisting, so
    /// field writes made by the persist transaction do not reset themselves.
    pub fn mark_dirty(&self) -> bool {
        if self.is_persisting() {
            return false;
        }

        let address = self.snapshot();
        {
            let mut state = self.state.lock().expect("entity state mutex poisoned");
            state.address = address.clone();
            state.statuses = StatusSet::new();
            state.predictions.clear();
            state.source = AddressSource::UnverifiedUserInput;
        }
        debug!(entity = %self.id, "address marked dirty");
        self.publish_validity(&address, &StatusSet::new());
        true
    }

    /// Restores a previously decided state, e.g. when a form is re-rendered.
    pub fn restore(
        &self,
        statuses: StatusSet,
        predictions: Vec<AddressSnapshot>,
        source: AddressSource,
    ) {
        let address = self.snapshot();
        {
            let mut state = self.state.lock().expect("entity state mutex poisoned");
            state.address = address.clone();
            state.statuses = statuses.clone();
            state.predictions = predictions;
            state.source = source;
        }
        self.publish_validity(&address, &statuses);
    }

    /// Writes a finished pass into the public state as one transaction.
    pub(crate) fn persist(&self, result: &ProcessResult) {
        self.persisting.store(true, Ordering::Release);
        let _guard = PersistingGuard(&self.persisting);

        self.hooks.before_persist.run(&self.id, Some(result));

        for (field, value) in result.address.iter() {
            let unchanged = self.binding.value(field).as_deref() == Some(value);
            if self.binding.is_active(field) && !unchanged {
                self.binding.set_value(field, value);
            }
        }

        {
            let mut state = self.state.lock().expect("entity state mutex poisoned");
            *state = PersistedState {
                address: result.address.clone(),
                statuses: result.address_status.clone(),
                predictions: result.address_predictions.clone(),
                source: result.source_of_address,
                checked_at: Some(Utc::now()),
            };
        }

        self.hooks.after_persist.run(&self.id, Some(result));
        self.publish_validity(&result.address, &result.address_status);
    }

    fn publish_validity(&self, address: &AddressSnapshot, statuses: &StatusSet) {
        let map = derive_validity_map(address, statuses, |field| self.binding.is_active(field));
        self.validity.set(map);
    }
}

fn snapshot_from(binding: &dyn FieldBinding) -> AddressSnapshot {
    AddressField::ordered()
        .into_iter()
        .filter(|field| binding.is_active(*field))
        .filter_map(|field| binding.value(field).map(|value| (field, value)))
        .collect()
}
