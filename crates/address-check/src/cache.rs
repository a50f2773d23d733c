use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::address::{AddressSnapshot, Fingerprint};
use crate::status::StatusSet;
use crate::verification::VerificationResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Started,
    Success,
    Failed,
}

/// Memoized verification outcome for one fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub original_address: AddressSnapshot,
    pub predictions: Vec<AddressSnapshot>,
    pub statuses: StatusSet,
    pub request_status: RequestStatus,
}

impl CacheEntry {
    pub fn succeeded(original_address: AddressSnapshot, response: VerificationResponse) -> Self {
        Self {
            original_address,
            predictions: response.predictions,
            statuses: response.statuses,
            request_status: RequestStatus::Success,
        }
    }

    pub fn response(&self) -> VerificationResponse {
        VerificationResponse {
            statuses: self.statuses.clone(),
            predictions: self.predictions.clone(),
        }
    }
}

/// Per-address memo of successful verification results.
#[derive(Debug, Default)]
pub struct CheckCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
}

impl CheckCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let guard = self.entries.lock().expect("check cache mutex poisoned");
        guard.get(fingerprint).cloned()
    }

    /// Stores a successful result. Failed or unfinished entries are never
    /// cached and an existing entry is never replaced.
    pub fn put(&self, fingerprint: Fingerprint, entry: CacheEntry) -> bool {
        if entry.request_status != RequestStatus::Success {
            warn!(
                %fingerprint,
                status = ?entry.request_status,
                "refusing to cache unsuccessful verification"
            );
            return false;
        }

        let mut guard = self.entries.lock().expect("check cache mutex poisoned");
        if guard.contains_key(&fingerprint) {
            debug!(%fingerprint, "verification already cached");
            return false;
        }
        guard.insert(fingerprint, entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("check cache mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .expect("check cache mutex poisoned")
            .clear();
    }
}
