//! In-memory identity registry and subscriber sets.
//!
//! The population is fixed at construction. Only subscriber sets change, and
//! every operation runs inside one critical section of a single coarse lock,
//! so each call is atomic with respect to all other connections.

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::RegistryError;
use crate::ids::IdentityId;

/// Seed entry used to build the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySeed {
    /// Identity id.
    pub id: IdentityId,
    /// Human-readable name.
    pub display_name: String,
}

impl IdentitySeed {
    /// Create a seed entry.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: IdentityId::from_raw(id),
            display_name: display_name.into(),
        }
    }
}

/// A registered participant and the identities subscribed to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Identity id.
    pub id: IdentityId,
    /// Human-readable name.
    pub display_name: String,
    subscribers: BTreeSet<IdentityId>,
}

impl Identity {
    fn new(seed: IdentitySeed) -> Self {
        Self {
            id: seed.id,
            display_name: seed.display_name,
            subscribers: BTreeSet::new(),
        }
    }

    /// Subscribers in id order.
    pub fn subscribers(&self) -> impl Iterator<Item = &IdentityId> {
        self.subscribers.iter()
    }

    /// Number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Whether an operation mutated the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The subscriber set changed.
    Changed,
    /// The request was already satisfied.
    Unchanged,
}

/// Shared mapping from identity id to identity record.
#[derive(Debug, Default)]
pub struct Registry {
    identities: Mutex<HashMap<IdentityId, Identity>>,
}

impl Registry {
    /// Build a registry from a seed list. Later duplicates of an id are ignored.
    pub fn new(seeds: impl IntoIterator<Item = IdentitySeed>) -> Self {
        let mut identities = HashMap::new();
        for seed in seeds {
            let _ = identities
                .entry(seed.id.clone())
                .or_insert_with(|| Identity::new(seed));
        }
        Self {
            identities: Mutex::new(identities),
        }
    }

    /// Add `caller` to `target`'s subscriber set.
    pub fn subscribe(
        &self,
        caller: &IdentityId,
        target: &IdentityId,
    ) -> Result<Outcome, RegistryError> {
        let mut identities = self.identities.lock();
        if !identities.contains_key(caller) {
            return Err(RegistryError::UnknownIdentity { id: caller.clone() });
        }
        if caller == target {
            return Err(RegistryError::SelfSubscription { id: caller.clone() });
        }
        let Some(record) = identities.get_mut(target) else {
            return Err(RegistryError::UnknownIdentity { id: target.clone() });
        };
        if record.subscribers.insert(caller.clone()) {
            Ok(Outcome::Changed)
        } else {
            Ok(Outcome::Unchanged)
        }
    }

    /// Remove `caller` from `target`'s subscriber set.
    pub fn unsubscribe(
        &self,
        caller: &IdentityId,
        target: &IdentityId,
    ) -> Result<Outcome, RegistryError> {
        let mut identities = self.identities.lock();
        if !identities.contains_key(caller) {
            return Err(RegistryError::UnknownIdentity { id: caller.clone() });
        }
        let Some(record) = identities.get_mut(target) else {
            return Err(RegistryError::UnknownIdentity { id: target.clone() });
        };
        if record.subscribers.remove(caller) {
            Ok(Outcome::Changed)
        } else {
            Ok(Outcome::Unchanged)
        }
    }

    /// Number of identities subscribed to `target`.
    pub fn count_subscribers(&self, target: &IdentityId) -> Result<usize, RegistryError> {
        self.identities
            .lock()
            .get(target)
            .map(Identity::subscriber_count)
            .ok_or_else(|| RegistryError::UnknownIdentity { id: target.clone() })
    }

    /// Snapshot of `target`'s subscribers in id order.
    pub fn subscribers_of(&self, target: &IdentityId) -> Result<Vec<IdentityId>, RegistryError> {
        self.identities
            .lock()
            .get(target)
            .map(|record| record.subscribers().cloned().collect())
            .ok_or_else(|| RegistryError::UnknownIdentity { id: target.clone() })
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &IdentityId) -> bool {
        self.identities.lock().contains_key(id)
    }

    /// Display name of a registered identity.
    pub fn display_name(&self, id: &IdentityId) -> Option<String> {
        self.identities
            .lock()
            .get(id)
            .map(|record| record.display_name.clone())
    }

    /// All registered ids in id order.
    pub fn identity_ids(&self) -> Vec<IdentityId> {
        let mut ids: Vec<_> = self.identities.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.identities.lock().len()
    }

    /// Whether no identity is registered.
    pub fn is_empty(&self) -> bool {
        self.identities.lock().is_empty()
    }
}
