// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::crypto::TransportKeyManager;
use crate::provisioning::ProvisioningQueue;
use crate::storage::CredentialStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub transport: Arc<TransportKeyManager>,
    pub provisioning: ProvisioningQueue,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        transport: TransportKeyManager,
        provisioning: ProvisioningQueue,
    ) -> Self {
        Self {
            store,
            transport: Arc::new(transport),
            provisioning,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use chrono::TimeDelta;

    use super::*;
    use crate::crypto::transport_key::shared_test_key;
    use crate::provisioning::{self, ProvisioningWorker};
    use crate::storage::InMemoryStore;

    /// In-memory state with the shared test transport key. The worker is
    /// returned unstarted so tests can drive or inspect it.
    pub fn state(provision_dir: &Path) -> (AppState, ProvisioningWorker) {
        let (queue, worker) = provisioning::channel(provision_dir, 8);
        let transport =
            TransportKeyManager::with_key_pair(shared_test_key(), TimeDelta::hours(1));
        let state = AppState::new(Arc::new(InMemoryStore::new()), transport, queue);
        (state, worker)
    }
}
