// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session manifest — one JSON record per process instance listing the
// sessions it holds. Persistence is best-effort: a write that hits the
// store's quota drops the record instead of failing the caller.

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::{InstanceId, SessionId, SessionMeta};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::kv::KeyValueStore;

const KEY_PREFIX: &str = "blattwerk.sessions.";

/// Store key of the manifest written by `instance`.
pub fn manifest_key(instance: InstanceId) -> String {
    format!("{KEY_PREFIX}{instance}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub instance_id: InstanceId,
    pub saved_at: DateTime<Utc>,
    pub active_session: Option<SessionId>,
    pub sessions: Vec<SessionMeta>,
}

impl SessionManifest {
    pub fn new(instance_id: InstanceId, sessions: Vec<SessionMeta>) -> Self {
        let active_session = sessions.iter().find(|s| s.active).map(|s| s.id);
        Self {
            instance_id,
            saved_at: Utc::now(),
            active_session,
            sessions,
        }
    }
}

/// Write `manifest` under its instance key.
///
/// Returns `Ok(false)` when the store's quota refused the write; in that case
/// any stale record under the key is removed so a later restore does not see
/// outdated sessions.
#[instrument(skip_all, fields(instance = %manifest.instance_id, sessions = manifest.sessions.len()))]
pub fn save_manifest(store: &dyn KeyValueStore, manifest: &SessionManifest) -> Result<bool> {
    let key = manifest_key(manifest.instance_id);
    let payload = serde_json::to_vec(manifest)?;

    match store.set(&key, &payload) {
        Ok(()) => {
            debug!(bytes = payload.len(), "Session manifest saved");
            Ok(true)
        }
        Err(BlattwerkError::StorageQuotaExceeded { size, quota, .. }) => {
            warn!(size, quota, "Session manifest exceeds storage quota; discarding record");
            store.remove(&key)?;
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Read the manifest written by `instance`, if one exists.
pub fn load_manifest(
    store: &dyn KeyValueStore,
    instance: InstanceId,
) -> Result<Option<SessionManifest>> {
    let Some(bytes) = store.get(&manifest_key(instance))? else {
        return Ok(None);
    };
    let manifest = serde_json::from_slice(&bytes)?;
    Ok(Some(manifest))
}
