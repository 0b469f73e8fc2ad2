// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — resolves the data directory, loads configuration,
// opens the session store and hands out engine objects wired to them.
//
// The SQLite store lives at `<data dir>/blattwerk.db`. When it cannot be
// opened the commands still run against an in-memory store; only the
// session manifest is lost at exit.

use std::path::{Path, PathBuf};

use blattwerk_core::error::Result;
use blattwerk_core::{EngineConfig, InstanceId};
use blattwerk_engine::{JobRunner, Workspace};
use blattwerk_store::{KeyValueStore, MemoryStore, SqliteStore};
use tracing::{debug, info, warn};

use super::data_dir;

const CONFIG_FILE: &str = "config.json";
const INSTANCE_FILE: &str = "instance.json";
const STORE_FILE: &str = "blattwerk.db";

pub struct AppServices {
    store: Box<dyn KeyValueStore>,
    config: EngineConfig,
    instance_id: InstanceId,
    data_dir: Option<PathBuf>,
}

impl AppServices {
    /// Initialise services under the platform data directory.
    pub fn init(config_path: Option<&Path>) -> Result<Self> {
        let dir = data_dir::data_dir()?;
        Self::at(dir, config_path)
    }

    /// Initialise services rooted at `dir`.
    pub fn at(dir: PathBuf, config_path: Option<&Path>) -> Result<Self> {
        info!(path = %dir.display(), "Initialising app services");
        let config = load_config(&dir, config_path)?;
        let instance_id = load_or_create_instance(&dir)?;
        let store = SqliteStore::open(dir.join(STORE_FILE), config.storage_quota_bytes)?;
        Ok(Self {
            store: Box::new(store),
            config,
            instance_id,
            data_dir: Some(dir),
        })
    }

    /// Services backed by memory only. Configuration still honours an
    /// explicit `config_path`.
    pub fn fallback(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => read_config(path)?,
            None => EngineConfig::default(),
        };
        warn!("Using in-memory session store; sessions will not survive this run");
        Ok(Self {
            store: Box::new(MemoryStore::with_quota(config.storage_quota_bytes)),
            config,
            instance_id: InstanceId::new(),
            data_dir: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// A workspace for this instance with previously persisted sessions
    /// restored.
    pub fn workspace(&self) -> Result<Workspace> {
        let mut workspace = Workspace::with_instance(self.instance_id, self.config.clone());
        match workspace.restore(self.store()) {
            Ok(true) => {}
            Ok(false) => debug!("No saved sessions for this instance"),
            Err(err) => {
                warn!(%err, "Saved sessions could not be restored; starting fresh");
                return Ok(Workspace::with_instance(self.instance_id, self.config.clone()));
            }
        }
        Ok(workspace)
    }

    pub fn runner(&self) -> JobRunner {
        JobRunner::new(self.config.clone())
    }

    /// Save the workspace's session manifest.
    pub fn persist(&self, workspace: &Workspace) -> Result<()> {
        if !workspace.persist(self.store())? {
            warn!("Session manifest exceeded the storage quota and was not saved");
        }
        Ok(())
    }
}

fn load_config(dir: &Path, explicit: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        read_config(&path)
    } else {
        Ok(EngineConfig::default())
    }
}

fn read_config(path: &Path) -> Result<EngineConfig> {
    let data = std::fs::read_to_string(path)?;
    let config = serde_json::from_str(&data)?;
    debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

fn load_or_create_instance(dir: &Path) -> Result<InstanceId> {
    let path = dir.join(INSTANCE_FILE);
    if path.exists() {
        let data = std::fs::read_to_string(&path)?;
        return Ok(serde_json::from_str(&data)?);
    }
    let id = InstanceId::new();
    std::fs::write(&path, serde_json::to_string(&id)?)?;
    info!(instance_id = %id, "New instance identity created");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let services = AppServices::at(dir.path().to_path_buf(), None).expect("init");
        assert_eq!(services.config(), &EngineConfig::default());
    }

    #[test]
    fn reads_config_from_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = EngineConfig {
            export_dpi: 300.0,
            ..EngineConfig::default()
        };
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            serde_json::to_string(&config).expect("json"),
        )
        .expect("write config");

        let services = AppServices::at(dir.path().to_path_buf(), None).expect("init");
        assert_eq!(services.config().export_dpi, 300.0);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").expect("write");
        assert!(AppServices::at(dir.path().to_path_buf(), Some(&path)).is_err());
    }

    #[test]
    fn sessions_survive_between_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = AppServices::at(dir.path().to_path_buf(), None).expect("init");
        let mut workspace = first.workspace().expect("workspace");
        let id = workspace.sessions_mut().create_session();
        workspace.sessions_mut().rename(id, "Invoices").expect("rename");
        first.persist(&workspace).expect("persist");
        drop(first);

        let second = AppServices::at(dir.path().to_path_buf(), None).expect("reopen");
        let restored = second.workspace().expect("workspace");
        let names: Vec<String> = restored.sessions().sessions().into_iter().map(|m| m.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Invoices".to_string()));
        assert_eq!(restored.sessions().active_id(), id);
    }

    #[test]
    fn corrupt_manifest_starts_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let services = AppServices::at(dir.path().to_path_buf(), None).expect("init");
        services
            .store()
            .set(&blattwerk_store::manifest_key(services.instance_id()), b"{not json")
            .expect("set");

        let workspace = services.workspace().expect("workspace");
        assert_eq!(workspace.sessions().len(), 1);
        assert_eq!(workspace.instance_id(), services.instance_id());
    }
}
