//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the agent configuration lives as one
//! `postcard` blob under `fieldlink/agentcfg`.
//!
//! - Validation: every save is range-checked first; invalid values are
//!   rejected, never clamped.
//! - The ESP-IDF backend shares the default NVS partition with the WiFi
//!   driver. The simulation backend is an in-memory map.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{AgentConfig, validate_config};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "fieldlink";
const CONFIG_KEY: &str = "agentcfg";

/// Blobs larger than this are treated as corrupt.
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    nvs: EspNvs<NvsDefault>,
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsAdapter {
    /// Open the config namespace on the default partition.
    #[cfg(target_os = "espidf")]
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            warn!("NVS: open '{}' failed: {:?}", CONFIG_NAMESPACE, e);
            ConfigError::IoError
        })?;
        info!("NvsAdapter: ESP-IDF NVS namespace '{}' open", CONFIG_NAMESPACE);
        Ok(Self { nvs })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, ConfigError> {
        info!("NvsAdapter: simulation backend");
        Ok(Self {
            store: HashMap::new(),
        })
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Vec<u8>, ConfigError> {
        let mut buf = vec![0u8; MAX_BLOB_SIZE];
        match self.nvs.get_blob(CONFIG_KEY, &mut buf) {
            Ok(Some(bytes)) => Ok(bytes.to_vec()),
            Ok(None) => Err(ConfigError::NotFound),
            Err(e) => {
                warn!("NVS: read '{}' failed: {:?}", CONFIG_KEY, e);
                Err(ConfigError::Corrupted)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Vec<u8>, ConfigError> {
        let key = composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
        match self.store.get(&key) {
            Some(bytes) if bytes.len() > MAX_BLOB_SIZE => Err(ConfigError::Corrupted),
            Some(bytes) => Ok(bytes.clone()),
            None => Err(ConfigError::NotFound),
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.nvs.set_blob(CONFIG_KEY, bytes).map_err(|e| {
            warn!("NVS: write '{}' failed: {:?}", CONFIG_KEY, e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.store
            .insert(composite_key(CONFIG_NAMESPACE, CONFIG_KEY), bytes.to_vec());
        Ok(())
    }

    /// Simulation: overwrite the stored blob with arbitrary bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject_raw(&mut self, bytes: &[u8]) {
        self.store
            .insert(composite_key(CONFIG_NAMESPACE, CONFIG_KEY), bytes.to_vec());
    }
}

#[cfg(not(target_os = "espidf"))]
fn composite_key(namespace: &str, key: &str) -> String {
    format!("{}::{}", namespace, key)
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<AgentConfig, ConfigError> {
        let bytes = self.read_blob()?;
        let cfg: AgentConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&mut self, config: &AgentConfig) -> Result<(), ConfigError> {
        validate_config(config).map_err(ConfigError::ValidationFailed)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::ValidationFailed("config blob too large"));
        }
        self.write_blob(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
