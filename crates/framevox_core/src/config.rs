//! # Configuration
//!
//! Runtime knobs for the pool, the buffer pools and the slot table.
//! Loaded once at startup from TOML; every section is optional.
//!
//! ```toml
//! [pool]
//! threads = 8
//!
//! [buffers]
//! vertex_capacity = 8192
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Worker pool settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Completions between two purges of finished task records.
    pub purge_interval: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            purge_interval: 100,
        }
    }
}

/// Capacities reserved in newly created mesh buffers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Vertices reserved per vertex buffer.
    pub vertex_capacity: usize,
    /// Indices reserved per index buffer.
    pub index_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: 4444,
            index_capacity: 6666,
        }
    }
}

/// Slot table settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    /// Rows created up front. Row 0 is reserved.
    pub initial_slots: usize,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            initial_slots: 6222,
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramevoxConfig {
    /// Worker pool.
    pub pool: PoolConfig,
    /// Mesh buffer pools.
    pub buffers: BufferConfig,
    /// Slot tables.
    pub slots: SlotConfig,
}

impl FramevoxConfig {
    /// Config for a dedicated machine: one worker per available core.
    #[must_use]
    pub fn production() -> Self {
        let threads = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        Self {
            pool: PoolConfig {
                threads,
                // Fewer purges, larger map; cheaper at high task rates
                purge_interval: 1000,
            },
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise see
    /// [`FramevoxConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pool.threads == 0 {
            return Err(ConfigError::Invalid(
                "pool.threads must be at least 1".to_string(),
            ));
        }
        if self.pool.purge_interval == 0 {
            return Err(ConfigError::Invalid(
                "pool.purge_interval must be at least 1".to_string(),
            ));
        }
        if u32::try_from(self.slots.initial_slots).is_err() {
            return Err(ConfigError::Invalid(format!(
                "slots.initial_slots must fit in 32 bits, got {}",
                self.slots.initial_slots
            )));
        }
        Ok(())
    }
}
