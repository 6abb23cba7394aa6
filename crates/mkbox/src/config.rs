//! Construction settings that are not part of the action list

use std::time::Duration;

use mkbox_core::{Result, util::parse_size};
use mkbox_fs::TmpfsConfig;

/// How long a `Delay` action blocks
pub const DEFAULT_DELAY: Duration = Duration::from_secs(100);

/// Sandbox assembly configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyConfig {
    /// Capacity of every `EphemeralMount`
    pub tmpfs: TmpfsConfig,
    /// Duration of every `Delay`
    pub delay: Duration,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            tmpfs: TmpfsConfig::default(),
            delay: DEFAULT_DELAY,
        }
    }
}

impl AssemblyConfig {
    /// Set tmpfs capacity from string (e.g., "1M")
    pub fn tmpfs_size_str(mut self, s: &str) -> Result<Self> {
        self.tmpfs.size = parse_size(s)?;
        Ok(self)
    }

    pub fn tmpfs_inodes(mut self, inodes: u64) -> Self {
        self.tmpfs.nr_inodes = inodes;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.tmpfs.validate()
    }
}
