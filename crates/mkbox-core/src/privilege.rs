//! Process capability sets
//!
//! The sandbox only ever shrinks these: [`drop_all`] clears the effective,
//! permitted and inheritable sets.

use std::fmt;
use std::io;

use caps::{CapSet, CapsHashSet};
use log::debug;

use crate::error::{Result, Step, SyscallResultExt};

/// Snapshot of the calling process's capability bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet {
    pub effective: u64,
    pub permitted: u64,
    pub inheritable: u64,
}

impl CapabilitySet {
    /// Read the current sets with `capget(2)`
    pub fn current() -> Result<Self> {
        let read = |set: CapSet| {
            caps::read(None, set)
                .map(|held| bitmask(&held))
                .map_err(io::Error::other)
                .context(Step::Handoff, "capget", format!("{:?}", set))
        };
        Ok(Self {
            effective: read(CapSet::Effective)?,
            permitted: read(CapSet::Permitted)?,
            inheritable: read(CapSet::Inheritable)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.effective == 0 && self.permitted == 0 && self.inheritable == 0
    }
}

fn bitmask(held: &CapsHashSet) -> u64 {
    held.iter().fold(0, |mask, cap| mask | cap.bitmask())
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "eff={:#x} prm={:#x} inh={:#x}",
            self.effective, self.permitted, self.inheritable
        )
    }
}

/// Clear every capability bit of the calling process.
///
/// Effective goes first since it must stay a subset of permitted. Bounding
/// and ambient sets are left alone: with an empty permitted set, execve
/// cannot raise anything back.
pub fn drop_all() -> Result<()> {
    for set in [CapSet::Effective, CapSet::Permitted, CapSet::Inheritable] {
        caps::clear(None, set)
            .map_err(io::Error::other)
            .context(Step::Handoff, "capset", format!("{:?}, 0", set))?;
        debug!("cleared {:?} capabilities", set);
    }
    Ok(())
}
