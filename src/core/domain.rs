use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::config::UNINIT_DOM_ID;
use crate::core::configuration::{ConfigKey, ConfigStore, Entry, RegisterGroup};
use crate::core::segment::{Rights, SegmentStore, SegmentType};
use crate::error::{CommitUnit, DriverError};

/// Handle the caller knows the domain by.
pub type DomainHandle = u64;

/// Identifier of the domain on the monitor.
pub type DomainId = u64;

/// Process identifier of the creator.
pub type Pid = u32;

/// Whether a unit has been handed over to the monitor.
/// States only move forward.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum CommitState {
    NotCommitted,
    Committed,
    Dead,
}

/// Driver-side record of a domain.
///
/// Fields are only mutated through the checked operations below and the
/// commit engine, so states never move backwards.
pub struct Domain {
    pub(crate) pid: Pid,
    pub(crate) handle: DomainHandle,
    pub(crate) domain_id: DomainId,
    pub(crate) state: CommitState,
    pub(crate) config: ConfigStore,
    pub(crate) memory: SegmentStore,
}

impl Domain {
    pub fn new(handle: DomainHandle, pid: Pid) -> Self {
        Domain {
            pid,
            handle,
            domain_id: UNINIT_DOM_ID,
            state: CommitState::NotCommitted,
            config: ConfigStore::new(),
            memory: SegmentStore::new(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn handle(&self) -> DomainHandle {
        self.handle
    }

    /// Monitor id, `UNINIT_DOM_ID` until the monitor created the domain.
    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn memory(&self) -> &SegmentStore {
        &self.memory
    }

    pub fn is_committed(&self) -> bool {
        self.state == CommitState::Committed
    }

    pub fn is_dead(&self) -> bool {
        self.state == CommitState::Dead
    }

    /// Has the monitor been asked to create this domain yet.
    pub fn has_monitor_id(&self) -> bool {
        self.domain_id != UNINIT_DOM_ID
    }

    fn check_not_committed(&self) -> Result<(), DriverError> {
        if self.state != CommitState::NotCommitted {
            return Err(DriverError::InvalidState);
        }
        Ok(())
    }

    pub fn reserve_raw_segment(&mut self, va: u64, pa: u64, size: u64) -> Result<(), DriverError> {
        self.check_not_committed()?;
        self.memory.reserve(va, pa, size)?;
        log::trace!(
            "domain {:#x}: reserved raw segment {:#x}+{:#x}",
            self.handle,
            va,
            size
        );
        Ok(())
    }

    pub fn assign_rights(
        &mut self,
        va: u64,
        size: u64,
        rights: Rights,
        tpe: SegmentType,
        alias: u64,
    ) -> Result<(), DriverError> {
        self.check_not_committed()?;
        self.memory.assign(va, size, rights, tpe, alias)?;
        log::trace!(
            "domain {:#x}: assigned {} to {:#x}+{:#x} as {:?}",
            self.handle,
            rights,
            va,
            size,
            tpe
        );
        Ok(())
    }

    pub fn phys_offset(&self, va: u64) -> Result<u64, DriverError> {
        self.memory.phys_offset(va)
    }

    pub fn set_config(&mut self, key: ConfigKey, value: u64) -> Result<(), DriverError> {
        self.check_not_committed()?;
        self.config.set(key, value)
    }

    pub fn set_core_register(
        &mut self,
        core: usize,
        group: RegisterGroup,
        index: usize,
        value: u64,
    ) -> Result<(), DriverError> {
        if self.is_dead() {
            return Err(DriverError::InvalidState);
        }
        self.config.set_register(core, group, index, value)
    }

    pub fn set_entry(&mut self, core: usize, entry: Entry) -> Result<(), DriverError> {
        if self.is_dead() {
            return Err(DriverError::InvalidState);
        }
        self.config.set_entry(core, entry)
    }

    pub fn config_value(&self, key: ConfigKey) -> Result<u64, DriverError> {
        self.config
            .get(key)
            .ok_or(DriverError::Unset(CommitUnit::Config(key)))
    }

    pub fn entry(&self, core: usize) -> Result<Entry, DriverError> {
        self.config
            .core(core)?
            .entry
            .ok_or(DriverError::Unset(CommitUnit::Core(core)))
    }

    pub fn summary(&self) -> DomainSummary {
        let segments = self.memory.segments();
        DomainSummary {
            handle: self.handle,
            domain_id: self.has_monitor_id().then_some(self.domain_id),
            state: self.state,
            permissions: self.config.get(ConfigKey::Permissions),
            traps: self.config.get(ConfigKey::Traps),
            cores: self.config.get(ConfigKey::Cores),
            switch_type: self.config.get(ConfigKey::SwitchType),
            raw_segments: self.memory.raw().len(),
            segments: segments.len(),
            committed_segments: segments.iter().filter(|s| s.is_committed()).count(),
        }
    }
}

/// Snapshot of a domain handed back to callers.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSummary {
    pub handle: DomainHandle,
    pub domain_id: Option<DomainId>,
    pub state: CommitState,
    pub permissions: Option<u64>,
    pub traps: Option<u64>,
    pub cores: Option<u64>,
    pub switch_type: Option<u64>,
    pub raw_segments: usize,
    pub segments: usize,
    pub committed_segments: usize,
}
