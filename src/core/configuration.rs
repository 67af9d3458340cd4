use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ENTRIES_PER_DOMAIN, NB_CONFIGS};
use crate::core::domain::CommitState;
use crate::error::{CommitUnit, DriverError};

/// Named configuration slots of a domain.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfigKey {
    Permissions = 0,
    Traps = 1,
    Cores = 2,
    SwitchType = 3,
}

impl ConfigKey {
    /// All keys, in the order they are committed.
    pub const ALL: [ConfigKey; NB_CONFIGS] = [
        ConfigKey::Permissions,
        ConfigKey::Traps,
        ConfigKey::Cores,
        ConfigKey::SwitchType,
    ];

    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(ConfigKey::Permissions),
            1 => Some(ConfigKey::Traps),
            2 => Some(ConfigKey::Cores),
            3 => Some(ConfigKey::SwitchType),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConfigSlot {
    Unset,
    Set(u64),
    Committed(u64),
    Dead,
}

impl ConfigSlot {
    pub fn value(&self) -> Option<u64> {
        match *self {
            ConfigSlot::Set(v) | ConfigSlot::Committed(v) => Some(v),
            ConfigSlot::Unset | ConfigSlot::Dead => None,
        }
    }
}

/// Register groups understood by the monitor.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegisterGroup {
    Gp = 0,
    Vmcs = 1,
}

impl RegisterGroup {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(RegisterGroup::Gp),
            1 => Some(RegisterGroup::Vmcs),
            _ => None,
        }
    }
}

/// Where a core starts executing when it enters the domain.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Entry {
    pub page_table_root: u64,
    pub ip: u64,
    pub sp: u64,
}

impl Entry {
    pub fn new(page_table_root: u64, ip: u64, sp: u64) -> Self {
        Entry {
            page_table_root,
            ip,
            sp,
        }
    }
}

/// Per-core state: entry point and requested register values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub entry: Option<Entry>,
    pub registers: BTreeMap<(RegisterGroup, usize), u64>,
    pub state: CommitState,
}

impl CoreConfig {
    pub fn new() -> Self {
        CoreConfig {
            entry: None,
            registers: BTreeMap::new(),
            state: CommitState::NotCommitted,
        }
    }

    fn check_mutable(&self) -> Result<(), DriverError> {
        if self.state != CommitState::NotCommitted {
            return Err(DriverError::InvalidState);
        }
        Ok(())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    slots: [ConfigSlot; NB_CONFIGS],
    cores: [CoreConfig; ENTRIES_PER_DOMAIN],
}

impl ConfigStore {
    pub fn new() -> Self {
        ConfigStore {
            slots: [ConfigSlot::Unset; NB_CONFIGS],
            cores: std::array::from_fn(|_| CoreConfig::new()),
        }
    }

    pub fn slot(&self, key: ConfigKey) -> ConfigSlot {
        self.slots[key.index()]
    }

    pub fn get(&self, key: ConfigKey) -> Option<u64> {
        self.slot(key).value()
    }

    pub fn set(&mut self, key: ConfigKey, value: u64) -> Result<(), DriverError> {
        match self.slots[key.index()] {
            ConfigSlot::Unset | ConfigSlot::Set(_) => {
                self.slots[key.index()] = ConfigSlot::Set(value);
                Ok(())
            }
            ConfigSlot::Committed(_) | ConfigSlot::Dead => Err(DriverError::InvalidState),
        }
    }

    pub fn mark_committed(&mut self, key: ConfigKey) {
        if let ConfigSlot::Set(v) = self.slots[key.index()] {
            self.slots[key.index()] = ConfigSlot::Committed(v);
        }
    }

    pub fn core(&self, core: usize) -> Result<&CoreConfig, DriverError> {
        self.cores.get(core).ok_or(DriverError::InvalidCore(core))
    }

    pub fn core_mut(&mut self, core: usize) -> Result<&mut CoreConfig, DriverError> {
        self.cores.get_mut(core).ok_or(DriverError::InvalidCore(core))
    }

    pub fn set_register(
        &mut self,
        core: usize,
        group: RegisterGroup,
        index: usize,
        value: u64,
    ) -> Result<(), DriverError> {
        let cfg = self.core_mut(core)?;
        cfg.check_mutable()?;
        cfg.registers.insert((group, index), value);
        Ok(())
    }

    pub fn set_entry(&mut self, core: usize, entry: Entry) -> Result<(), DriverError> {
        let cfg = self.core_mut(core)?;
        cfg.check_mutable()?;
        cfg.entry = Some(entry);
        Ok(())
    }

    /// Cores enabled by the `Cores` bitmap.
    pub fn enabled_cores(&self) -> Result<Vec<usize>, DriverError> {
        let bitmap = self
            .get(ConfigKey::Cores)
            .ok_or(DriverError::Unset(CommitUnit::Config(ConfigKey::Cores)))?;
        let mut cores = Vec::new();
        for bit in 0..u64::BITS as usize {
            if bitmap & (1u64 << bit) == 0 {
                continue;
            }
            if bit >= ENTRIES_PER_DOMAIN {
                return Err(DriverError::InvalidCore(bit));
            }
            cores.push(bit);
        }
        Ok(cores)
    }

    /// Kills every slot and core, nothing can be committed afterwards.
    pub fn release(&mut self) {
        self.slots = [ConfigSlot::Dead; NB_CONFIGS];
        for c in self.cores.iter_mut() {
            c.state = CommitState::Dead;
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}
