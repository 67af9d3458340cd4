use std::collections::BTreeMap;

use spin::Mutex;

use crate::config::VALID_SWITCH_TYPES;
use crate::core::configuration::{ConfigKey, Entry, RegisterGroup};
use crate::core::domain::DomainId;

use super::{CallInterface, CapaHandle, MonitorCalls, MonitorError, RegionGrant};

/// Error codes of the local monitor.
pub mod codes {
    pub const UNKNOWN_DOMAIN: u64 = 1;
    pub const INVALID_VALUE: u64 = 2;
    pub const DOMAIN_SEALED: u64 = 3;
    pub const UNKNOWN_CAPA: u64 = 4;
    pub const NOT_SEALED: u64 = 5;
}

/// A call as observed by the local monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCall {
    CreateDomain,
    RealizeRegion {
        domain: DomainId,
        grant: RegionGrant,
    },
    SetConfig {
        domain: DomainId,
        key: ConfigKey,
        value: u64,
    },
    SetCoreRegister {
        domain: DomainId,
        core: usize,
        group: RegisterGroup,
        index: usize,
        value: u64,
    },
    SetEntry {
        domain: DomainId,
        core: usize,
        entry: Entry,
    },
    Seal {
        domain: DomainId,
    },
    RevokeRegion {
        domain: DomainId,
        capa: CapaHandle,
    },
    RevokeDomain {
        domain: DomainId,
    },
    Switch {
        domain: DomainId,
        args: u64,
    },
}

impl MonitorCall {
    pub fn verb(&self) -> CallInterface {
        match self {
            MonitorCall::CreateDomain => CallInterface::CREATE,
            MonitorCall::RealizeRegion { .. } => CallInterface::REALIZE,
            MonitorCall::SetConfig { .. } => CallInterface::SET_CONFIG,
            MonitorCall::SetCoreRegister { .. } => CallInterface::SET_REGISTER,
            MonitorCall::SetEntry { .. } => CallInterface::SET_ENTRY,
            MonitorCall::Seal { .. } => CallInterface::SEAL,
            MonitorCall::RevokeRegion { .. } => CallInterface::REVOKE,
            MonitorCall::RevokeDomain { .. } => CallInterface::REVOKE_DOMAIN,
            MonitorCall::Switch { .. } => CallInterface::SWITCH,
        }
    }
}

struct State {
    next_domain: DomainId,
    next_capa: CapaHandle,
    // Domain id -> sealed.
    domains: BTreeMap<DomainId, bool>,
    capas: BTreeMap<CapaHandle, DomainId>,
    calls: Vec<MonitorCall>,
    faults: Vec<(CallInterface, MonitorError)>,
}

impl State {
    /// Records the call and fires a pending fault for its verb, if any.
    fn enter(&mut self, call: MonitorCall) -> Result<(), MonitorError> {
        let verb = call.verb();
        self.calls.push(call);
        if let Some(pos) = self.faults.iter().position(|(v, _)| *v == verb) {
            let (_, error) = self.faults.remove(pos);
            return Err(error);
        }
        Ok(())
    }

    fn unsealed(&self, domain: DomainId) -> Result<(), MonitorError> {
        match self.domains.get(&domain) {
            None => Err(MonitorError(codes::UNKNOWN_DOMAIN)),
            Some(true) => Err(MonitorError(codes::DOMAIN_SEALED)),
            Some(false) => Ok(()),
        }
    }
}

/// In-process monitor.
///
/// Executes the calls against a small local model and records every
/// attempt, failed ones included. Faults can be injected per verb.
pub struct LocalMonitor {
    state: Mutex<State>,
}

impl LocalMonitor {
    pub fn new() -> Self {
        LocalMonitor {
            state: Mutex::new(State {
                next_domain: 1,
                next_capa: 1,
                domains: BTreeMap::new(),
                capas: BTreeMap::new(),
                calls: Vec::new(),
                faults: Vec::new(),
            }),
        }
    }

    /// The next call to `verb` fails with `error`.
    pub fn inject(&self, verb: CallInterface, error: MonitorError) {
        self.state.lock().faults.push((verb, error));
    }

    pub fn calls(&self) -> Vec<MonitorCall> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, verb: CallInterface) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.verb() == verb)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of capabilities currently realized.
    pub fn live_capabilities(&self) -> usize {
        self.state.lock().capas.len()
    }

    pub fn is_sealed(&self, domain: DomainId) -> bool {
        self.state.lock().domains.get(&domain) == Some(&true)
    }
}

impl Default for LocalMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorCalls for LocalMonitor {
    fn create_domain(&self) -> Result<DomainId, MonitorError> {
        let mut state = self.state.lock();
        state.enter(MonitorCall::CreateDomain)?;
        let id = state.next_domain;
        state.next_domain += 1;
        state.domains.insert(id, false);
        Ok(id)
    }

    fn realize_region(
        &self,
        domain: DomainId,
        grant: &RegionGrant,
    ) -> Result<CapaHandle, MonitorError> {
        let mut state = self.state.lock();
        state.enter(MonitorCall::RealizeRegion {
            domain,
            grant: *grant,
        })?;
        state.unsealed(domain)?;
        let capa = state.next_capa;
        state.next_capa += 1;
        state.capas.insert(capa, domain);
        Ok(capa)
    }

    fn set_config(&self, domain: DomainId, key: ConfigKey, value: u64) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        state.enter(MonitorCall::SetConfig { domain, key, value })?;
        state.unsealed(domain)?;
        if key == ConfigKey::SwitchType && !VALID_SWITCH_TYPES.contains(&value) {
            return Err(MonitorError(codes::INVALID_VALUE));
        }
        Ok(())
    }

    fn set_core_register(
        &self,
        domain: DomainId,
        core: usize,
        group: RegisterGroup,
        index: usize,
        value: u64,
    ) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        state.enter(MonitorCall::SetCoreRegister {
            domain,
            core,
            group,
            index,
            value,
        })?;
        state.unsealed(domain)
    }

    fn set_entry(&self, domain: DomainId, core: usize, entry: &Entry) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        state.enter(MonitorCall::SetEntry {
            domain,
            core,
            entry: *entry,
        })?;
        state.unsealed(domain)
    }

    fn seal(&self, domain: DomainId) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        state.enter(MonitorCall::Seal { domain })?;
        state.unsealed(domain)?;
        state.domains.insert(domain, true);
        Ok(())
    }

    fn revoke_region(&self, domain: DomainId, capa: CapaHandle) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        state.enter(MonitorCall::RevokeRegion { domain, capa })?;
        match state.capas.get(&capa) {
            Some(owner) if *owner == domain => {
                state.capas.remove(&capa);
                Ok(())
            }
            _ => Err(MonitorError(codes::UNKNOWN_CAPA)),
        }
    }

    fn revoke_domain(&self, domain: DomainId) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        state.enter(MonitorCall::RevokeDomain { domain })?;
        if state.domains.remove(&domain).is_none() {
            return Err(MonitorError(codes::UNKNOWN_DOMAIN));
        }
        state.capas.retain(|_, owner| *owner != domain);
        Ok(())
    }

    fn switch(&self, domain: DomainId, args: u64) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        state.enter(MonitorCall::Switch { domain, args })?;
        match state.domains.get(&domain) {
            None => Err(MonitorError(codes::UNKNOWN_DOMAIN)),
            Some(false) => Err(MonitorError(codes::NOT_SEALED)),
            Some(true) => Ok(()),
        }
    }
}
