//! Boundary with the security monitor.
//!
//! The driver only ever talks to the monitor through [`MonitorCalls`], a
//! handful of synchronous verbs. How they are encoded (vmcall, ecall, ...)
//! is up to the implementation.

use thiserror::Error;

use crate::core::configuration::{ConfigKey, Entry, RegisterGroup};
use crate::core::domain::DomainId;
use crate::core::segment::{Rights, SegmentType};

pub mod local;

/// Handle of a capability held on the monitor side.
pub type CapaHandle = u64;

/// Raw failure code reported by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("monitor error {0:#x}")]
pub struct MonitorError(pub u64);

/// The verbs of the monitor interface.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CallInterface {
    CREATE,
    REALIZE,
    SET_CONFIG,
    SET_REGISTER,
    SET_ENTRY,
    SEAL,
    REVOKE,
    REVOKE_DOMAIN,
    SWITCH,
}

/// A memory capability request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionGrant {
    pub va: u64,
    pub pa: u64,
    pub size: u64,
    pub rights: Rights,
    pub tpe: SegmentType,
    pub alias: u64,
}

pub trait MonitorCalls {
    fn create_domain(&self) -> Result<DomainId, MonitorError>;

    fn realize_region(&self, domain: DomainId, grant: &RegionGrant)
        -> Result<CapaHandle, MonitorError>;

    fn set_config(&self, domain: DomainId, key: ConfigKey, value: u64) -> Result<(), MonitorError>;

    fn set_core_register(
        &self,
        domain: DomainId,
        core: usize,
        group: RegisterGroup,
        index: usize,
        value: u64,
    ) -> Result<(), MonitorError>;

    fn set_entry(&self, domain: DomainId, core: usize, entry: &Entry) -> Result<(), MonitorError>;

    fn seal(&self, domain: DomainId) -> Result<(), MonitorError>;

    fn revoke_region(&self, domain: DomainId, capa: CapaHandle) -> Result<(), MonitorError>;

    fn revoke_domain(&self, domain: DomainId) -> Result<(), MonitorError>;

    fn switch(&self, domain: DomainId, args: u64) -> Result<(), MonitorError>;
}
