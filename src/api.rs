//! Caller-facing operations, as decoded from the driver's user interface.

use serde::{Deserialize, Serialize};

use crate::core::configuration::{ConfigKey, Entry, RegisterGroup};
use crate::core::domain::DomainSummary;
use crate::core::segment::{Rights, SegmentType};
use crate::serializer_helper::serialize_rights;

/// Memory handed over by the mapping adapter for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRequest {
    pub va: u64,
    pub pa: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Create,
    Donate(MappingRequest),
    PhysOffset {
        va: u64,
    },
    AssignRights {
        va: u64,
        size: u64,
        #[serde(with = "serialize_rights")]
        rights: Rights,
        tpe: SegmentType,
        alias: u64,
    },
    SetConfig {
        key: ConfigKey,
        value: u64,
    },
    SetCoreRegister {
        core: usize,
        group: RegisterGroup,
        index: usize,
        value: u64,
    },
    SetEntry {
        core: usize,
        page_table_root: u64,
        ip: u64,
        sp: u64,
    },
    GetConfig {
        key: ConfigKey,
    },
    GetEntry {
        core: usize,
    },
    CommitConfig {
        key: ConfigKey,
    },
    CommitEntry {
        core: usize,
    },
    CommitSegments,
    Commit {
        full: bool,
    },
    Switch {
        args: u64,
    },
    Describe,
    Summary,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Empty,
    Value(u64),
    Entry(Entry),
    Text(String),
    Summary(DomainSummary),
}
