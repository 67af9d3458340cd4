use std::fmt;

use thiserror::Error;

use crate::core::configuration::ConfigKey;
use crate::core::domain::DomainHandle;
use crate::monitor::MonitorError;

/// The unit of a domain a commit, revoke or switch step works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitUnit {
    Create,
    Config(ConfigKey),
    Core(usize),
    Segment { va: u64 },
    Seal,
    Switch,
    Domain,
}

impl fmt::Display for CommitUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitUnit::Create => write!(f, "domain creation"),
            CommitUnit::Config(key) => write!(f, "configuration {:?}", key),
            CommitUnit::Core(core) => write!(f, "entry on core {}", core),
            CommitUnit::Segment { va } => write!(f, "segment at {:#x}", va),
            CommitUnit::Seal => write!(f, "seal"),
            CommitUnit::Switch => write!(f, "switch"),
            CommitUnit::Domain => write!(f, "domain"),
        }
    }
}

/// Driver errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("handle {0:#x} is already registered")]
    DuplicateHandle(DomainHandle),
    #[error("not found")]
    NotFound,
    #[error("range overlaps an existing segment")]
    Overlap,
    #[error("empty range or range reaching the end of the address space")]
    InvalidRange,
    #[error("operation not allowed in the current state")]
    InvalidState,
    #[error("invalid core {0}")]
    InvalidCore(usize),
    #[error("{0} was never set")]
    Unset(CommitUnit),
    #[error("monitor rejected {unit}: {code}")]
    Rejected { unit: CommitUnit, code: MonitorError },
    #[error("domain is busy")]
    Busy,
    #[error("failed to revoke {} unit(s)", .0.len())]
    RevokeFailed(Vec<CommitUnit>),
}
