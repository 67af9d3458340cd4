//! Control plane of a driver managing isolated domains on top of a
//! capability-based security monitor.
//!
//! A domain is created empty, receives memory (raw segments), gets access
//! rights assigned over parts of it (segments), is configured per domain and
//! per core, and is finally committed to the monitor as a set of
//! capabilities. Once committed it can be switched into, and deleting it
//! revokes everything the monitor holds for it.

pub mod api;
pub mod config;
pub mod core;
pub mod driver;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod serializer_helper;

pub use crate::core::configuration::{ConfigKey, Entry, RegisterGroup};
pub use crate::core::domain::{CommitState, Domain, DomainHandle, DomainId, Pid};
pub use crate::core::segment::{Rights, SegmentState, SegmentType};
pub use driver::Driver;
pub use error::{CommitUnit, DriverError};
