//! Static limits of the driver.

/// Maximum number of cores a domain can have an entry point on.
pub const ENTRIES_PER_DOMAIN: usize = 16;

/// Number of named configuration slots per domain.
pub const NB_CONFIGS: usize = 4;

/// Monitor id of a domain that has not been created on the monitor yet.
pub const UNINIT_DOM_ID: u64 = !0;

/// Switch types accepted by the local monitor.
pub const VALID_SWITCH_TYPES: [u64; 2] = [0, 1];
