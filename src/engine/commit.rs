//! Moves a domain's segments, configuration and entries to the monitor.
//!
//! Every unit carries its own state, so each step skips what is already
//! committed and a failed commit can simply be retried. Nothing is rolled
//! back: a capability the monitor granted stays granted until the domain is
//! deleted.

use crate::core::configuration::{ConfigKey, ConfigSlot};
use crate::core::domain::{CommitState, Domain, DomainId};
use crate::core::segment::SegmentState;
use crate::error::{CommitUnit, DriverError};
use crate::monitor::{MonitorCalls, MonitorError};

pub(crate) fn rejected(unit: CommitUnit, code: MonitorError) -> DriverError {
    log::warn!("monitor rejected {}: {}", unit, code);
    DriverError::Rejected { unit, code }
}

fn check_alive(domain: &Domain) -> Result<(), DriverError> {
    if domain.is_dead() {
        return Err(DriverError::InvalidState);
    }
    Ok(())
}

/// Returns the monitor id of the domain, creating it on first use.
fn ensure_created<M: MonitorCalls>(
    domain: &mut Domain,
    monitor: &M,
) -> Result<DomainId, DriverError> {
    if domain.has_monitor_id() {
        return Ok(domain.domain_id);
    }
    let id = monitor
        .create_domain()
        .map_err(|e| rejected(CommitUnit::Create, e))?;
    domain.domain_id = id;
    log::info!("domain {:#x} is monitor domain {}", domain.handle, id);
    Ok(id)
}

pub fn commit_segments<M: MonitorCalls>(
    domain: &mut Domain,
    monitor: &M,
) -> Result<(), DriverError> {
    check_alive(domain)?;
    let pending = domain
        .memory
        .segments()
        .iter()
        .any(|s| s.state == SegmentState::NotCommitted);
    if !pending {
        return Ok(());
    }
    let id = ensure_created(domain, monitor)?;
    for segment in domain.memory.segments_mut() {
        if segment.state != SegmentState::NotCommitted {
            continue;
        }
        let capa = monitor
            .realize_region(id, &segment.grant())
            .map_err(|e| rejected(CommitUnit::Segment { va: segment.span.va }, e))?;
        segment.state = SegmentState::Committed(capa);
    }
    Ok(())
}

pub fn commit_configuration<M: MonitorCalls>(
    domain: &mut Domain,
    monitor: &M,
    key: ConfigKey,
) -> Result<(), DriverError> {
    check_alive(domain)?;
    let value = match domain.config.slot(key) {
        ConfigSlot::Committed(_) => return Ok(()),
        ConfigSlot::Set(v) => v,
        ConfigSlot::Unset => return Err(DriverError::Unset(CommitUnit::Config(key))),
        ConfigSlot::Dead => return Err(DriverError::InvalidState),
    };
    let id = ensure_created(domain, monitor)?;
    monitor
        .set_config(id, key, value)
        .map_err(|e| rejected(CommitUnit::Config(key), e))?;
    domain.config.mark_committed(key);
    Ok(())
}

/// Pushes the register values of a core, then its entry point.
pub fn commit_entry<M: MonitorCalls>(
    domain: &mut Domain,
    monitor: &M,
    core: usize,
) -> Result<(), DriverError> {
    check_alive(domain)?;
    let cfg = domain.config.core(core)?;
    match cfg.state {
        CommitState::Committed => return Ok(()),
        CommitState::Dead => return Err(DriverError::InvalidState),
        CommitState::NotCommitted => {}
    }
    let entry = cfg
        .entry
        .ok_or(DriverError::Unset(CommitUnit::Core(core)))?;
    let registers: Vec<_> = cfg
        .registers
        .iter()
        .map(|(&(group, index), &value)| (group, index, value))
        .collect();

    let id = ensure_created(domain, monitor)?;
    for (group, index, value) in registers {
        monitor
            .set_core_register(id, core, group, index, value)
            .map_err(|e| rejected(CommitUnit::Core(core), e))?;
    }
    monitor
        .set_entry(id, core, &entry)
        .map_err(|e| rejected(CommitUnit::Core(core), e))?;
    domain.config.core_mut(core)?.state = CommitState::Committed;
    Ok(())
}

/// Everything that can be checked locally before talking to the monitor.
/// Returns the cores enabled for the domain.
fn validate(domain: &Domain, full: bool) -> Result<Vec<usize>, DriverError> {
    for key in ConfigKey::ALL {
        match (full, domain.config.slot(key)) {
            (_, ConfigSlot::Committed(_)) => {}
            (true, ConfigSlot::Set(_)) => {}
            (true, ConfigSlot::Unset) => {
                return Err(DriverError::Unset(CommitUnit::Config(key)))
            }
            _ => return Err(DriverError::InvalidState),
        }
    }
    let cores = domain.config.enabled_cores()?;
    for &core in &cores {
        let cfg = domain.config.core(core)?;
        match (full, cfg.state) {
            (_, CommitState::Committed) => {}
            (true, CommitState::NotCommitted) => {
                if cfg.entry.is_none() {
                    return Err(DriverError::Unset(CommitUnit::Core(core)));
                }
            }
            _ => return Err(DriverError::InvalidState),
        }
    }
    Ok(cores)
}

/// Commits the whole domain and seals it.
///
/// With `full` the configuration and the entries of every enabled core are
/// committed first; otherwise they must have been committed already and
/// only the segments are pushed.
pub fn commit_domain<M: MonitorCalls>(
    domain: &mut Domain,
    monitor: &M,
    full: bool,
) -> Result<(), DriverError> {
    match domain.state {
        CommitState::Committed => return Ok(()),
        CommitState::Dead => return Err(DriverError::InvalidState),
        CommitState::NotCommitted => {}
    }
    let cores = validate(domain, full)?;
    log::trace!("committing domain {:#x} (full: {})", domain.handle, full);

    if full {
        for key in ConfigKey::ALL {
            commit_configuration(domain, monitor, key)?;
        }
        for core in cores {
            commit_entry(domain, monitor, core)?;
        }
    }
    commit_segments(domain, monitor)?;

    let id = ensure_created(domain, monitor)?;
    monitor
        .seal(id)
        .map_err(|e| rejected(CommitUnit::Seal, e))?;
    domain.state = CommitState::Committed;
    log::info!("domain {:#x} committed", domain.handle);
    Ok(())
}
