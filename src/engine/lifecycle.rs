use crate::core::domain::{CommitState, Domain};
use crate::core::segment::SegmentState;
use crate::engine::commit::rejected;
use crate::error::{CommitUnit, DriverError};
use crate::monitor::MonitorCalls;

/// Transfers execution to a committed domain.
pub fn switch_into<M: MonitorCalls>(
    domain: &Domain,
    monitor: &M,
    args: u64,
) -> Result<(), DriverError> {
    if domain.state != CommitState::Committed {
        return Err(DriverError::InvalidState);
    }
    monitor
        .switch(domain.domain_id, args)
        .map_err(|e| rejected(CommitUnit::Switch, e))
}

/// Revokes everything the monitor holds for the domain and marks it dead.
///
/// Revocation is best effort: the domain always ends up dead and the units
/// that could not be revoked are returned.
pub fn delete_domain<M: MonitorCalls>(domain: &mut Domain, monitor: &M) -> Vec<CommitUnit> {
    let mut failed = Vec::new();
    if domain.is_dead() {
        return failed;
    }
    let id = domain.domain_id;
    for segment in domain.memory.segments_mut() {
        if let SegmentState::Committed(capa) = segment.state {
            if let Err(e) = monitor.revoke_region(id, capa) {
                log::error!(
                    "domain {:#x}: failed to revoke segment {:#x} (capa {}): {}",
                    domain.handle,
                    segment.span.va,
                    capa,
                    e
                );
                failed.push(CommitUnit::Segment {
                    va: segment.span.va,
                });
            }
        }
        segment.state = SegmentState::Dead;
    }
    if domain.has_monitor_id() {
        if let Err(e) = monitor.revoke_domain(id) {
            log::error!(
                "domain {:#x}: failed to revoke monitor domain {}: {}",
                domain.handle,
                id,
                e
            );
            failed.push(CommitUnit::Domain);
        }
    }
    domain.memory.release();
    domain.config.release();
    domain.state = CommitState::Dead;
    log::info!("domain {:#x} is dead", domain.handle);
    failed
}
