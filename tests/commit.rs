use capa_driver::config::UNINIT_DOM_ID;
use capa_driver::core::configuration::ConfigSlot;
use capa_driver::engine::commit::{
    commit_configuration, commit_domain, commit_entry, commit_segments,
};
use capa_driver::monitor::local::{codes, LocalMonitor, MonitorCall};
use capa_driver::monitor::{CallInterface, MonitorError, RegionGrant};
use capa_driver::{
    CommitState, CommitUnit, ConfigKey, Domain, DriverError, Entry, RegisterGroup, Rights,
    SegmentState, SegmentType,
};

fn rw() -> Rights {
    Rights::READ | Rights::WRITE
}

fn configure(dom: &mut Domain) {
    dom.set_config(ConfigKey::Permissions, 0x1).unwrap();
    dom.set_config(ConfigKey::Traps, 0x0).unwrap();
    dom.set_config(ConfigKey::Cores, 0x1).unwrap();
    dom.set_config(ConfigKey::SwitchType, 0x0).unwrap();
    dom.set_entry(0, Entry::new(0x3000, 0x1000, 0x1ff0)).unwrap();
}

fn ready_domain() -> Domain {
    let mut dom = Domain::new(1, 42);
    dom.reserve_raw_segment(0x1000, 0x2000, 0x1000).unwrap();
    dom.assign_rights(0x1000, 0x1000, rw(), SegmentType::Confidential, 0x9000)
        .unwrap();
    configure(&mut dom);
    dom
}

/// Domain with three assigned segments at 0x1000, 0x2000 and 0x3000.
fn three_segments() -> Domain {
    let mut dom = Domain::new(1, 42);
    dom.reserve_raw_segment(0x1000, 0x10000, 0x3000).unwrap();
    for va in [0x1000, 0x2000, 0x3000] {
        dom.assign_rights(va, 0x1000, rw(), SegmentType::Shared, va)
            .unwrap();
    }
    dom
}

#[test]
fn test_commit_domain_full() {
    let monitor = LocalMonitor::new();
    let mut dom = ready_domain();
    commit_domain(&mut dom, &monitor, true).unwrap();

    assert_eq!(dom.state(), CommitState::Committed);
    assert_eq!(dom.domain_id(), 1);
    assert_eq!(dom.memory().segments()[0].state, SegmentState::Committed(1));
    assert_eq!(dom.config().core(0).unwrap().state, CommitState::Committed);
    assert_eq!(dom.config().slot(ConfigKey::Cores), ConfigSlot::Committed(0x1));
    assert!(monitor.is_sealed(1));

    let expected = vec![
        MonitorCall::CreateDomain,
        MonitorCall::SetConfig {
            domain: 1,
            key: ConfigKey::Permissions,
            value: 0x1,
        },
        MonitorCall::SetConfig {
            domain: 1,
            key: ConfigKey::Traps,
            value: 0x0,
        },
        MonitorCall::SetConfig {
            domain: 1,
            key: ConfigKey::Cores,
            value: 0x1,
        },
        MonitorCall::SetConfig {
            domain: 1,
            key: ConfigKey::SwitchType,
            value: 0x0,
        },
        MonitorCall::SetEntry {
            domain: 1,
            core: 0,
            entry: Entry::new(0x3000, 0x1000, 0x1ff0),
        },
        MonitorCall::RealizeRegion {
            domain: 1,
            grant: RegionGrant {
                va: 0x1000,
                pa: 0x2000,
                size: 0x1000,
                rights: rw(),
                tpe: SegmentType::Confidential,
                alias: 0x9000,
            },
        },
        MonitorCall::Seal { domain: 1 },
    ];
    assert_eq!(monitor.calls(), expected);
}

#[test]
fn test_commit_domain_twice() {
    let monitor = LocalMonitor::new();
    let mut dom = ready_domain();
    commit_domain(&mut dom, &monitor, true).unwrap();
    monitor.clear_calls();

    commit_domain(&mut dom, &monitor, true).unwrap();
    assert!(monitor.calls().is_empty());
    assert_eq!(dom.state(), CommitState::Committed);
}

#[test]
fn test_commit_domain_unset_switch_type() {
    let monitor = LocalMonitor::new();
    let mut dom = Domain::new(1, 42);
    dom.reserve_raw_segment(0x1000, 0x2000, 0x1000).unwrap();
    dom.assign_rights(0x1000, 0x1000, rw(), SegmentType::Confidential, 0x9000)
        .unwrap();
    dom.set_config(ConfigKey::Permissions, 0x1).unwrap();
    dom.set_config(ConfigKey::Traps, 0x0).unwrap();
    dom.set_config(ConfigKey::Cores, 0x1).unwrap();
    dom.set_entry(0, Entry::new(0x3000, 0x1000, 0x1ff0)).unwrap();

    assert_eq!(
        commit_domain(&mut dom, &monitor, true),
        Err(DriverError::Unset(CommitUnit::Config(ConfigKey::SwitchType)))
    );
    assert_eq!(dom.state(), CommitState::NotCommitted);
    assert_eq!(dom.domain_id(), UNINIT_DOM_ID);
    assert_eq!(dom.memory().segments()[0].state, SegmentState::NotCommitted);
    assert!(monitor.calls().is_empty());
}

#[test]
fn test_commit_domain_enabled_core_without_entry() {
    let monitor = LocalMonitor::new();
    let mut dom = ready_domain();
    dom.set_config(ConfigKey::Cores, 0b11).unwrap();
    assert_eq!(
        commit_domain(&mut dom, &monitor, true),
        Err(DriverError::Unset(CommitUnit::Core(1)))
    );
    dom.set_config(ConfigKey::Cores, 1 << 16).unwrap();
    assert_eq!(
        commit_domain(&mut dom, &monitor, true),
        Err(DriverError::InvalidCore(16))
    );
    assert!(monitor.calls().is_empty());
}

#[test]
fn test_commit_segments_idempotent() {
    let monitor = LocalMonitor::new();
    let mut dom = three_segments();
    commit_segments(&mut dom, &monitor).unwrap();
    commit_segments(&mut dom, &monitor).unwrap();

    assert_eq!(monitor.count(CallInterface::REALIZE), 3);
    assert_eq!(monitor.count(CallInterface::CREATE), 1);
    let states: Vec<_> = dom.memory().segments().iter().map(|s| s.state).collect();
    assert_eq!(
        states,
        vec![
            SegmentState::Committed(1),
            SegmentState::Committed(2),
            SegmentState::Committed(3)
        ]
    );
    // Committing segments alone does not commit the domain.
    assert_eq!(dom.state(), CommitState::NotCommitted);
}

#[test]
fn test_commit_segments_stops_at_first_failure() {
    let monitor = LocalMonitor::new();
    let mut dom = three_segments();
    monitor.inject(CallInterface::REALIZE, MonitorError(0x42));

    assert_eq!(
        commit_segments(&mut dom, &monitor),
        Err(DriverError::Rejected {
            unit: CommitUnit::Segment { va: 0x1000 },
            code: MonitorError(0x42),
        })
    );
    assert_eq!(monitor.count(CallInterface::REALIZE), 1);
    assert!(dom
        .memory()
        .segments()
        .iter()
        .all(|s| s.state == SegmentState::NotCommitted));
}

#[test]
fn test_commit_segments_resume_after_failure() {
    let monitor = LocalMonitor::new();
    let mut dom = Domain::new(1, 42);
    dom.reserve_raw_segment(0x1000, 0x10000, 0x3000).unwrap();
    dom.assign_rights(0x1000, 0x1000, rw(), SegmentType::Shared, 0x0)
        .unwrap();
    commit_segments(&mut dom, &monitor).unwrap();

    dom.assign_rights(0x2000, 0x2000, rw(), SegmentType::Shared, 0x1000)
        .unwrap();
    dom.reserve_raw_segment(0x8000, 0x20000, 0x1000).unwrap();
    dom.assign_rights(0x8000, 0x1000, Rights::READ, SegmentType::Shared, 0x8000)
        .unwrap();

    monitor.inject(CallInterface::REALIZE, MonitorError(0x42));
    assert_eq!(
        commit_segments(&mut dom, &monitor),
        Err(DriverError::Rejected {
            unit: CommitUnit::Segment { va: 0x2000 },
            code: MonitorError(0x42),
        })
    );
    assert_eq!(dom.memory().segments()[0].state, SegmentState::Committed(1));
    assert_eq!(dom.memory().segments()[1].state, SegmentState::NotCommitted);

    commit_segments(&mut dom, &monitor).unwrap();
    // One for the first pass, one failed, two on retry.
    assert_eq!(monitor.count(CallInterface::REALIZE), 4);
    assert!(dom.memory().segments().iter().all(|s| s.is_committed()));
    assert_eq!(monitor.live_capabilities(), 3);
}

#[test]
fn test_commit_configuration_rejected() {
    let monitor = LocalMonitor::new();
    let mut dom = Domain::new(1, 42);
    dom.set_config(ConfigKey::SwitchType, 7).unwrap();

    assert_eq!(
        commit_configuration(&mut dom, &monitor, ConfigKey::SwitchType),
        Err(DriverError::Rejected {
            unit: CommitUnit::Config(ConfigKey::SwitchType),
            code: MonitorError(codes::INVALID_VALUE),
        })
    );
    assert_eq!(dom.config().slot(ConfigKey::SwitchType), ConfigSlot::Set(7));

    dom.set_config(ConfigKey::SwitchType, 1).unwrap();
    commit_configuration(&mut dom, &monitor, ConfigKey::SwitchType).unwrap();
    assert_eq!(
        dom.config().slot(ConfigKey::SwitchType),
        ConfigSlot::Committed(1)
    );
    // Committed slots are frozen.
    assert_eq!(
        dom.set_config(ConfigKey::SwitchType, 0),
        Err(DriverError::InvalidState)
    );
    commit_configuration(&mut dom, &monitor, ConfigKey::SwitchType).unwrap();
    assert_eq!(monitor.count(CallInterface::SET_CONFIG), 2);
}

#[test]
fn test_commit_configuration_unset() {
    let monitor = LocalMonitor::new();
    let mut dom = Domain::new(1, 42);
    assert_eq!(
        commit_configuration(&mut dom, &monitor, ConfigKey::Traps),
        Err(DriverError::Unset(CommitUnit::Config(ConfigKey::Traps)))
    );
    assert!(monitor.calls().is_empty());
}

#[test]
fn test_commit_entry() {
    let monitor = LocalMonitor::new();
    let mut dom = Domain::new(1, 42);
    assert_eq!(
        commit_entry(&mut dom, &monitor, 3),
        Err(DriverError::Unset(CommitUnit::Core(3)))
    );
    assert_eq!(
        commit_entry(&mut dom, &monitor, 16),
        Err(DriverError::InvalidCore(16))
    );
    assert!(monitor.calls().is_empty());

    dom.set_core_register(3, RegisterGroup::Gp, 5, 0x77).unwrap();
    dom.set_entry(3, Entry::new(0x4000, 0x1000, 0x2000)).unwrap();
    commit_entry(&mut dom, &monitor, 3).unwrap();
    assert_eq!(
        monitor.calls(),
        vec![
            MonitorCall::CreateDomain,
            MonitorCall::SetCoreRegister {
                domain: 1,
                core: 3,
                group: RegisterGroup::Gp,
                index: 5,
                value: 0x77,
            },
            MonitorCall::SetEntry {
                domain: 1,
                core: 3,
                entry: Entry::new(0x4000, 0x1000, 0x2000),
            },
        ]
    );
    assert_eq!(
        dom.set_entry(3, Entry::new(0, 0, 0)),
        Err(DriverError::InvalidState)
    );
    assert_eq!(
        dom.set_core_register(3, RegisterGroup::Gp, 5, 0),
        Err(DriverError::InvalidState)
    );
}

#[test]
fn test_commit_domain_retry_after_seal_failure() {
    let monitor = LocalMonitor::new();
    let mut dom = ready_domain();
    monitor.inject(CallInterface::SEAL, MonitorError(0x9));

    assert_eq!(
        commit_domain(&mut dom, &monitor, true),
        Err(DriverError::Rejected {
            unit: CommitUnit::Seal,
            code: MonitorError(0x9),
        })
    );
    assert_eq!(dom.state(), CommitState::NotCommitted);
    assert!(dom.memory().segments()[0].is_committed());

    commit_domain(&mut dom, &monitor, true).unwrap();
    assert_eq!(dom.state(), CommitState::Committed);
    assert_eq!(monitor.count(CallInterface::REALIZE), 1);
    assert_eq!(monitor.count(CallInterface::SET_CONFIG), 4);
    assert_eq!(monitor.count(CallInterface::SET_ENTRY), 1);
    assert_eq!(monitor.count(CallInterface::SEAL), 2);
    assert_eq!(monitor.count(CallInterface::CREATE), 1);
}

#[test]
fn test_commit_domain_partial() {
    let monitor = LocalMonitor::new();
    let mut dom = ready_domain();
    assert_eq!(
        commit_domain(&mut dom, &monitor, false),
        Err(DriverError::InvalidState)
    );
    assert!(monitor.calls().is_empty());

    for key in ConfigKey::ALL {
        commit_configuration(&mut dom, &monitor, key).unwrap();
    }
    commit_entry(&mut dom, &monitor, 0).unwrap();
    monitor.clear_calls();

    commit_domain(&mut dom, &monitor, false).unwrap();
    assert_eq!(dom.state(), CommitState::Committed);
    let verbs: Vec<_> = monitor.calls().iter().map(|c| c.verb()).collect();
    assert_eq!(verbs, vec![CallInterface::REALIZE, CallInterface::SEAL]);
}

#[test]
fn test_committed_domain_is_frozen() {
    let monitor = LocalMonitor::new();
    let mut dom = ready_domain();
    commit_domain(&mut dom, &monitor, true).unwrap();

    assert_eq!(
        dom.set_config(ConfigKey::Traps, 1),
        Err(DriverError::InvalidState)
    );
    assert_eq!(
        dom.reserve_raw_segment(0x8000, 0x8000, 0x1000),
        Err(DriverError::InvalidState)
    );
    assert_eq!(
        dom.assign_rights(0x1000, 0x1000, rw(), SegmentType::Shared, 0x0),
        Err(DriverError::InvalidState)
    );
    assert_eq!(
        dom.set_entry(0, Entry::new(0, 0, 0)),
        Err(DriverError::InvalidState)
    );
    assert_eq!(dom.state(), CommitState::Committed);
}
