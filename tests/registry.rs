use std::sync::Arc;
use std::thread;

use capa_driver::core::registry::Registry;
use capa_driver::engine::lifecycle::delete_domain;
use capa_driver::monitor::local::LocalMonitor;
use capa_driver::{CommitState, ConfigKey, Driver, DriverError};

#[test]
fn test_create_and_find() {
    let registry = Registry::new();
    assert!(registry.is_empty());
    registry.create_domain(0x10, 42).unwrap();
    registry.create_domain(0x20, 43).unwrap();

    let domain = registry.find_domain(0x20).unwrap();
    assert_eq!(domain.lock().pid(), 43);
    assert_eq!(domain.lock().state(), CommitState::NotCommitted);
    assert_eq!(registry.handles(), vec![0x10, 0x20]);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_duplicate_handle() {
    let registry = Registry::new();
    registry.create_domain(0x10, 42).unwrap();
    assert!(matches!(
        registry.create_domain(0x10, 43),
        Err(DriverError::DuplicateHandle(0x10))
    ));
    // The first one is untouched.
    assert_eq!(registry.find_domain(0x10).unwrap().lock().pid(), 42);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_find_missing() {
    let registry = Registry::new();
    assert!(matches!(
        registry.find_domain(0x10),
        Err(DriverError::NotFound)
    ));
}

#[test]
fn test_delete_live_domain() {
    let monitor = LocalMonitor::new();
    let registry = Registry::new();
    let domain = registry.create_domain(0x10, 42).unwrap();
    assert!(matches!(
        registry.delete_domain(&domain, &domain.lock()),
        Err(DriverError::InvalidState)
    ));
    assert_eq!(registry.len(), 1);

    let mut guard = domain.lock();
    delete_domain(&mut guard, &monitor);
    registry.delete_domain(&domain, &guard).unwrap();
    assert!(registry.is_empty());
    assert!(matches!(
        registry.delete_domain(&domain, &guard),
        Err(DriverError::NotFound)
    ));
}

#[test]
fn test_find_owned() {
    let registry = Registry::new();
    registry.create_domain(0x10, 42).unwrap();
    assert!(registry.find_owned(0x10, 42).is_ok());
    assert!(matches!(
        registry.find_owned(0x10, 43),
        Err(DriverError::NotFound)
    ));
    assert!(matches!(
        registry.find_owned(0x20, 42),
        Err(DriverError::NotFound)
    ));
}

#[test]
fn test_stale_record_cannot_remove_recreated_handle() {
    let driver = Driver::new(LocalMonitor::new());
    driver.create_domain(42, 1).unwrap();
    let stale = driver.registry().find_domain(1).unwrap();

    driver.delete(42, 1).unwrap();
    driver.create_domain(99, 1).unwrap();

    // The old record is dead, the registry entry belongs to pid 99 now.
    let mut guard = stale.lock();
    assert!(delete_domain(&mut guard, driver.monitor()).is_empty());
    assert!(matches!(
        driver.registry().delete_domain(&stale, &guard),
        Err(DriverError::NotFound)
    ));
    drop(guard);

    assert_eq!(driver.registry().len(), 1);
    let summary = driver.summary(99, 1).unwrap();
    assert_eq!(summary.state, CommitState::NotCommitted);
    assert_eq!(driver.delete(42, 1), Err(DriverError::NotFound));
}

#[test]
fn test_dead_record_is_not_found() {
    let driver = Driver::new(LocalMonitor::new());
    driver.create_domain(42, 1).unwrap();
    let domain = driver.registry().find_domain(1).unwrap();
    // Killed behind the registry's back: the driver treats it as gone.
    delete_domain(&mut domain.lock(), driver.monitor());
    assert_eq!(
        driver.set_config(42, 1, ConfigKey::Traps, 0),
        Err(DriverError::NotFound)
    );
    assert_eq!(driver.delete(42, 1), Err(DriverError::NotFound));
    assert_eq!(driver.registry().len(), 1);
}

#[test]
fn test_concurrent_creation() {
    let registry = Arc::new(Registry::new());
    let workers: Vec<_> = (0..8u64)
        .map(|t| {
            let registry = registry.clone();
            thread::spawn(move || {
                for i in 0..32u64 {
                    registry.create_domain(t * 100 + i, t as u32).unwrap();
                }
                // Every thread also races on a shared handle.
                registry.create_domain(0xffff, t as u32).is_ok()
            })
        })
        .collect();

    let winners = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(registry.len(), 8 * 32 + 1);
}

#[test]
fn test_busy_domain() {
    let driver = Driver::new(LocalMonitor::new());
    driver.create_domain(42, 1).unwrap();
    driver.create_domain(42, 2).unwrap();

    let domain = driver.registry().find_domain(1).unwrap();
    let guard = domain.lock();
    assert_eq!(
        driver.set_config(42, 1, ConfigKey::Traps, 0),
        Err(DriverError::Busy)
    );
    // Other domains are not affected.
    driver.set_config(42, 2, ConfigKey::Traps, 0).unwrap();
    // Other processes cannot tell a busy domain from a missing one.
    assert_eq!(
        driver.set_config(43, 1, ConfigKey::Traps, 0),
        Err(DriverError::NotFound)
    );
    assert_eq!(driver.delete(43, 1), Err(DriverError::NotFound));
    drop(guard);

    driver.set_config(42, 1, ConfigKey::Traps, 0).unwrap();
}

#[test]
fn test_concurrent_operations_on_distinct_domains() {
    let driver = Arc::new(Driver::new(LocalMonitor::new()));
    let workers: Vec<_> = (0..4u64)
        .map(|handle| {
            let driver = driver.clone();
            thread::spawn(move || {
                driver.create_domain(7, handle).unwrap();
                for value in 0..64 {
                    driver
                        .set_config(7, handle, ConfigKey::Permissions, value)
                        .unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    for handle in 0..4 {
        let summary = driver.summary(7, handle).unwrap();
        assert_eq!(summary.permissions, Some(63));
    }
}
