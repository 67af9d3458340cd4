use std::collections::BTreeMap;
use std::sync::Arc;

use spin::{Mutex, RwLock};

use crate::core::domain::{Domain, DomainHandle, Pid};
use crate::error::DriverError;

/// Shared reference to a domain, the mutex serializes mutations on it.
pub type DomainRef = Arc<Mutex<Domain>>;

/// A registered domain and the process that owns it.
///
/// The owner is kept outside the domain lock so ownership can be checked
/// without waiting on the domain.
struct RegistryEntry {
    owner: Pid,
    domain: DomainRef,
}

/// Process-wide map from handles to domains.
///
/// The map lock is never held while waiting on a domain lock.
pub struct Registry {
    domains: RwLock<BTreeMap<DomainHandle, RegistryEntry>>,
}

impl Registry {
    pub const fn new() -> Self {
        Registry {
            domains: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn create_domain(&self, handle: DomainHandle, pid: Pid) -> Result<DomainRef, DriverError> {
        let mut domains = self.domains.write();
        if domains.contains_key(&handle) {
            return Err(DriverError::DuplicateHandle(handle));
        }
        let domain = Arc::new(Mutex::new(Domain::new(handle, pid)));
        domains.insert(
            handle,
            RegistryEntry {
                owner: pid,
                domain: domain.clone(),
            },
        );
        log::info!("created domain {:#x} for pid {}", handle, pid);
        Ok(domain)
    }

    pub fn find_domain(&self, handle: DomainHandle) -> Result<DomainRef, DriverError> {
        self.domains
            .read()
            .get(&handle)
            .map(|e| e.domain.clone())
            .ok_or(DriverError::NotFound)
    }

    /// Like [`Registry::find_domain`], but only for the owner of the domain.
    /// Other processes get `NotFound`.
    pub fn find_owned(&self, handle: DomainHandle, pid: Pid) -> Result<DomainRef, DriverError> {
        self.domains
            .read()
            .get(&handle)
            .filter(|e| e.owner == pid)
            .map(|e| e.domain.clone())
            .ok_or(DriverError::NotFound)
    }

    /// Drops a dead domain from the registry.
    ///
    /// `locked` is the content of `domain`, which the caller holds locked.
    /// The entry is only removed if it still is `domain`: a record looked up
    /// before its handle was deleted and registered again gets `NotFound`.
    pub fn delete_domain(&self, domain: &DomainRef, locked: &Domain) -> Result<(), DriverError> {
        if !locked.is_dead() {
            return Err(DriverError::InvalidState);
        }
        let mut domains = self.domains.write();
        match domains.get(&locked.handle) {
            Some(e) if Arc::ptr_eq(&e.domain, domain) => {}
            _ => return Err(DriverError::NotFound),
        }
        domains.remove(&locked.handle);
        log::info!("removed domain {:#x}", locked.handle);
        Ok(())
    }

    pub fn handles(&self) -> Vec<DomainHandle> {
        self.domains.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.domains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.read().is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
