use crate::api::{Command, MappingRequest, Reply};
use crate::core::configuration::{ConfigKey, Entry, RegisterGroup};
use crate::core::domain::{Domain, DomainHandle, DomainSummary, Pid};
use crate::core::registry::{DomainRef, Registry};
use crate::core::segment::{Rights, SegmentType};
use crate::engine::{commit, lifecycle};
use crate::error::DriverError;
use crate::monitor::MonitorCalls;

/// Driver implementation.
/// This is the entry point for all operations.
///
/// Every operation is issued by a process on a domain handle. A domain is
/// only visible to the process that created it, and only one operation at a
/// time runs on a given domain: a concurrent one from the owner gets
/// [`DriverError::Busy`]. Other processes always get [`DriverError::NotFound`].
pub struct Driver<M: MonitorCalls> {
    registry: Registry,
    monitor: M,
}

impl<M: MonitorCalls> Driver<M> {
    pub fn new(monitor: M) -> Self {
        Driver {
            registry: Registry::new(),
            monitor,
        }
    }

    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs `op` on the locked domain if `pid` owns `handle`.
    fn with_entry<T, F>(&self, pid: Pid, handle: DomainHandle, op: F) -> Result<T, DriverError>
    where
        F: FnOnce(&DomainRef, &mut Domain) -> Result<T, DriverError>,
    {
        let domain = self.registry.find_owned(handle, pid)?;
        let mut guard = domain.try_lock().ok_or(DriverError::Busy)?;
        // Deleted since the lookup.
        if guard.is_dead() {
            return Err(DriverError::NotFound);
        }
        op(&domain, &mut *guard)
    }

    fn with_domain<T, F>(&self, pid: Pid, handle: DomainHandle, op: F) -> Result<T, DriverError>
    where
        F: FnOnce(&mut Domain, &M) -> Result<T, DriverError>,
    {
        self.with_entry(pid, handle, |_, dom| op(dom, &self.monitor))
    }

    pub fn create_domain(&self, pid: Pid, handle: DomainHandle) -> Result<(), DriverError> {
        self.registry.create_domain(handle, pid).map(|_| ())
    }

    pub fn donate(
        &self,
        pid: Pid,
        handle: DomainHandle,
        request: MappingRequest,
    ) -> Result<(), DriverError> {
        self.with_domain(pid, handle, |dom, _| {
            dom.reserve_raw_segment(request.va, request.pa, request.size)
        })
    }

    pub fn phys_offset(&self, pid: Pid, handle: DomainHandle, va: u64) -> Result<u64, DriverError> {
        self.with_domain(pid, handle, |dom, _| dom.phys_offset(va))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn assign_rights(
        &self,
        pid: Pid,
        handle: DomainHandle,
        va: u64,
        size: u64,
        rights: Rights,
        tpe: SegmentType,
        alias: u64,
    ) -> Result<(), DriverError> {
        self.with_domain(pid, handle, |dom, _| {
            dom.assign_rights(va, size, rights, tpe, alias)
        })
    }

    pub fn set_config(
        &self,
        pid: Pid,
        handle: DomainHandle,
        key: ConfigKey,
        value: u64,
    ) -> Result<(), DriverError> {
        self.with_domain(pid, handle, |dom, _| dom.set_config(key, value))
    }

    pub fn set_core_register(
        &self,
        pid: Pid,
        handle: DomainHandle,
        core: usize,
        group: RegisterGroup,
        index: usize,
        value: u64,
    ) -> Result<(), DriverError> {
        self.with_domain(pid, handle, |dom, _| {
            dom.set_core_register(core, group, index, value)
        })
    }

    pub fn set_entry(
        &self,
        pid: Pid,
        handle: DomainHandle,
        core: usize,
        entry: Entry,
    ) -> Result<(), DriverError> {
        self.with_domain(pid, handle, |dom, _| dom.set_entry(core, entry))
    }

    pub fn config(
        &self,
        pid: Pid,
        handle: DomainHandle,
        key: ConfigKey,
    ) -> Result<u64, DriverError> {
        self.with_domain(pid, handle, |dom, _| dom.config_value(key))
    }

    pub fn entry(
        &self,
        pid: Pid,
        handle: DomainHandle,
        core: usize,
    ) -> Result<Entry, DriverError> {
        self.with_domain(pid, handle, |dom, _| dom.entry(core))
    }

    pub fn commit_configuration(
        &self,
        pid: Pid,
        handle: DomainHandle,
        key: ConfigKey,
    ) -> Result<(), DriverError> {
        self.with_domain(pid, handle, |dom, monitor| {
            commit::commit_configuration(dom, monitor, key)
        })
    }

    pub fn commit_entry(
        &self,
        pid: Pid,
        handle: DomainHandle,
        core: usize,
    ) -> Result<(), DriverError> {
        self.with_domain(pid, handle, |dom, monitor| {
            commit::commit_entry(dom, monitor, core)
        })
    }

    pub fn commit_segments(&self, pid: Pid, handle: DomainHandle) -> Result<(), DriverError> {
        self.with_domain(pid, handle, commit::commit_segments)
    }

    pub fn commit(&self, pid: Pid, handle: DomainHandle, full: bool) -> Result<(), DriverError> {
        self.with_domain(pid, handle, |dom, monitor| {
            commit::commit_domain(dom, monitor, full)
        })
    }

    pub fn switch(&self, pid: Pid, handle: DomainHandle, args: u64) -> Result<(), DriverError> {
        self.with_domain(pid, handle, |dom, monitor| {
            lifecycle::switch_into(dom, monitor, args)
        })
    }

    pub fn describe(&self, pid: Pid, handle: DomainHandle) -> Result<String, DriverError> {
        self.with_domain(pid, handle, |dom, _| Ok(format!("{}", dom)))
    }

    pub fn summary(&self, pid: Pid, handle: DomainHandle) -> Result<DomainSummary, DriverError> {
        self.with_domain(pid, handle, |dom, _| Ok(dom.summary()))
    }

    /// Revokes the domain's capabilities and drops it from the registry.
    ///
    /// The domain is removed even if some revocations fail; those are then
    /// reported through a single [`DriverError::RevokeFailed`].
    pub fn delete(&self, pid: Pid, handle: DomainHandle) -> Result<(), DriverError> {
        let failed = self.with_entry(pid, handle, |domain, dom| {
            let failed = lifecycle::delete_domain(dom, &self.monitor);
            self.registry.delete_domain(domain, dom)?;
            Ok(failed)
        })?;
        if !failed.is_empty() {
            return Err(DriverError::RevokeFailed(failed));
        }
        Ok(())
    }

    /// Executes a decoded command on behalf of `pid`.
    pub fn dispatch(
        &self,
        pid: Pid,
        handle: DomainHandle,
        command: Command,
    ) -> Result<Reply, DriverError> {
        match command {
            Command::Create => self.create_domain(pid, handle).map(|_| Reply::Empty),
            Command::Donate(request) => self.donate(pid, handle, request).map(|_| Reply::Empty),
            Command::PhysOffset { va } => self.phys_offset(pid, handle, va).map(Reply::Value),
            Command::AssignRights {
                va,
                size,
                rights,
                tpe,
                alias,
            } => self
                .assign_rights(pid, handle, va, size, rights, tpe, alias)
                .map(|_| Reply::Empty),
            Command::SetConfig { key, value } => self
                .set_config(pid, handle, key, value)
                .map(|_| Reply::Empty),
            Command::SetCoreRegister {
                core,
                group,
                index,
                value,
            } => self
                .set_core_register(pid, handle, core, group, index, value)
                .map(|_| Reply::Empty),
            Command::SetEntry {
                core,
                page_table_root,
                ip,
                sp,
            } => self
                .set_entry(pid, handle, core, Entry::new(page_table_root, ip, sp))
                .map(|_| Reply::Empty),
            Command::GetConfig { key } => self.config(pid, handle, key).map(Reply::Value),
            Command::GetEntry { core } => self.entry(pid, handle, core).map(Reply::Entry),
            Command::CommitConfig { key } => self
                .commit_configuration(pid, handle, key)
                .map(|_| Reply::Empty),
            Command::CommitEntry { core } => self
                .commit_entry(pid, handle, core)
                .map(|_| Reply::Empty),
            Command::CommitSegments => self.commit_segments(pid, handle).map(|_| Reply::Empty),
            Command::Commit { full } => self.commit(pid, handle, full).map(|_| Reply::Empty),
            Command::Switch { args } => self.switch(pid, handle, args).map(|_| Reply::Empty),
            Command::Describe => self.describe(pid, handle).map(Reply::Text),
            Command::Summary => self.summary(pid, handle).map(Reply::Summary),
            Command::Delete => self.delete(pid, handle).map(|_| Reply::Empty),
        }
    }
}
