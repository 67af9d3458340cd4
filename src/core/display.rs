use std::fmt;

use crate::config::ENTRIES_PER_DOMAIN;
use crate::core::configuration::{ConfigKey, ConfigSlot, CoreConfig};
use crate::core::domain::Domain;
use crate::core::segment::{Rights, Segment, SegmentState, Span};

impl fmt::Display for Rights {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.contains(Rights::READ) {
            write!(f, "R")?;
        } else {
            write!(f, "_")?;
        }
        if self.contains(Rights::WRITE) {
            write!(f, "W")?;
        } else {
            write!(f, "_")?;
        }
        if self.contains(Rights::EXECUTE) {
            write!(f, "X")?;
        } else {
            write!(f, "_")?;
        }
        if self.contains(Rights::SUPER) {
            write!(f, "S")?;
        } else {
            write!(f, "_")?;
        }
        Ok(())
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x} {:#x} at {:#x}", self.va, self.end(), self.pa)
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SegmentState::NotCommitted => write!(f, "NotCommitted"),
            SegmentState::Committed(capa) => write!(f, "Committed(capa {})", capa),
            SegmentState::Dead => write!(f, "Dead"),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:?} {} with {} alias {:#x} {}",
            self.tpe, self.span, self.rights, self.alias, self.state
        )
    }
}

impl fmt::Display for ConfigSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigSlot::Unset => write!(f, "unset"),
            ConfigSlot::Set(v) => write!(f, "{:#x}", v),
            // Committed values are starred.
            ConfigSlot::Committed(v) => write!(f, "{:#x}*", v),
            ConfigSlot::Dead => write!(f, "dead"),
        }
    }
}

impl fmt::Display for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.entry {
            Some(e) => write!(
                f,
                "cr3 {:#x} rip {:#x} rsp {:#x}",
                e.page_table_root, e.ip, e.sp
            )?,
            None => write!(f, "no entry")?,
        }
        if !self.registers.is_empty() {
            write!(f, " regs {}", self.registers.len())?;
        }
        write!(f, " {:?}", self.state)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "td{} = {:?} domain(pid {}", self.handle, self.state, self.pid)?;
        if self.has_monitor_id() {
            write!(f, ", id {}", self.domain_id)?;
        }
        writeln!(f, ")")?;

        write!(f, "|config:")?;
        for key in ConfigKey::ALL {
            write!(f, " {:?}={}", key, self.config.slot(key))?;
        }
        writeln!(f)?;

        // Only the cores that have been touched.
        for core in 0..ENTRIES_PER_DOMAIN {
            let Ok(cfg) = self.config.core(core) else {
                continue;
            };
            if cfg.entry.is_none() && cfg.registers.is_empty() {
                continue;
            }
            writeln!(f, "|core{}: {}", core, cfg)?;
        }

        for r in self.memory.raw() {
            writeln!(f, "raw {}", r.span)?;
        }
        for s in self.memory.segments() {
            writeln!(f, "seg {}", s)?;
        }
        Ok(())
    }
}
