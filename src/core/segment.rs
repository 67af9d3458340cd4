use std::cmp::{max, min};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::monitor::{CapaHandle, RegionGrant};

bitflags! {
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Rights: u8 {
        const READ    = 0b0001;
        const WRITE   = 0b0010;
        const EXECUTE = 0b0100;
        const SUPER   = 0b1000;
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SegmentType {
    Shared,
    Confidential,
}

/// Commit state of an assigned segment.
/// The capability handle handed out by the monitor is only known once committed.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SegmentState {
    NotCommitted,
    Committed(CapaHandle),
    Dead,
}

/// A contiguous range in the caller's address space and its physical backing.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct Span {
    pub va: u64,
    pub pa: u64,
    pub size: u64,
}

impl Span {
    pub fn new(va: u64, pa: u64, size: u64) -> Self {
        Span { va, pa, size }
    }

    /// Builds a span, rejecting empty ranges and ranges that wrap around.
    ///
    /// Ends are exclusive and must be representable, so neither range may
    /// reach the top of the address space: the last page is never usable.
    pub fn checked(va: u64, pa: u64, size: u64) -> Result<Self, DriverError> {
        if size == 0 || va.checked_add(size).is_none() || pa.checked_add(size).is_none() {
            return Err(DriverError::InvalidRange);
        }
        Ok(Span { va, pa, size })
    }

    pub fn end(&self) -> u64 {
        self.va + self.size
    }

    pub fn pa_end(&self) -> u64 {
        self.pa + self.size
    }

    pub fn contains(&self, va: u64) -> bool {
        self.va <= va && va < self.end()
    }

    /// Does [va, va + size) intersect the virtual range.
    pub fn intersect_va(&self, va: u64, size: u64) -> bool {
        va < self.end() && self.va < va + size
    }

    pub fn intersect_pa(&self, pa: u64, size: u64) -> bool {
        pa < self.pa_end() && self.pa < pa + size
    }

    /// Two spans conflict if either their virtual or their physical ranges meet.
    pub fn intersect(&self, other: &Span) -> bool {
        self.intersect_va(other.va, other.size) || self.intersect_pa(other.pa, other.size)
    }

    /// Sub-span starting at `va`, the physical start moves along.
    pub fn slice(&self, va: u64, size: u64) -> Span {
        Span {
            va,
            pa: self.pa + (va - self.va),
            size,
        }
    }
}

/// Memory reserved for a domain whose access rights are not known yet.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct RawSegment {
    pub span: Span,
}

impl RawSegment {
    pub fn new(span: Span) -> Self {
        RawSegment { span }
    }
}

/// Memory with assigned access rights, ready to be committed.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct Segment {
    pub span: Span,
    pub rights: Rights,
    pub tpe: SegmentType,
    /// Guest physical address the segment is mapped at.
    pub alias: u64,
    pub state: SegmentState,
}

impl Segment {
    pub fn is_committed(&self) -> bool {
        matches!(self.state, SegmentState::Committed(_))
    }

    pub fn grant(&self) -> RegionGrant {
        RegionGrant {
            va: self.span.va,
            pa: self.span.pa,
            size: self.span.size,
            rights: self.rights,
            tpe: self.tpe,
            alias: self.alias,
        }
    }
}

/// The raw and assigned segments of a domain, both in insertion order.
#[derive(Debug, Default)]
pub struct SegmentStore {
    raw: Vec<RawSegment>,
    segments: Vec<Segment>,
}

impl SegmentStore {
    pub fn new() -> Self {
        SegmentStore {
            raw: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn raw(&self) -> &[RawSegment] {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    /// Whether the span meets any raw or assigned segment.
    pub fn conflicts(&self, span: &Span) -> bool {
        self.raw.iter().any(|r| r.span.intersect(span))
            || self.segments.iter().any(|s| s.span.intersect(span))
    }

    pub fn reserve(&mut self, va: u64, pa: u64, size: u64) -> Result<(), DriverError> {
        let span = Span::checked(va, pa, size)?;
        if self.conflicts(&span) {
            return Err(DriverError::Overlap);
        }
        self.raw.push(RawSegment::new(span));
        Ok(())
    }

    /// Moves [va, va + size) from the raw segments to the assigned ones.
    ///
    /// The range may span several raw segments as long as they cover it
    /// without holes. One assigned segment is created per covering piece so
    /// that each keeps an exact physical start; leftovers stay raw, in place.
    pub fn assign(
        &mut self,
        va: u64,
        size: u64,
        rights: Rights,
        tpe: SegmentType,
        alias: u64,
    ) -> Result<(), DriverError> {
        // Same bounds as `Span::checked`, on the alias range too.
        if size == 0 || va.checked_add(size).is_none() || alias.checked_add(size).is_none() {
            return Err(DriverError::InvalidRange);
        }
        let end = va + size;
        if self.segments.iter().any(|s| s.span.intersect_va(va, size)) {
            return Err(DriverError::Overlap);
        }

        // Check the raw segments cover the whole range.
        let mut covering: Vec<Span> = self
            .raw
            .iter()
            .filter(|r| r.span.intersect_va(va, size))
            .map(|r| r.span)
            .collect();
        covering.sort_by_key(|s| s.va);
        let mut cursor = va;
        for s in &covering {
            if s.va > cursor {
                return Err(DriverError::NotFound);
            }
            cursor = max(cursor, s.end());
        }
        if cursor < end {
            return Err(DriverError::NotFound);
        }

        let mut raw = Vec::with_capacity(self.raw.len() + 1);
        let mut assigned = Vec::with_capacity(covering.len());
        for r in self.raw.drain(..) {
            if !r.span.intersect_va(va, size) {
                raw.push(r);
                continue;
            }
            let lo = max(r.span.va, va);
            let hi = min(r.span.end(), end);
            if r.span.va < lo {
                raw.push(RawSegment::new(r.span.slice(r.span.va, lo - r.span.va)));
            }
            if hi < r.span.end() {
                raw.push(RawSegment::new(r.span.slice(hi, r.span.end() - hi)));
            }
            assigned.push(Segment {
                span: r.span.slice(lo, hi - lo),
                rights,
                tpe,
                alias: alias + (lo - va),
                state: SegmentState::NotCommitted,
            });
        }
        assigned.sort_by_key(|s| s.span.va);
        self.raw = raw;
        self.segments.extend(assigned);
        Ok(())
    }

    pub fn find(&self, va: u64) -> Option<&Segment> {
        self.segments.iter().find(|s| s.span.contains(va))
    }

    /// Offset to add to a guest physical address of the segment holding `va`
    /// to obtain the physical address.
    pub fn phys_offset(&self, va: u64) -> Result<u64, DriverError> {
        self.find(va)
            .map(|s| s.span.pa.wrapping_sub(s.alias))
            .ok_or(DriverError::NotFound)
    }

    /// Marks every assigned segment dead and forgets the raw ones.
    pub fn release(&mut self) {
        self.raw.clear();
        for s in self.segments.iter_mut() {
            s.state = SegmentState::Dead;
        }
    }
}
