//! The span-by-address map.
//!
//! Address lookups are the hot query of a debugger: "which spans cover
//! the program counter". The map is a flat, binary-searchable array with
//! one entry per unique address that any span covers. An address covered
//! by a single span stores the span id inline; only addresses shared by
//! several spans pay for an indirection vector.
//!
//! Construction runs in five bounded passes over the address-sorted span
//! list:
//!
//! 1. count the unique addresses,
//! 2. allocate the flat entry array of exactly that size,
//! 3. count how many spans cover each address,
//! 4. allocate the indirection vectors for counts above one,
//! 5. deposit the span ids.
//!
//! Passes 3 and 5 replay the same walk; [`walk`] keeps them in step.

use dbg65_par::record::{Addr, SpanId, SpanInfo};
use dbg65_util::IndexVec;

/// Map from unique covered address to the spans covering it.
#[derive(Debug, PartialEq, Eq)]
pub struct SpanAddrMap {
    /// Entries sorted by address, one per unique covered address.
    entries: Vec<AddrEntry>,
}

/// One unique address and the spans covering it.
#[derive(Debug, PartialEq, Eq)]
pub struct AddrEntry {
    addr: Addr,
    count: u32,
    data: AddrData,
}

/// Compact one-or-many storage for the covering spans.
#[derive(Debug, PartialEq, Eq)]
enum AddrData {
    /// Placeholder during construction.
    Empty,
    /// The address is covered by exactly one span.
    One(SpanId),
    /// The address is covered by several spans.
    Many(Vec<SpanId>),
}

impl SpanAddrMap {
    /// Builds the map from `sorted`, the ids of all non-empty spans
    /// ordered by `(start, end)` ascending.
    pub fn build(sorted: &[SpanId], spans: &IndexVec<SpanId, SpanInfo>) -> Self {
        if sorted.is_empty() {
            return Self {
                entries: Vec::new(),
            };
        }

        // Step 1: determine the number of unique address entries needed.
        // A span past the running maximum contributes all its addresses,
        // an overlapping one only the part beyond the maximum, and a
        // fully enclosed one contributes nothing.
        let first = &spans[sorted[0]];
        let mut unique = first.size as usize;
        let mut end = first.end();
        for &id in &sorted[1..] {
            let span = &spans[id];
            if span.start > end {
                unique += span.size as usize;
                end = span.end();
            } else if span.end() > end {
                unique += (span.end() - end) as usize;
                end = span.end();
            }
        }

        // Step 2: allocate the flat array.
        let mut entries: Vec<AddrEntry> = Vec::new();
        entries.resize_with(unique, || AddrEntry {
            addr: 0,
            count: 0,
            data: AddrData::Empty,
        });

        // Step 3: count the spans covering each unique address.
        walk(sorted, spans, |index, addr, _| {
            entries[index].addr = addr;
            entries[index].count += 1;
        });

        // Step 4: shared addresses get an indirection vector sized to
        // their count; single-span addresses will store the id inline.
        for entry in &mut entries {
            if entry.count > 1 {
                entry.data = AddrData::Many(Vec::with_capacity(entry.count as usize));
            }
        }

        // Step 5: deposit the span ids.
        walk(sorted, spans, |index, addr, id| {
            let entry = &mut entries[index];
            debug_assert_eq!(entry.addr, addr);
            match &mut entry.data {
                AddrData::Many(list) => list.push(id),
                AddrData::One(_) => debug_assert!(false, "single-span slot filled twice"),
                slot => *slot = AddrData::One(id),
            }
        });

        Self { entries }
    }

    /// Looks up an address. Returns `None` for addresses no span covers.
    pub fn lookup(&self, addr: Addr) -> Option<&AddrEntry> {
        self.entries
            .binary_search_by(|entry| entry.addr.cmp(&addr))
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Number of unique addresses covered by any span.
    pub fn unique_addresses(&self) -> usize {
        self.entries.len()
    }

    /// True if no span covers any address.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AddrEntry {
    /// The address of this entry.
    pub fn addr(&self) -> Addr {
        self.addr
    }

    /// Number of spans covering the address.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The ids of the covering spans.
    pub fn span_ids(&self) -> &[SpanId] {
        match &self.data {
            AddrData::Empty => &[],
            AddrData::One(id) => std::slice::from_ref(id),
            AddrData::Many(list) => list,
        }
    }
}

/// Replays the construction walk: calls `visit` with the entry index,
/// address and span id for every `(span, address)` pair, using the same
/// running-interval arithmetic in both counting and filling passes.
fn walk(
    sorted: &[SpanId],
    spans: &IndexVec<SpanId, SpanInfo>,
    mut visit: impl FnMut(usize, Addr, SpanId),
) {
    let first = &spans[sorted[0]];
    let mut start_index = 0usize;
    let mut start = first.start;
    let mut end = first.end();
    for (offset, addr) in (first.start..=first.end()).enumerate() {
        visit(start_index + offset, addr, sorted[0]);
    }

    for &id in &sorted[1..] {
        let span = &spans[id];

        // The list is sorted by start address, so the next span begins at
        // or after the current one; it either overlaps the known linear
        // range or starts a new one.
        if span.start <= end {
            start_index += (span.start - start) as usize;
            start = span.start;
            if span.end() > end {
                end = span.end();
            }
        } else {
            start_index += (end - start) as usize + 1;
            start = span.start;
            end = span.end();
        }

        for (offset, addr) in (span.start..=span.end()).enumerate() {
            visit(start_index + offset, addr, id);
        }
    }
}
