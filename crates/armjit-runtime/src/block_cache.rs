use crate::addr_index::AddrIndex;
use armjit_backend_x64::PatchSite;
use armjit_ir::{AddrRange, LocationDescriptor};
use std::collections::HashMap;

/// Everything the dispatcher needs to remember about one compiled block:
/// where its code lives in the shared buffer and what needs relinking if a
/// caller elsewhere starts pointing at it, or unlinking if it's invalidated.
pub struct CacheEntry {
    pub code_offset: usize,
    pub code_len: usize,
    pub patches: Vec<PatchSite>,
    pub addr_ranges: Vec<AddrRange>,
}

impl CacheEntry {
    pub fn entry_address(&self, code_base: u64) -> u64 {
        code_base + self.code_offset as u64
    }
}

/// Location-descriptor hash map (exact lookup) plus an address-range index
/// (range-based invalidation), over the same record set — spec's two views
/// of one cache.
#[derive(Default)]
pub struct BlockCache {
    by_location: HashMap<LocationDescriptor, CacheEntry>,
    addr_index: AddrIndex,
}

impl BlockCache {
    pub fn new() -> Self {
        BlockCache::default()
    }

    pub fn get(&self, desc: &LocationDescriptor) -> Option<&CacheEntry> {
        self.by_location.get(desc)
    }

    pub fn contains(&self, desc: &LocationDescriptor) -> bool {
        self.by_location.contains_key(desc)
    }

    pub fn insert(&mut self, desc: LocationDescriptor, entry: CacheEntry) {
        self.addr_index.insert(desc, &entry.addr_ranges);
        self.by_location.insert(desc, entry);
    }

    fn remove(&mut self, desc: &LocationDescriptor) -> Option<CacheEntry> {
        self.addr_index.remove(*desc);
        self.by_location.remove(desc)
    }

    /// Removes every cache record whose recorded address range intersects
    /// any range in `ranges`, returning the removed `(descriptor, entry)`
    /// pairs so the dispatcher can unlink their inbound patch sites.
    pub fn invalidate_ranges(&mut self, ranges: &[AddrRange]) -> Vec<(LocationDescriptor, CacheEntry)> {
        let mut hit = Vec::new();
        for &range in ranges {
            for desc in self.addr_index.intersecting(range) {
                if !hit.contains(&desc) {
                    hit.push(desc);
                }
            }
        }
        hit.into_iter().filter_map(|desc| self.remove(&desc).map(|e| (desc, e))).collect()
    }

    pub fn clear(&mut self) {
        self.by_location.clear();
        self.addr_index = AddrIndex::new();
    }

    pub fn len(&self) -> usize {
        self.by_location.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_location.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armjit_types::ExecMode;

    fn loc(pc: u64) -> LocationDescriptor {
        LocationDescriptor::new(pc, ExecMode::A64, 0)
    }

    fn entry(range: AddrRange) -> CacheEntry {
        CacheEntry {
            code_offset: 0,
            code_len: 4,
            patches: vec![],
            addr_ranges: vec![range],
        }
    }

    #[test]
    fn invalidate_ranges_removes_intersecting_records_only() {
        let mut cache = BlockCache::new();
        cache.insert(loc(0x1000), entry(AddrRange { start: 0x1000, end: 0x1004 }));
        cache.insert(loc(0x2000), entry(AddrRange { start: 0x2000, end: 0x2004 }));
        let removed = cache.invalidate_ranges(&[AddrRange { start: 0x1000, end: 0x1004 }]);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, loc(0x1000));
        assert!(!cache.contains(&loc(0x1000)));
        assert!(cache.contains(&loc(0x2000)));
    }

    #[test]
    fn clear_drops_every_record() {
        let mut cache = BlockCache::new();
        cache.insert(loc(0x1000), entry(AddrRange { start: 0x1000, end: 0x1004 }));
        cache.clear();
        assert!(cache.is_empty());
    }
}
