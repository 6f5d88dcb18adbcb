//! Pointer-bounds probes.
//!
//! A probe answers "how many bytes are addressable from this address?" for
//! buffers whose capacity the caller did not declare. Probes are optional:
//! a probe with no information returns `None` and validation proceeds on
//! the contract checks alone.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

/// Source of best-effort bounds facts for raw addresses.
pub trait BoundsProbe: Send + Sync {
    /// Bytes addressable from `addr` to the end of its region, if known.
    fn remaining(&self, addr: usize) -> Option<usize>;
}

/// Probe that never knows anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbe;

impl BoundsProbe for NoProbe {
    fn remaining(&self, _addr: usize) -> Option<usize> {
        None
    }
}

/// A tracked region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionMeta {
    /// Base address.
    pub base: usize,
    /// Region length in bytes.
    pub len: usize,
}

impl RegionMeta {
    /// Returns true if `addr` lies inside `[base, base + len)`.
    #[must_use]
    pub fn contains(self, addr: usize) -> bool {
        let end = self.base.saturating_add(self.len);
        (self.base..end).contains(&addr)
    }

    /// Remaining bytes from `addr` to end of region.
    #[must_use]
    pub fn remaining(self, addr: usize) -> Option<usize> {
        if !self.contains(addr) {
            return None;
        }
        Some(self.base.saturating_add(self.len).saturating_sub(addr))
    }
}

/// Registry of caller-declared regions, keyed by base address.
///
/// Regions must not overlap; registering a base twice replaces the old entry.
#[derive(Debug, Default)]
pub struct PointerRegistry {
    regions: RwLock<BTreeMap<usize, RegionMeta>>,
}

impl PointerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `[base, base + len)`.
    pub fn register(&self, base: usize, len: usize) {
        self.regions
            .write()
            .insert(base, RegionMeta { base, len });
    }

    /// Stop tracking the region starting at `base`. Returns whether it existed.
    pub fn unregister(&self, base: usize) -> bool {
        self.regions.write().remove(&base).is_some()
    }

    /// Region containing `addr`, if any.
    #[must_use]
    pub fn lookup_containing(&self, addr: usize) -> Option<RegionMeta> {
        let regions = self.regions.read();
        regions
            .range(..=addr)
            .next_back()
            .map(|(_, meta)| *meta)
            .filter(|meta| meta.contains(addr))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.read().is_empty()
    }
}

impl BoundsProbe for PointerRegistry {
    fn remaining(&self, addr: usize) -> Option<usize> {
        self.lookup_containing(addr)?.remaining(addr)
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<PointerRegistry>> = OnceLock::new();

/// Process-wide registry consulted by the C boundary.
#[must_use]
pub fn global_registry() -> &'static Arc<PointerRegistry> {
    GLOBAL_REGISTRY.get_or_init(|| Arc::new(PointerRegistry::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_when_untracked() {
        let registry = PointerRegistry::new();
        assert_eq!(registry.remaining(0x1000), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn remaining_inside_tracked_region() {
        let registry = PointerRegistry::new();
        registry.register(0x1000, 16);
        assert_eq!(registry.remaining(0x1000), Some(16));
        assert_eq!(registry.remaining(0x1004), Some(12));
        assert_eq!(registry.remaining(0x100f), Some(1));
        assert_eq!(registry.remaining(0x1010), None);
        assert_eq!(registry.remaining(0x0fff), None);
    }

    #[test]
    fn picks_nearest_lower_region() {
        let registry = PointerRegistry::new();
        registry.register(0x1000, 0x100);
        registry.register(0x2000, 0x10);
        assert_eq!(registry.remaining(0x2008), Some(8));
        assert_eq!(registry.remaining(0x1800), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unregister_forgets_region() {
        let registry = PointerRegistry::new();
        registry.register(0x1000, 8);
        assert!(registry.unregister(0x1000));
        assert!(!registry.unregister(0x1000));
        assert_eq!(registry.remaining(0x1000), None);
    }

    #[test]
    fn no_probe_is_silent() {
        assert_eq!(NoProbe.remaining(0x1234), None);
    }
}
