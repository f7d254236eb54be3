//! First-fit allocator for contiguous runs of atlas tiles.

use std::fmt;

/// Index of the first tile of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u32);

impl TileId {
    /// Returned when no contiguous run of the requested length is free.
    pub const INVALID: Self = Self(u32::MAX);

    /// Whether this id refers to an allocation.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Raw tile index.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl Default for TileId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "tile#{}", self.0)
        } else {
            f.write_str("tile#invalid")
        }
    }
}

/// Allocates runs of consecutive tiles out of a fixed-size atlas.
///
/// Free space is kept as a sorted list of non-overlapping `[start, end)`
/// ranges that are merged with their neighbours on release. Allocation takes
/// the first range that is long enough, so freeing a run and allocating the
/// same length again returns the same tiles.
///
/// ```
/// use lumen_graphics::light_probe::{TileAllocator, TileId};
///
/// let mut tiles = TileAllocator::new(8);
/// let first = tiles.allocate(3);
/// assert_eq!(first, TileId(0));
/// assert!(tiles.free(first.index(), first.index() + 2));
/// assert_eq!(tiles.allocate(3), first);
/// ```
#[derive(Debug, Clone)]
pub struct TileAllocator {
    tile_count: u32,
    free_ranges: Vec<(u32, u32)>,
    allocated: Vec<(u32, u32)>,
}

impl TileAllocator {
    /// Allocator with every tile free.
    pub fn new(tile_count: u32) -> Self {
        let free_ranges = if tile_count > 0 {
            vec![(0, tile_count)]
        } else {
            Vec::new()
        };
        Self {
            tile_count,
            free_ranges,
            allocated: Vec::new(),
        }
    }

    /// Total number of tiles.
    pub fn tile_count(&self) -> u32 {
        self.tile_count
    }

    /// Allocate `count` consecutive tiles.
    ///
    /// Returns [`TileId::INVALID`] if `count` is zero or no free run is long
    /// enough. The allocator is left unchanged in that case.
    pub fn allocate(&mut self, count: u32) -> TileId {
        if count == 0 {
            return TileId::INVALID;
        }
        let Some(slot) = self
            .free_ranges
            .iter()
            .position(|&(start, end)| end - start >= count)
        else {
            return TileId::INVALID;
        };

        let (start, end) = self.free_ranges[slot];
        if end - start == count {
            self.free_ranges.remove(slot);
        } else {
            self.free_ranges[slot].0 = start + count;
        }

        let insert_at = self.allocated.partition_point(|&(s, _)| s < start);
        self.allocated.insert(insert_at, (start, start + count));
        TileId(start)
    }

    /// Release the run `first..=last`.
    ///
    /// Succeeds only if exactly that run was returned by a previous
    /// [`allocate`](Self::allocate) and is still held. Any other range
    /// returns `false` and leaves the allocator untouched.
    pub fn free(&mut self, first: u32, last: u32) -> bool {
        if last < first || last == u32::MAX {
            return false;
        }
        let run = (first, last + 1);
        let Ok(slot) = self.allocated.binary_search(&run) else {
            return false;
        };
        self.allocated.remove(slot);
        self.insert_free(run);
        true
    }

    /// Number of free tiles.
    pub fn free_tiles(&self) -> u32 {
        self.free_ranges.iter().map(|&(s, e)| e - s).sum()
    }

    /// Number of allocated tiles.
    pub fn used_tiles(&self) -> u32 {
        self.tile_count - self.free_tiles()
    }

    /// Length of the longest free run.
    pub fn largest_free_run(&self) -> u32 {
        self.free_ranges
            .iter()
            .map(|&(s, e)| e - s)
            .max()
            .unwrap_or(0)
    }

    /// Number of live allocations.
    pub fn allocation_count(&self) -> usize {
        self.allocated.len()
    }

    fn insert_free(&mut self, (start, end): (u32, u32)) {
        let at = self.free_ranges.partition_point(|&(s, _)| s < start);
        self.free_ranges.insert(at, (start, end));

        // Merge with the following range, then the preceding one.
        if at + 1 < self.free_ranges.len() && self.free_ranges[at + 1].0 == end {
            self.free_ranges[at].1 = self.free_ranges[at + 1].1;
            self.free_ranges.remove(at + 1);
        }
        if at > 0 && self.free_ranges[at - 1].1 == start {
            self.free_ranges[at - 1].1 = self.free_ranges[at].1;
            self.free_ranges.remove(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fit_order() {
        let mut tiles = TileAllocator::new(10);
        assert_eq!(tiles.allocate(4), TileId(0));
        assert_eq!(tiles.allocate(4), TileId(4));
        assert_eq!(tiles.allocate(4), TileId::INVALID);
        assert_eq!(tiles.allocate(2), TileId(8));
        assert_eq!(tiles.free_tiles(), 0);
    }

    #[test]
    fn test_free_and_reuse() {
        let mut tiles = TileAllocator::new(16);
        let a = tiles.allocate(5);
        let _b = tiles.allocate(3);
        assert!(tiles.free(a.index(), a.index() + 4));
        assert_eq!(tiles.allocate(5), a);
    }

    #[test]
    fn test_inexact_free_fails_without_mutation() {
        let mut tiles = TileAllocator::new(16);
        let a = tiles.allocate(4);
        let before_free = tiles.free_tiles();
        let before_largest = tiles.largest_free_run();

        assert!(!tiles.free(a.index(), a.index() + 2));
        assert!(!tiles.free(a.index() + 1, a.index() + 3));
        assert!(!tiles.free(8, 9));
        assert!(!tiles.free(3, 1));

        assert_eq!(tiles.free_tiles(), before_free);
        assert_eq!(tiles.largest_free_run(), before_largest);
        assert_eq!(tiles.allocation_count(), 1);
        assert!(tiles.free(a.index(), a.index() + 3));
    }

    #[test]
    fn test_double_free_fails() {
        let mut tiles = TileAllocator::new(4);
        let a = tiles.allocate(2);
        assert!(tiles.free(0, 1));
        assert!(!tiles.free(0, 1));
        assert_eq!(a, TileId(0));
    }

    #[test]
    fn test_coalescing() {
        let mut tiles = TileAllocator::new(9);
        let a = tiles.allocate(3);
        let b = tiles.allocate(3);
        let c = tiles.allocate(3);
        assert!(tiles.free(a.index(), 2));
        assert!(tiles.free(c.index(), 8));
        assert_eq!(tiles.largest_free_run(), 3);
        assert!(tiles.free(b.index(), 5));
        assert_eq!(tiles.largest_free_run(), 9);
        assert_eq!(tiles.allocate(9), TileId(0));
    }

    #[test]
    fn test_fragmentation_returns_invalid() {
        let mut tiles = TileAllocator::new(6);
        let a = tiles.allocate(2);
        let _b = tiles.allocate(2);
        let c = tiles.allocate(2);
        tiles.free(a.index(), 1);
        tiles.free(c.index(), 5);
        assert_eq!(tiles.free_tiles(), 4);
        assert_eq!(tiles.allocate(3), TileId::INVALID);
    }

    #[test]
    fn test_zero_sized() {
        let mut tiles = TileAllocator::new(0);
        assert_eq!(tiles.allocate(1), TileId::INVALID);
        let mut tiles = TileAllocator::new(4);
        assert_eq!(tiles.allocate(0), TileId::INVALID);
        assert_eq!(TileId::default(), TileId::INVALID);
    }
}
