//! Paging statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the paging space.
///
/// All fields are atomic so they can be bumped through a shared reference
/// and read while the space is in use.
///
/// # Memory Ordering
/// Everything uses `Ordering::Relaxed`: counters are independent and only
/// need atomicity, not ordering.
///
/// # Example
/// ```
/// use pagingspace::PagingStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = PagingStats::new();
/// stats.hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().hits, 1);
/// ```
#[derive(Debug, Default)]
pub struct PagingStats {
    /// Hash lookups performed by access and release operations.
    pub lookups: AtomicU64,

    /// Chain entries passed over during lookups.
    pub hash_misses: AtomicU64,

    /// Accesses that found the virtual frame already resident.
    pub hits: AtomicU64,

    /// Hits on a frame that was still referenced.
    pub reuses: AtomicU64,

    /// Hits on a frame that was waiting on the eviction queue.
    pub reactivations: AtomicU64,

    /// Accesses that had to bind a real frame.
    pub faults: AtomicU64,

    /// Frames taken from the eviction queue for reuse.
    pub evictions: AtomicU64,

    /// Frames read from backing files.
    pub pages_read: AtomicU64,

    /// Frames written to backing files.
    pub pages_written: AtomicU64,

    /// Accesses refused because the reference count was saturated.
    pub saturations: AtomicU64,

    /// Virtual frames given external storage.
    pub vframes_allocated: AtomicU64,

    /// Times the virtual frame arena grew.
    pub index_growths: AtomicU64,

    /// Times the hash table was rebuilt.
    pub rehashes: AtomicU64,
}

impl PagingStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to a counter.
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Fraction of accesses that were hits (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            hash_misses: self.hash_misses.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            reactivations: self.reactivations.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            saturations: self.saturations.load(Ordering::Relaxed),
            vframes_allocated: self.vframes_allocated.load(Ordering::Relaxed),
            index_growths: self.index_growths.load(Ordering::Relaxed),
            rehashes: self.rehashes.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.lookups,
            &self.hash_misses,
            &self.hits,
            &self.reuses,
            &self.reactivations,
            &self.faults,
            &self.evictions,
            &self.pages_read,
            &self.pages_written,
            &self.saturations,
            &self.vframes_allocated,
            &self.index_growths,
            &self.rehashes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// A point-in-time copy of [`PagingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lookups: u64,
    pub hash_misses: u64,
    pub hits: u64,
    pub reuses: u64,
    pub reactivations: u64,
    pub faults: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub saturations: u64,
    pub vframes_allocated: u64,
    pub index_growths: u64,
    pub rehashes: u64,
}

impl StatsSnapshot {
    /// Fraction of accesses that were hits (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.faults;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Average chain entries passed over per lookup.
    pub fn avg_chain_hops(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hash_misses as f64 / self.lookups as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, faults: {}, evictions: {}, reads: {}, writes: {}, hit_rate: {:.2}%, hops/lookup: {:.2} }}",
            self.hits,
            self.faults,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.hit_rate() * 100.0,
            self.avg_chain_hops()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = PagingStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_stats_increment() {
        let stats = PagingStats::new();

        stats.hits.fetch_add(7, Ordering::Relaxed);
        stats.faults.fetch_add(3, Ordering::Relaxed);

        assert_eq!(stats.hit_rate(), 0.7);
    }

    #[test]
    fn test_bump_and_reset() {
        let stats = PagingStats::new();
        PagingStats::bump(&stats.evictions);
        PagingStats::bump(&stats.evictions);
        assert_eq!(stats.snapshot().evictions, 2);

        stats.reset();
        assert_eq!(stats.snapshot().evictions, 0);
    }

    #[test]
    fn test_avg_chain_hops() {
        let snapshot = StatsSnapshot {
            lookups: 4,
            hash_misses: 2,
            ..Default::default()
        };
        assert_eq!(snapshot.avg_chain_hops(), 0.5);
    }

    #[test]
    fn test_stats_display() {
        let stats = PagingStats::new();
        stats.hits.fetch_add(80, Ordering::Relaxed);
        stats.faults.fetch_add(20, Ordering::Relaxed);
        stats.evictions.fetch_add(5, Ordering::Relaxed);

        let display = format!("{}", stats.snapshot());

        assert!(display.contains("hits: 80"));
        assert!(display.contains("faults: 20"));
        assert!(display.contains("evictions: 5"));
        assert!(display.contains("80.00%"));
    }
}
