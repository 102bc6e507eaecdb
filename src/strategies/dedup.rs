use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Recently emitted signals, keyed by contract id.
///
/// Owned by the caller and injected where signals are emitted. Safe to share
/// across tasks; entries expire after twice the window and the map never
/// holds more than `max_entries` ids.
pub struct SignalDeduplicator {
    recent: DashMap<String, DateTime<Utc>>,
    window: Duration,
    max_entries: usize,
}

impl SignalDeduplicator {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self {
            recent: DashMap::new(),
            window,
            max_entries: max_entries.max(1),
        }
    }

    /// A signal for this id was recorded less than one window ago.
    pub fn is_duplicate(&self, id: &str, now: DateTime<Utc>) -> bool {
        self.recent
            .get(id)
            .map(|emitted_at| now - *emitted_at < self.window)
            .unwrap_or(false)
    }

    /// Record an emission and evict anything stale or over capacity.
    pub fn record(&self, id: &str, now: DateTime<Utc>) {
        self.recent.insert(id.to_string(), now);
        self.evict(now);
    }

    /// Record the id unless it is a duplicate. Returns whether it was recorded.
    ///
    /// The check and the insert happen under one shard lock, so concurrent
    /// callers with the same id see exactly one `true` per window.
    pub fn check_and_record(&self, id: &str, now: DateTime<Utc>) -> bool {
        let recorded = match self.recent.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if now - *entry.get() < self.window {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        };

        // evict walks every shard; the entry guard is gone by now
        if recorded {
            self.evict(now);
        }
        recorded
    }

    fn evict(&self, now: DateTime<Utc>) {
        let cutoff = self.window * 2;
        self.recent.retain(|_, emitted_at| now - *emitted_at <= cutoff);

        let overflow = self.recent.len().saturating_sub(self.max_entries);
        if overflow == 0 {
            return;
        }

        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .recent
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        by_age.sort_by_key(|(_, emitted_at)| *emitted_at);
        for (id, _) in by_age.into_iter().take(overflow) {
            self.recent.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn clear(&self) {
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_duplicate_within_window() {
        let dedup = SignalDeduplicator::new(Duration::seconds(300), 16);
        assert!(dedup.check_and_record("KXHIGHNY-26FEB24-T39", t0()));
        assert!(!dedup.check_and_record("KXHIGHNY-26FEB24-T39", t0() + Duration::seconds(120)));
        assert!(dedup.check_and_record("KXHIGHNY-26FEB24-T39", t0() + Duration::seconds(301)));
    }

    #[test]
    fn test_stale_entries_evicted() {
        let dedup = SignalDeduplicator::new(Duration::seconds(300), 16);
        dedup.record("A", t0());
        dedup.record("B", t0() + Duration::seconds(700));
        assert_eq!(dedup.len(), 1);
        assert!(!dedup.is_duplicate("A", t0() + Duration::seconds(700)));
    }

    #[test]
    fn test_capacity_bound_drops_oldest() {
        let dedup = SignalDeduplicator::new(Duration::seconds(300), 2);
        dedup.record("A", t0());
        dedup.record("B", t0() + Duration::seconds(1));
        dedup.record("C", t0() + Duration::seconds(2));

        assert_eq!(dedup.len(), 2);
        assert!(!dedup.is_duplicate("A", t0() + Duration::seconds(3)));
        assert!(dedup.is_duplicate("C", t0() + Duration::seconds(3)));
    }

    #[test]
    fn test_concurrent_callers_emit_once_per_window() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        const THREADS: usize = 8;
        const ROUNDS: usize = 500;

        let dedup = Arc::new(SignalDeduplicator::new(Duration::seconds(300), 4096));

        for round in 0..ROUNDS {
            let id = format!("KXHIGHNY-26FEB24-B{}.5", round);
            let barrier = Arc::new(Barrier::new(THREADS));

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let dedup = Arc::clone(&dedup);
                    let barrier = Arc::clone(&barrier);
                    let id = id.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        dedup.check_and_record(&id, t0())
                    })
                })
                .collect();

            let emitted = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|recorded| *recorded)
                .count();
            assert_eq!(emitted, 1, "{} recorded {} times in one window", id, emitted);
        }

        assert_eq!(dedup.len(), ROUNDS);
    }

    #[test]
    fn test_clear() {
        let dedup = SignalDeduplicator::new(Duration::seconds(300), 4);
        dedup.record("A", t0());
        dedup.clear();
        assert!(dedup.is_empty());
    }
}
