// Tool-call deduplication table
//
// Records which tool-call IDs are executing, have completed or have failed so
// the bridge never runs the same call twice. Finished entries expire after a
// TTL and the table is capped; eviction runs on every access. Evicted IDs are
// kept until `take_evicted` so callers can drop their own per-call state.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_DEDUP_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStatus {
    InFlight,
    Done,
    /// Does not block a retry; kept only so the failure ages out with the rest
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    status: EntryStatus,
    at: Instant,
    seq: u64,
}

#[derive(Debug)]
pub struct DedupTable {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<String, Entry>,
    evicted: Vec<String>,
    seq: u64,
}

impl Default for DedupTable {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_TTL, DEFAULT_DEDUP_CAPACITY)
    }
}

impl DedupTable {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            evicted: Vec::new(),
            seq: 0,
        }
    }

    fn record(&mut self, id: &str, status: EntryStatus) {
        self.seq += 1;
        self.entries.insert(
            id.to_string(),
            Entry {
                status,
                at: Instant::now(),
                seq: self.seq,
            },
        );
    }

    /// Claim an ID for execution. Returns false if it is executing or was
    /// completed within the TTL.
    pub fn try_begin(&mut self, id: &str) -> bool {
        self.evict();
        if self.contains(id) {
            return false;
        }
        self.record(id, EntryStatus::InFlight);
        true
    }

    /// Mark a claimed ID as completed; it stays blocked until the TTL passes
    pub fn complete(&mut self, id: &str) {
        self.record(id, EntryStatus::Done);
        self.evict();
    }

    /// Release a claimed ID after a failure so it can be retried
    pub fn fail(&mut self, id: &str) {
        self.record(id, EntryStatus::Failed);
        self.evict();
    }

    /// Drop expired entries now
    pub fn sweep(&mut self) {
        self.evict();
    }

    /// IDs evicted since the last call that are no longer tracked
    pub fn take_evicted(&mut self) -> Vec<String> {
        let mut evicted = std::mem::take(&mut self.evicted);
        evicted.retain(|id| !self.entries.contains_key(id));
        evicted.sort();
        evicted.dedup();
        evicted
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.entries
            .get(id)
            .is_some_and(|e| e.status == EntryStatus::InFlight)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|e| match e.status {
            EntryStatus::InFlight => true,
            EntryStatus::Done => e.at.elapsed() < self.ttl,
            EntryStatus::Failed => false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self) {
        let ttl = self.ttl;
        let evicted = &mut self.evicted;
        self.entries.retain(|id, e| {
            let keep = e.status == EntryStatus::InFlight || e.at.elapsed() < ttl;
            if !keep {
                evicted.push(id.clone());
            }
            keep
        });

        if self.entries.len() <= self.capacity {
            return;
        }
        // Over capacity: drop the oldest finished entries. In-flight entries
        // are never evicted.
        let mut finished: Vec<(String, u64)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.status != EntryStatus::InFlight)
            .map(|(id, e)| (id.clone(), e.seq))
            .collect();
        finished.sort_by_key(|(_, seq)| *seq);
        let excess = self.entries.len() - self.capacity;
        for (id, _) in finished.into_iter().take(excess) {
            self.entries.remove(&id);
            self.evicted.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_and_completed_are_blocked() {
        let mut table = DedupTable::default();
        assert!(table.try_begin("c1"));
        assert!(table.is_in_flight("c1"));
        assert!(!table.try_begin("c1"));

        table.complete("c1");
        assert!(!table.is_in_flight("c1"));
        assert!(!table.try_begin("c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_id_can_retry() {
        let mut table = DedupTable::default();
        assert!(table.try_begin("c1"));
        table.fail("c1");
        assert!(!table.contains("c1"));
        assert!(table.try_begin("c1"));
        assert!(table.is_in_flight("c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_entries_expire() {
        let mut table = DedupTable::new(Duration::from_secs(60), 16);
        assert!(table.try_begin("c1"));
        table.complete("c1");

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!table.try_begin("c1"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(table.try_begin("c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_never_expires() {
        let mut table = DedupTable::new(Duration::from_secs(1), 16);
        assert!(table.try_begin("c1"));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!table.try_begin("c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest_completed() {
        let mut table = DedupTable::new(Duration::from_secs(60), 2);
        for id in ["a", "b", "c"] {
            assert!(table.try_begin(id));
            table.complete(id);
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(table.len(), 2);
        assert!(!table.contains("a"));
        assert!(table.contains("c"));
        assert_eq!(table.take_evicted(), vec!["a".to_string()]);
        assert!(table.take_evicted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_ids_are_reported_once() {
        let mut table = DedupTable::new(Duration::from_secs(60), 16);
        assert!(table.try_begin("ok"));
        table.complete("ok");
        assert!(table.try_begin("bad"));
        table.fail("bad");
        assert!(table.try_begin("running"));

        tokio::time::advance(Duration::from_secs(61)).await;
        table.sweep();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.take_evicted(),
            vec!["bad".to_string(), "ok".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reclaimed_id_is_not_reported_evicted() {
        let mut table = DedupTable::new(Duration::from_secs(1), 16);
        assert!(table.try_begin("c1"));
        table.complete("c1");
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(table.try_begin("c1"));
        assert!(table.take_evicted().is_empty());
    }
}
