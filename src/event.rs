// MORAT ACTION LOG
// RECORDS EVERY ACTUATION ATTEMPT ACROSS ALL DOMAINS.
// PRE-ALLOCATED RING BUFFER. WRAPS AROUND AT CAPACITY -- OLDEST ENTRIES OVERWRITTEN.
// SHARED BETWEEN LOOP THREADS BEHIND ONE MUTEX; EACH RECORD IS A SHORT CRITICAL SECTION.

use std::sync::{Arc, Mutex};

const MAX_RECORDS: usize = 4096;

#[derive(Clone, Debug, Default)]
pub struct ActionRecord {
    pub ts_ns: u64,
    pub domain: &'static str,
    pub subject: String,
    pub ok: bool,
}

pub struct ActionLog {
    records: Vec<ActionRecord>,
    head: usize,
    len: usize,
}

pub type SharedLog = Arc<Mutex<ActionLog>>;

pub fn shared() -> SharedLog {
    Arc::new(Mutex::new(ActionLog::new()))
}

// RECORD INTO A SHARED LOG. A POISONED LOCK STILL RECORDS.
pub fn record(log: &SharedLog, domain: &'static str, subject: impl Into<String>, ok: bool) {
    let mut guard = log.lock().unwrap_or_else(|e| e.into_inner());
    guard.record(domain, subject, ok);
}

impl ActionLog {
    pub fn new() -> Self {
        Self {
            records: vec![ActionRecord::default(); MAX_RECORDS],
            head: 0,
            len: 0,
        }
    }

    pub fn record(&mut self, domain: &'static str, subject: impl Into<String>, ok: bool) {
        self.records[self.head] = ActionRecord {
            ts_ns: now_ns(),
            domain,
            subject: subject.into(),
            ok,
        };
        self.head = (self.head + 1) % MAX_RECORDS;
        if self.len < MAX_RECORDS {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // ITERATE RECORDS IN CHRONOLOGICAL ORDER
    pub fn iter_chronological(&self) -> impl Iterator<Item = &ActionRecord> {
        let start = if self.len < MAX_RECORDS { 0 } else { self.head };
        (0..self.len).map(move |i| &self.records[(start + i) % MAX_RECORDS])
    }

    // (ATTEMPTS, FAILURES) FOR ONE DOMAIN
    pub fn counts(&self, domain: &str) -> (usize, usize) {
        self.iter_chronological()
            .filter(|r| r.domain == domain)
            .fold((0, 0), |(n, failed), r| (n + 1, failed + usize::from(!r.ok)))
    }

    // DUMP EVERY RECORD AFTER EXECUTION
    pub fn dump(&self) {
        let mut iter = self.iter_chronological();
        let first = match iter.next() {
            Some(r) => r,
            None => return,
        };
        let base_ts = first.ts_ns;

        println!("\n{:<10} {:<10} {:<6} {}", "TIME_S", "DOMAIN", "OK", "SUBJECT");
        println!("{}", "-".repeat(72));
        print_record(first, base_ts);
        for r in iter {
            print_record(r, base_ts);
        }

        if self.len == MAX_RECORDS {
            println!("\n(RING BUFFER WRAPPED -- SHOWING MOST RECENT {} ACTIONS)", MAX_RECORDS);
        }
        println!("TOTAL ACTIONS: {}", self.len);
    }

    // PER-DOMAIN SUMMARY
    pub fn summary(&self) {
        if self.len == 0 {
            println!("\nNO ACTIONS TAKEN");
            return;
        }

        let mut domains: Vec<&'static str> = self.iter_chronological().map(|r| r.domain).collect();
        domains.sort_unstable();
        domains.dedup();

        println!("\n{}", "=".repeat(50));
        println!("MORAT SUMMARY");
        println!("{}", "=".repeat(50));
        for domain in domains {
            let (attempts, failed) = self.counts(domain);
            println!("  {:<12} ACTIONS: {:<8} FAILED: {}", domain.to_uppercase(), attempts, failed);
        }
        println!("  RECORDS:     {}", self.len);
    }
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new()
    }
}

fn print_record(r: &ActionRecord, base_ts: u64) {
    let elapsed_s = r.ts_ns.saturating_sub(base_ts) as f64 / 1_000_000_000.0;
    println!(
        "{:<10.1} {:<10} {:<6} {}",
        elapsed_s,
        r.domain,
        if r.ok { "yes" } else { "NO" },
        r.subject
    );
}

fn now_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_stores_fields() {
        let mut log = ActionLog::new();
        assert!(log.is_empty());

        log.record("restorer", "cpu4 -> 2841600", true);
        assert_eq!(log.len(), 1);
        let r = log.iter_chronological().next().unwrap();
        assert_eq!(r.domain, "restorer");
        assert_eq!(r.subject, "cpu4 -> 2841600");
        assert!(r.ok);
        assert!(r.ts_ns > 0);
    }

    #[test]
    fn ring_buffer_wraps() {
        let mut log = ActionLog::new();

        for i in 0..MAX_RECORDS {
            log.record("balancer", format!("{}", i), true);
        }
        assert_eq!(log.len(), MAX_RECORDS);
        assert_eq!(log.head, 0);

        // ONE MORE -- OVERWRITES OLDEST
        log.record("balancer", "newest", false);
        assert_eq!(log.len(), MAX_RECORDS);
        assert_eq!(log.head, 1);

        let ordered: Vec<&str> = log.iter_chronological().map(|r| r.subject.as_str()).collect();
        assert_eq!(ordered[0], "1");
        assert_eq!(*ordered.last().unwrap(), "newest");
        assert_eq!(ordered.len(), MAX_RECORDS);
    }

    #[test]
    fn counts_per_domain() {
        let mut log = ActionLog::new();
        log.record("boost", "a", true);
        log.record("boost", "b", false);
        log.record("pinner", "c", true);
        assert_eq!(log.counts("boost"), (2, 1));
        assert_eq!(log.counts("pinner"), (1, 0));
        assert_eq!(log.counts("reclaim"), (0, 0));
    }

    #[test]
    fn shared_record_through_mutex() {
        let log = shared();
        record(&log, "reclaim", "drop_caches=3", true);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn summary_and_dump_no_panic_empty() {
        let log = ActionLog::new();
        log.summary();
        log.dump();
    }

    #[test]
    fn dump_no_panic() {
        let mut log = ActionLog::new();
        log.record("balancer", "irq 42 -> cpu1", true);
        log.record("balancer", "irq 43 -> cpu1", false);
        log.dump();
        log.summary();
    }
}
