//! Session resumption cache ("scoreboard"), grounded in
//! `original_source/cryptlib/session/scorebrd.c`'s `handleScoreboard`.
//!
//! A single mutex-protected, fixed-capacity table. Every lookup/insert pass
//! does a linear scan that simultaneously: evicts entries older than
//! [`ENTRY_TIMEOUT`], remembers the first free slot it passes, and remembers
//! the oldest non-fixed slot it passes (so an insert into a full table can
//! evict the least-recently-added entry rather than failing). Matching is
//! two-stage: a cheap checksum compare first, then a full SHA-1 compare of
//! the session ID only on checksum hits, to avoid hashing on every probe.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crypto_core::{Backend, HashAlgorithm};

/// How long a resumable session stays in the cache (`scorebrd.c`'s
/// `SCOREBOARD_TIMEOUT`, 3600 seconds).
pub const ENTRY_TIMEOUT: Duration = Duration::from_secs(3600);

/// Cheap additive checksum over a session ID, used to skip the SHA-1
/// compare on the common case of a non-matching slot (`checksumData` in
/// the original).
fn checksum(data: &[u8]) -> i64 {
    data.iter().fold(0i64, |acc, &b| acc.wrapping_add(b as i64))
}

struct Entry {
    check_value: i64,
    hash_value: [u8; 20],
    inserted_at: Instant,
    unique_id: u64,
    /// Manually preloaded entry, exempt from LRU eviction preference
    /// (`fixedEntry` in the original).
    fixed: bool,
    master_secret: Vec<u8>,
}

struct Inner {
    entries: Vec<Option<Entry>>,
    next_unique_id: u64,
}

/// The process-wide session cache. One instance is shared (behind an
/// `Arc`) across every connection a process handles.
pub struct Scoreboard {
    backend: std::sync::Arc<dyn Backend>,
    inner: Mutex<Inner>,
}

/// What a successful lookup hands back: the cached master secret and the
/// unique ID the entry was stored under.
pub struct CachedSession {
    pub master_secret: Vec<u8>,
    pub unique_id: u64,
}

impl Scoreboard {
    pub fn new(backend: std::sync::Arc<dyn Backend>, capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Scoreboard {
            backend,
            inner: Mutex::new(Inner { entries, next_unique_id: 1 }),
        }
    }

    fn hash_session_id(&self, session_id: &[u8]) -> crate::error::Result<[u8; 20]> {
        let mut ctx = self.backend.hash(HashAlgorithm::Sha1)?;
        ctx.update(session_id);
        let digest = ctx.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest);
        Ok(out)
    }

    /// Looks up `session_id`, evicting any timed-out entries encountered
    /// along the way. Returns `None` on a miss or an expired match.
    pub fn lookup(&self, session_id: &[u8]) -> crate::error::Result<Option<CachedSession>> {
        let check_value = checksum(session_id);
        let hash_value = self.hash_session_id(session_id)?;
        let now = Instant::now();

        let mut inner = self.inner.lock().expect("scoreboard mutex poisoned");
        for slot in inner.entries.iter_mut() {
            let expired = matches!(slot, Some(e) if !e.fixed && now.duration_since(e.inserted_at) > ENTRY_TIMEOUT);
            if expired {
                *slot = None;
                continue;
            }
            if let Some(entry) = slot {
                if entry.check_value == check_value && entry.hash_value == hash_value {
                    return Ok(Some(CachedSession {
                        master_secret: entry.master_secret.clone(),
                        unique_id: entry.unique_id,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Inserts a resumable session, evicting a timed-out slot, the first
    /// free slot, or (if the table is full of live non-fixed entries) the
    /// oldest non-fixed entry, in that order of preference. Returns the
    /// unique ID assigned to the new entry.
    pub fn insert(&self, session_id: &[u8], master_secret: Vec<u8>, fixed: bool) -> crate::error::Result<u64> {
        let check_value = checksum(session_id);
        let hash_value = self.hash_session_id(session_id)?;
        let now = Instant::now();

        let mut inner = self.inner.lock().expect("scoreboard mutex poisoned");
        let unique_id = inner.next_unique_id;
        inner.next_unique_id += 1;

        let mut free_slot: Option<usize> = None;
        let mut oldest_slot: Option<usize> = None;
        let mut oldest_time = now;

        for (i, slot) in inner.entries.iter_mut().enumerate() {
            let expired = matches!(slot, Some(e) if !e.fixed && now.duration_since(e.inserted_at) > ENTRY_TIMEOUT);
            if expired {
                *slot = None;
            }
            match slot {
                None => {
                    if free_slot.is_none() {
                        free_slot = Some(i);
                    }
                }
                Some(e) if !e.fixed => {
                    if oldest_slot.is_none() || e.inserted_at < oldest_time {
                        oldest_time = e.inserted_at;
                        oldest_slot = Some(i);
                    }
                }
                Some(_) => {}
            }
        }

        let target = free_slot.or(oldest_slot);
        let entry = Entry { check_value, hash_value, inserted_at: now, unique_id, fixed, master_secret };
        match target {
            Some(i) => inner.entries[i] = Some(entry),
            None => return Err(crate::error::Error::HandshakeFailure("session cache full".into())),
        }
        Ok(unique_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_core::SoftwareBackend;
    use std::sync::Arc;

    fn backend() -> Arc<dyn Backend> {
        Arc::new(SoftwareBackend)
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let board = Scoreboard::new(backend(), 4);
        let id = b"session-id-0123456789";
        board.insert(id, vec![0x11; 48], false).unwrap();
        let found = board.lookup(id).unwrap().expect("should be present");
        assert_eq!(found.master_secret, vec![0x11; 48]);
    }

    #[test]
    fn lookup_miss_returns_none() {
        let board = Scoreboard::new(backend(), 4);
        assert!(board.lookup(b"never-inserted-session-id").unwrap().is_none());
    }

    #[test]
    fn unique_ids_increase_monotonically() {
        let board = Scoreboard::new(backend(), 4);
        let a = board.insert(b"session-one-aaaaaaaaaaaa", vec![0; 48], false).unwrap();
        let b = board.insert(b"session-two-bbbbbbbbbbbb", vec![0; 48], false).unwrap();
        assert!(b > a);
    }

    #[test]
    fn full_table_evicts_oldest_non_fixed_entry() {
        let board = Scoreboard::new(backend(), 2);
        board.insert(b"session-a-aaaaaaaaaaaaaaa", vec![1; 48], false).unwrap();
        board.insert(b"session-b-bbbbbbbbbbbbbbb", vec![2; 48], false).unwrap();
        board.insert(b"session-c-ccccccccccccccc", vec![3; 48], false).unwrap();
        assert!(board.lookup(b"session-c-ccccccccccccccc").unwrap().is_some());
    }

    #[test]
    fn fixed_entry_survives_eviction_pressure() {
        let board = Scoreboard::new(backend(), 2);
        board.insert(b"fixed-session-aaaaaaaaaaa", vec![9; 48], true).unwrap();
        board.insert(b"session-b-bbbbbbbbbbbbbbb", vec![2; 48], false).unwrap();
        board.insert(b"session-c-ccccccccccccccc", vec![3; 48], false).unwrap();
        assert!(board.lookup(b"fixed-session-aaaaaaaaaaa").unwrap().is_some());
    }
}
