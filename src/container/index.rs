//! Chunk index: logical chunk id -> ordinal append position.
//!
//! Concurrent reads must never observe a partial insert; callers publish an
//! entry only after the payload bytes are durable (flushed, if configured).
//! Writes are assumed serialized by the caller (a single writer per
//! partfile) so `insert_next` need not itself be a compare-and-swap: the
//! duplicate check and the ordinal assignment happen under whatever
//! external synchronization the writer already holds.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

/// Returned by [`ChunkIndex::insert_next`] when `chunk_id` is already present.
#[derive(Debug)]
pub struct DuplicateChunk;

#[derive(Default)]
pub struct ChunkIndex {
    by_id: DashMap<u64, u64>,
    cur_chunk_pos: AtomicI64,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            cur_chunk_pos: AtomicI64::new(-1),
        }
    }

    pub fn contains(&self, chunk_id: u64) -> bool {
        self.by_id.contains_key(&chunk_id)
    }

    pub fn get(&self, chunk_id: u64) -> Option<u64> {
        self.by_id.get(&chunk_id).map(|v| *v)
    }

    pub fn cur_chunk_pos(&self) -> i64 {
        self.cur_chunk_pos.load(Ordering::Acquire)
    }

    pub fn chunks_written(&self) -> u64 {
        let cur = self.cur_chunk_pos();
        if cur < 0 { 0 } else { cur as u64 + 1 }
    }

    /// Assigns the next ordinal to `chunk_id` and publishes it.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateChunk`] if `chunk_id` is already indexed; the
    /// index is left unchanged.
    pub fn insert_next(&self, chunk_id: u64) -> Result<u64, DuplicateChunk> {
        if self.by_id.contains_key(&chunk_id) {
            return Err(DuplicateChunk);
        }
        let ordinal = (self.cur_chunk_pos.load(Ordering::Acquire) + 1) as u64;
        self.by_id.insert(chunk_id, ordinal);
        self.cur_chunk_pos.store(ordinal as i64, Ordering::Release);
        Ok(ordinal)
    }

    pub fn snapshot(&self) -> Vec<(u64, u64)> {
        self.by_id.iter().map(|e| (*e.key(), *e.value())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_sequential_ordinals() {
        let idx = ChunkIndex::new();
        assert_eq!(idx.insert_next(5).unwrap(), 0);
        assert_eq!(idx.insert_next(2).unwrap(), 1);
        assert_eq!(idx.chunks_written(), 2);
        assert_eq!(idx.get(5), Some(0));
        assert_eq!(idx.get(2), Some(1));
    }

    #[test]
    fn rejects_duplicate_without_mutating() {
        let idx = ChunkIndex::new();
        idx.insert_next(0).unwrap();
        assert!(idx.insert_next(0).is_err());
        assert_eq!(idx.chunks_written(), 1);
    }
}
