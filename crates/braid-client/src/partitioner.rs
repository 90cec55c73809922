//! Partition selection.
//!
//! A [`Partitioner`] holds a topic's full partition list, captured when the
//! topic was first resolved. Each top-level produce call derives a fresh
//! [`Selection`] from it: the exclusion set is call-local, so concurrent
//! producers on the same topic never interfere with each other's retry
//! sequences.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;

use crate::error::{Error, Result};

/// Immutable per-topic partition list.
#[derive(Debug, Clone)]
pub struct Partitioner {
    partitions: Arc<[i32]>,
}

impl Partitioner {
    pub fn new(partitions: Vec<i32>) -> Self {
        Self {
            partitions: partitions.into(),
        }
    }

    /// Total partitions for the topic — the worst-case retry bound.
    pub fn count(&self) -> usize {
        self.partitions.len()
    }

    /// Begin a selection sequence with an empty exclusion set.
    pub fn selection(&self) -> Selection {
        Selection {
            partitions: Arc::clone(&self.partitions),
            excluded: HashSet::new(),
        }
    }
}

/// One selection sequence: the shared partition list plus the partitions
/// skipped so far in this sequence.
#[derive(Debug)]
pub struct Selection {
    partitions: Arc<[i32]>,
    excluded: HashSet<i32>,
}

impl Selection {
    /// Total partitions, excluded or not.
    pub fn count(&self) -> usize {
        self.partitions.len()
    }

    /// Pick a partition among those not yet excluded. A non-empty key
    /// hashes deterministically (stable for the same key while the
    /// exclusion set is unchanged); no key picks uniformly at random.
    pub fn pick(&self, key: Option<&[u8]>) -> Result<i32> {
        let candidates: Vec<i32> = self
            .partitions
            .iter()
            .copied()
            .filter(|p| !self.excluded.contains(p))
            .collect();
        if candidates.is_empty() {
            return Err(Error::NoValidPartition);
        }
        match key {
            Some(key) if !key.is_empty() => {
                let index = (murmur2(key) & 0x7fffffff) as usize % candidates.len();
                Ok(candidates[index])
            }
            _ => Ok(candidates[rand::thread_rng().gen_range(0..candidates.len())]),
        }
    }

    /// Exclude a partition for the remainder of this sequence.
    pub fn skip(&mut self, partition: i32) {
        self.excluded.insert(partition);
    }
}

/// Kafka-compatible murmur2 hash.
///
/// Produces a 32-bit unsigned hash matching the Kafka Java client's
/// `Utils.murmur2()` (seed 0x9747b28c and identical mixing constants), so
/// keyed records land on the same partitions as other clients' would.
pub fn murmur2(data: &[u8]) -> u32 {
    const SEED: u32 = 0x9747b28c;
    const M: u32 = 0x5bd1e995;
    const R: u32 = 24;

    let len = data.len();
    let mut h: u32 = SEED ^ (len as u32);

    let mut i = 0;
    while i + 4 <= len {
        let mut k = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
        i += 4;
    }

    let remainder = len - i;
    if remainder >= 3 {
        h ^= (data[i + 2] as u32) << 16;
    }
    if remainder >= 2 {
        h ^= (data[i + 1] as u32) << 8;
    }
    if remainder >= 1 {
        h ^= data[i] as u32;
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;

    h
}
