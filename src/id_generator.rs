use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of internal account ids.
pub trait IdGenerator: Send + Sync {
    /// Returns a unique, roughly time-ordered id.
    fn next_id(&self) -> i64;
}

/// Snowflake-layout generator.
///
/// Id layout (63 usable bits):
/// - 41 bits: milliseconds since `EPOCH_MILLIS`
/// - 5 bits: node id (0-31)
/// - 12 bits: per-millisecond sequence (4096 ids/ms/node)
pub struct SnowflakeIdGenerator {
    /// Last issued timestamp (high 48 bits) and sequence (low 16 bits).
    ts_and_seq: AtomicU64,
    node_id: u8,
}

impl SnowflakeIdGenerator {
    /// 2024-01-01T00:00:00Z
    pub const EPOCH_MILLIS: i64 = 1_704_067_200_000;
    const NODE_ID_BITS: u8 = 5;
    const SEQUENCE_BITS: u8 = 12;
    const MAX_NODE_ID: u8 = (1 << Self::NODE_ID_BITS) - 1;
    const MAX_SEQUENCE: u64 = (1 << Self::SEQUENCE_BITS) - 1;

    /// Node ids above 31 are masked into range.
    pub fn new(node_id: u8) -> Self {
        Self {
            ts_and_seq: AtomicU64::new(0),
            node_id: node_id & Self::MAX_NODE_ID,
        }
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    /// Unix milliseconds at which `id` was generated.
    pub fn extract_timestamp(id: i64) -> i64 {
        (id >> (Self::NODE_ID_BITS + Self::SEQUENCE_BITS)) + Self::EPOCH_MILLIS
    }

    pub fn extract_node_id(id: i64) -> u8 {
        ((id >> Self::SEQUENCE_BITS) & i64::from(Self::MAX_NODE_ID)) as u8
    }

    fn current_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

impl IdGenerator for SnowflakeIdGenerator {
    fn next_id(&self) -> i64 {
        loop {
            let now = Self::current_millis();
            let current = self.ts_and_seq.load(Ordering::Acquire);
            let last_ts = (current >> 16) as i64;
            let last_seq = current & 0xFFFF;

            // Clock went backwards: keep issuing from the last timestamp so ids stay unique.
            let ts = now.max(last_ts);
            let seq = if ts == last_ts { last_seq + 1 } else { 0 };
            if seq > Self::MAX_SEQUENCE {
                std::hint::spin_loop();
                continue;
            }

            let next = ((ts as u64) << 16) | seq;
            if self
                .ts_and_seq
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return ((ts - Self::EPOCH_MILLIS) << (Self::NODE_ID_BITS + Self::SEQUENCE_BITS))
                    | (i64::from(self.node_id) << Self::SEQUENCE_BITS)
                    | seq as i64;
            }
        }
    }
}
