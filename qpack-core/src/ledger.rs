//! Blocking and acknowledgment bookkeeping.
//!
//! The encoder records every field section that references the dynamic table
//! until the peer acknowledges or cancels it. From those records it derives:
//! - the Known Received Count (entries the peer is known to have)
//! - which streams are blocked (reference entries beyond that count)
//! - the oldest entry still referenced, which must not be evicted
//!
//! The decoder only needs the set of streams waiting for insertions.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A field section that references the dynamic table and has not been
/// acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBlockRef {
    /// Largest referenced absolute index + 1 (the Required Insert Count).
    pub max_cnt: u64,
    /// Smallest referenced absolute index + 1.
    pub min_cnt: u64,
    id: u64,
}

#[derive(Debug, Default)]
struct StreamRecord {
    refs: VecDeque<HeaderBlockRef>,
    max_cnt: u64,
}

/// Encoder side ledger of unacknowledged field sections.
#[derive(Debug, Default)]
pub struct AckLedger {
    streams: HashMap<u64, StreamRecord>,
    /// (min_cnt, ref id) of every outstanding reference.
    min_cnts: BTreeSet<(u64, u64)>,
    /// (stream max_cnt, stream id) of every stream beyond the known count.
    blocked: BTreeSet<(u64, u64)>,
    known_received_count: u64,
    next_ref_id: u64,
}

impl AckLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_received_count(&self) -> u64 {
        self.known_received_count
    }

    /// Number of streams with an outstanding section the peer may not be
    /// able to decode yet.
    pub fn num_blocked(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_blocked(&self, stream_id: u64) -> bool {
        self.streams
            .get(&stream_id)
            .is_some_and(|s| s.max_cnt > self.known_received_count)
    }

    /// Smallest `min_cnt` over all outstanding references.
    pub fn min_cnt(&self) -> Option<u64> {
        self.min_cnts.first().map(|&(cnt, _)| cnt)
    }

    /// Number of streams with outstanding references.
    pub fn num_streams(&self) -> usize {
        self.streams.len()
    }

    /// Outstanding references of a stream, oldest first.
    pub fn stream_refs(&self, stream_id: u64) -> impl Iterator<Item = &HeaderBlockRef> + '_ {
        self.streams
            .get(&stream_id)
            .into_iter()
            .flat_map(|s| s.refs.iter())
    }

    /// Largest `max_cnt` over a stream's outstanding references.
    pub fn stream_max_cnt(&self, stream_id: u64) -> Option<u64> {
        self.streams.get(&stream_id).map(|s| s.max_cnt)
    }

    /// Records a field section sent on `stream_id`.
    pub fn track(&mut self, stream_id: u64, max_cnt: u64, min_cnt: u64) {
        debug_assert!(min_cnt > 0 && min_cnt <= max_cnt);

        let id = self.next_ref_id;
        self.next_ref_id += 1;

        let record = self.streams.entry(stream_id).or_default();
        let old_max = record.max_cnt;
        record.refs.push_back(HeaderBlockRef {
            max_cnt,
            min_cnt,
            id,
        });
        record.max_cnt = old_max.max(max_cnt);
        let new_max = record.max_cnt;

        self.min_cnts.insert((min_cnt, id));

        if new_max != old_max {
            self.blocked.remove(&(old_max, stream_id));
            if new_max > self.known_received_count {
                debug!(stream_id, max_cnt = new_max, "stream blocked");
                self.blocked.insert((new_max, stream_id));
            }
        }
    }

    /// Handles a Section Acknowledgment for the oldest outstanding section
    /// of `stream_id`.
    pub fn acknowledge(&mut self, stream_id: u64) -> Result<HeaderBlockRef> {
        let Some(record) = self.streams.get_mut(&stream_id) else {
            warn!(stream_id, "section acknowledgment for unknown stream");
            return Err(Error::DecoderStreamError(format!(
                "section acknowledgment for stream {} with no outstanding section",
                stream_id
            )));
        };

        let Some(acked) = record.refs.pop_front() else {
            warn!(stream_id, "section acknowledgment for unknown stream");
            return Err(Error::DecoderStreamError(format!(
                "section acknowledgment for stream {} with no outstanding section",
                stream_id
            )));
        };

        let old_max = record.max_cnt;
        let remaining = record.refs.iter().map(|r| r.max_cnt).max();

        match remaining {
            Some(new_max) => record.max_cnt = new_max,
            None => {
                self.streams.remove(&stream_id);
            }
        }

        self.min_cnts.remove(&(acked.min_cnt, acked.id));
        self.blocked.remove(&(old_max, stream_id));
        if let Some(new_max) = remaining {
            if new_max > self.known_received_count {
                self.blocked.insert((new_max, stream_id));
            }
        }

        debug!(stream_id, max_cnt = acked.max_cnt, "section acknowledged");

        if acked.max_cnt > self.known_received_count {
            self.raise_known_received_count(acked.max_cnt);
        }

        Ok(acked)
    }

    /// Drops every outstanding section of `stream_id`.
    ///
    /// The known received count does not move: the peer may have abandoned
    /// the sections without processing the inserts they depended on.
    pub fn cancel(&mut self, stream_id: u64) -> bool {
        let Some(record) = self.streams.remove(&stream_id) else {
            return false;
        };

        for r in &record.refs {
            self.min_cnts.remove(&(r.min_cnt, r.id));
        }
        self.blocked.remove(&(record.max_cnt, stream_id));

        debug!(stream_id, sections = record.refs.len(), "stream cancelled");
        true
    }

    /// Handles an Insert Count Increment.
    pub fn increment(&mut self, increment: u64, insert_count: u64) -> Result<()> {
        let outstanding = insert_count - self.known_received_count;
        if increment == 0 || increment > outstanding {
            warn!(increment, outstanding, "invalid insert count increment");
            return Err(Error::DecoderStreamError(format!(
                "insert count increment {} with {} unacknowledged insertions",
                increment, outstanding
            )));
        }

        self.raise_known_received_count(self.known_received_count + increment);
        Ok(())
    }

    fn raise_known_received_count(&mut self, count: u64) {
        debug_assert!(count > self.known_received_count);
        self.known_received_count = count;

        while let Some(&(max_cnt, stream_id)) = self.blocked.first() {
            if max_cnt > count {
                break;
            }
            self.blocked.pop_first();
            debug!(stream_id, known_received_count = count, "stream unblocked");
        }
    }
}

/// Decoder side set of streams waiting for insertions.
#[derive(Debug, Default)]
pub struct BlockedStreams {
    /// (required insert count, stream id)
    by_count: BTreeSet<(u64, u64)>,
    by_stream: HashMap<u64, u64>,
}

impl BlockedStreams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_stream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_stream.is_empty()
    }

    pub fn contains(&self, stream_id: u64) -> bool {
        self.by_stream.contains_key(&stream_id)
    }

    pub fn insert(&mut self, stream_id: u64, required_insert_count: u64) {
        if let Some(old) = self.by_stream.insert(stream_id, required_insert_count) {
            self.by_count.remove(&(old, stream_id));
        }
        self.by_count.insert((required_insert_count, stream_id));
    }

    pub fn remove(&mut self, stream_id: u64) -> bool {
        match self.by_stream.remove(&stream_id) {
            Some(ric) => {
                self.by_count.remove(&(ric, stream_id));
                true
            }
            None => false,
        }
    }

    /// Blocked streams whose required insert count is now satisfied.
    pub fn ready(&self, insert_count: u64) -> impl Iterator<Item = u64> + '_ {
        self.by_count
            .iter()
            .take_while(move |&&(ric, _)| ric <= insert_count)
            .map(|&(_, stream_id)| stream_id)
    }
}
