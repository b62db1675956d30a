use std::cmp::{max, min};
use std::collections::BTreeMap;
use bytes::{Bytes, BytesMut};
use tracing::trace;
use crate::stream::byte_stream::ByteStream;
use crate::util::safe_converter::{PrecheckedCast, SafeCast, SaturatingCast};

/// Accepts substrings of a byte stream, tagged with the absolute index of their first byte,
///  in any order and possibly overlapping or duplicated, and writes the longest contiguous
///  prefix known so far to its output [ByteStream].
///
/// Memory is bounded by the output stream's capacity: bytes waiting in the reassembler plus
///  bytes waiting in the output stream never exceed it. Concretely, only bytes with an index in
///  `[first_unassembled, first_unassembled + output.remaining_capacity())` are stored, anything
///  beyond is dropped and must be re-sent by the peer. This gives lower-index data precedence for
///  the available room.
pub struct StreamReassembler {
    output: ByteStream,

    /// Substrings that can not be written to the output yet, keyed by absolute index. Entries
    ///  are disjoint and not adjacent (adjacent entries are merged), and they all start after
    ///  `next_expected_index`.
    pending: BTreeMap<u64, Bytes>,
    /// the sum of the lengths of all entries in `pending`
    unassembled: usize,

    /// the index of the next byte the output stream needs
    next_expected_index: u64,
    /// the index after the stream's last byte, once a substring flagged as 'eof' was seen
    end_index: Option<u64>,
}

impl StreamReassembler {
    pub fn new(capacity: usize) -> StreamReassembler {
        StreamReassembler {
            output: ByteStream::new(capacity),
            pending: BTreeMap::default(),
            unassembled: 0,
            next_expected_index: 0,
            end_index: None,
        }
    }

    /// Receive a substring starting at absolute stream index `index`. If `eof` is set, the last
    ///  byte of `data` is the last byte of the entire stream.
    pub fn push_substring(&mut self, data: &[u8], index: u64, eof: bool) {
        let data_end = end_of(index, data);

        if data_end < self.next_expected_index {
            trace!("substring [{}, {}) was delivered completely - ignoring", index, data_end);
            return;
        }

        if eof {
            self.end_index = Some(data_end);
        }

        // only bytes in the window of available capacity are stored
        let window_start = self.next_expected_index;
        let room: u64 = self.output.remaining_capacity().safe_cast();
        let window_end = window_start.saturating_add(room);

        let start = max(index, window_start);
        let end = min(data_end, window_end);
        if end < data_end {
            trace!("substring [{}, {}) exceeds available capacity - dropping [{}, {})", index, data_end, max(end, index), data_end);
        }

        if start < end {
            let offs: usize = (start - index).prechecked_cast();
            let len: usize = (end - start).prechecked_cast();
            self.insert_pending(start, &data[offs..offs + len]);
            self.assemble();
        }

        if let Some(end_index) = self.end_index {
            if self.next_expected_index >= end_index {
                self.output.end_input();
            }
        }
    }

    /// Merge a range into `pending`, coalescing it with all entries it overlaps or touches. Where
    ///  ranges overlap, the bytes that were stored before win.
    fn insert_pending(&mut self, start: u64, data: &[u8]) {
        let end = end_of(start, data);

        // entries are disjoint and ordered, so walking back from the last entry starting at or
        //  before `end` finds all neighbors, and the first one ending before `start` ends the search
        let neighbors = self.pending.range(..=end)
            .rev()
            .take_while(|(&s, d)| end_of(s, d) >= start)
            .map(|(&s, _)| s)
            .collect::<Vec<_>>();

        if neighbors.is_empty() {
            self.unassembled += data.len();
            self.pending.insert(start, Bytes::copy_from_slice(data));
            return;
        }

        let existing = neighbors.iter()
            .rev()
            .filter_map(|s| self.pending.remove(s).map(|d| (*s, d)))
            .collect::<Vec<_>>();

        let merged_start = min(start, existing[0].0);
        let merged_end = existing.iter()
            .map(|(s, d)| end_of(*s, d))
            .fold(end, max);

        let mut merged = BytesMut::zeroed((merged_end - merged_start).prechecked_cast());
        let offs: usize = (start - merged_start).prechecked_cast();
        merged[offs..offs + data.len()].copy_from_slice(data);

        for (s, d) in existing {
            self.unassembled -= d.len();
            let offs: usize = (s - merged_start).prechecked_cast();
            merged[offs..offs + d.len()].copy_from_slice(&d);
        }

        self.unassembled += merged.len();
        self.pending.insert(merged_start, merged.freeze());
    }

    /// write pending bytes to the output as long as they are contiguous with what was written before
    fn assemble(&mut self) {
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() > self.next_expected_index {
                break;
            }
            let (start, data) = entry.remove_entry();
            self.unassembled -= data.len();

            let skip: usize = (self.next_expected_index - start).saturating_cast();
            if skip >= data.len() {
                continue;
            }
            let data = data.slice(skip..);

            let written = self.output.write(&data);
            self.next_expected_index = end_of(self.next_expected_index, &data[..written]);

            if written < data.len() {
                // no more room in the output stream: keep the rest for later
                self.unassembled += data.len() - written;
                self.pending.insert(self.next_expected_index, data.slice(written..));
                break;
            }
        }
    }

    /// the number of bytes stored, but not yet written to the output
    pub fn unassembled_bytes(&self) -> usize {
        self.unassembled
    }

    /// true iff the output stream holds no buffered bytes. This does *not* mean that the stream
    ///  is complete.
    pub fn empty(&self) -> bool {
        self.output.buffer_empty()
    }

    /// the absolute index of the next byte the output stream needs
    pub fn first_unassembled(&self) -> u64 {
        self.next_expected_index
    }

    pub fn stream_out(&self) -> &ByteStream {
        &self.output
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }
}

/// the index just past a substring starting at `start`
fn end_of(start: u64, data: &[u8]) -> u64 {
    let len: u64 = data.len().safe_cast();
    start.saturating_add(len)
}
