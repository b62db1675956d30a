//! A user-space TCP engine: reliable, in-order, flow-controlled byte streams on top of a network
//!  substrate that may lose, reorder and duplicate datagrams.
//!
//! ## Design goals
//!
//! * Everything is synchronous and event driven. There are no threads, no async runtime and no
//!   real clock - the driver calls `tick()` with the milliseconds elapsed since the previous
//!   call, and all timeouts are computed relative to that virtual clock. This keeps the engine
//!   deterministic and reproducible in tests.
//! * Memory is bounded: each direction of a connection holds at most its configured capacity,
//!   regardless of how adversarially segments are reordered.
//! * Flow control only: the sender honours the peer's advertised window, but there is no
//!   congestion control (slow start, congestion avoidance etc.)
//! * The engine produces and consumes [tcp::segment::TcpSegment]s. Framing them for a link,
//!   address resolution and routing are the business of whoever implements
//!   [tcp::segment_sink::SegmentSink].
//!
//! ## Structure
//!
//! Leaf to root:
//! * [tcp::wrapping_integers] - 32 bit wrap-around sequence numbers vs. 64 bit absolute indices
//! * [stream::byte_stream] - a bounded FIFO of bytes, the interface to the application
//! * [stream::stream_reassembler] - turns out-of-order substrings into a contiguous stream
//! * [tcp::sender] - segments outbound data, keeps track of outstanding segments, retransmits
//! * [tcp::receiver] - feeds inbound segments into the reassembler, computes ackno and window
//! * [tcp::connection] - combines sender and receiver into a full connection, handling
//!   handshake, shutdown, lingering, RST and timeouts
//!
//! ## Sequence space
//!
//! ```ascii
//!  element          SYN   c    a    t   FIN
//!  seqno            isn  +1   +2   +3   +4      (u32, wraps around)
//!  absolute seqno    0    1    2    3    4      (u64, starts at 0)
//!  stream index           0    1    2           (u64, payload bytes only)
//! ```

pub mod config;
pub mod stream;
pub mod tcp;
pub mod util;

#[cfg(test)]
mod test_util;
