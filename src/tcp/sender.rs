use std::cmp::{max, min};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};
use crate::config::TcpConfig;
use crate::stream::byte_stream::ByteStream;
use crate::tcp::retransmission_timer::RetransmissionTimer;
use crate::tcp::segment::{TcpFlags, TcpSegment};
use crate::tcp::wrapping_integers::WrappingInt32;
use crate::util::safe_converter::{SafeCast, SaturatingCast};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SenderState {
    /// nothing sent yet
    Closed,
    /// SYN sent, but not acknowledged
    SynSent,
    /// the stream is ongoing
    SynAcked,
    /// FIN sent, but not acknowledged
    FinSent,
    /// everything including FIN is acknowledged
    FinAcked,
    /// the connection was aborted
    Error,
}

/// The outbound half of a connection: it reads bytes that the application wrote to its input
///  stream, packages them into segments within the peer's advertised window, and keeps every
///  segment around until the peer acknowledges it completely, retransmitting the earliest one
///  when the retransmission timer expires.
///
/// The sender only queues segments. Filling in the ackno and window fields is the connection's
///  job, since that information comes from the receiver.
pub struct TcpSender {
    config: Arc<TcpConfig>,
    isn: WrappingInt32,
    stream: ByteStream,
    segments_out: VecDeque<TcpSegment>,

    /// absolute seqno of the next byte to be sent
    next_seqno: u64,
    /// absolute ackno: everything before it is acknowledged by the peer
    acked: u64,
    /// The window the peer advertised most recently. This starts out at 1 so there is room for
    ///  the SYN.
    window_size: u16,

    /// segments that occupy sequence space and are not fully acknowledged yet, keyed by
    ///  absolute seqno
    outstanding: BTreeMap<u64, TcpSegment>,

    timer: RetransmissionTimer,
    consecutive_retransmissions: u32,

    syn_sent: bool,
    fin_sent: bool,
}

impl TcpSender {
    pub fn new(config: Arc<TcpConfig>) -> TcpSender {
        let isn = config.fixed_isn
            .unwrap_or_else(|| WrappingInt32::new(rand::random()));

        TcpSender {
            isn,
            stream: ByteStream::new(config.send_capacity),
            segments_out: VecDeque::new(),
            next_seqno: 0,
            acked: 0,
            window_size: 1,
            outstanding: BTreeMap::default(),
            timer: RetransmissionTimer::new(config.rt_timeout_ms()),
            consecutive_retransmissions: 0,
            syn_sent: false,
            fin_sent: false,
            config,
        }
    }

    /// Create and queue as many segments as the peer's window allows and there is data for. A
    ///  window of 0 is treated as 1: this sends a single probe byte, provoking the peer to
    ///  advertise its window again once it has room.
    pub fn fill_window(&mut self) {
        if self.stream.error() {
            trace!("fill_window: stream is in error state - not sending anything");
            return;
        }

        let window: u64 = max(self.window_size, 1).safe_cast();

        while !self.fin_sent {
            let in_flight = self.bytes_in_flight();
            if in_flight >= window {
                break;
            }
            let mut room = window - in_flight;

            let mut flags = TcpFlags::empty();
            if !self.syn_sent {
                flags |= TcpFlags::SYN;
                room -= 1;
            }

            let room_for_payload: usize = room.saturating_cast();
            let payload = self.stream.read_available(min(room_for_payload, self.config.max_payload_size));
            let payload_len: u64 = payload.len().safe_cast();
            room -= payload_len;

            if self.stream.eof() && room > 0 {
                flags |= TcpFlags::FIN;
            }

            let segment = TcpSegment::new(self.next_seqno(), flags, payload);
            let len = segment.length_in_sequence_space();
            if len == 0 {
                break;
            }

            trace!("sending segment at #{} with {} bytes of payload, flags {:?}", self.next_seqno, segment.payload.len(), flags);

            self.syn_sent |= flags.contains(TcpFlags::SYN);
            self.fin_sent |= flags.contains(TcpFlags::FIN);

            self.outstanding.insert(self.next_seqno, segment.clone());
            self.segments_out.push_back(segment);
            self.next_seqno += len;

            if !self.timer.is_running() {
                self.timer.start();
            }
        }
    }

    /// Process an acknowledgement and window advertisement from the peer.
    pub fn ack_received(&mut self, ackno: WrappingInt32, window_size: u16) {
        let absolute_ackno = ackno.unwrap(self.isn, self.next_seqno);
        if absolute_ackno > self.next_seqno {
            debug!("received ackno #{} for data that was not sent yet (next seqno is #{}) - ignoring", absolute_ackno, self.next_seqno);
            return;
        }

        if absolute_ackno > self.acked {
            if self.acked != 0 {
                self.timer.reset(self.config.rt_timeout_ms());
                self.consecutive_retransmissions = 0;
            }
            self.acked = absolute_ackno;
        }
        self.window_size = window_size;

        let acked = self.acked;
        self.outstanding.retain(|&seqno, segment| seqno + segment.length_in_sequence_space() > acked);

        if self.outstanding.is_empty() {
            self.timer.stop();
        }
        else if !self.timer.is_running() {
            self.timer.start();
        }

        if self.window_size > 0 {
            self.fill_window();
        }
    }

    /// Advance the retransmission timer. If it expires, the earliest outstanding segment is
    ///  retransmitted.
    pub fn tick(&mut self, elapsed_ms: u64) {
        if !self.timer.tick(elapsed_ms) {
            return;
        }

        if let Some((&seqno, segment)) = self.outstanding.first_key_value() {
            debug!("retransmission timeout after {} ms - resending segment #{}", self.timer.rto_ms(), seqno);
            self.segments_out.push_back(segment.clone());

            // a zero window is the peer being busy, not a sign of congestion
            if self.window_size > 0 {
                self.consecutive_retransmissions += 1;
                self.timer.double_rto();
            }
            self.timer.start();
        }
        else {
            self.timer.stop();
        }
    }

    /// queue a segment that occupies no sequence space, e.g. to carry an ACK
    pub fn send_empty_segment(&mut self) {
        self.segments_out.push_back(TcpSegment::new(self.next_seqno(), TcpFlags::empty(), Default::default()));
    }

    pub fn consecutive_retransmissions(&self) -> u32 {
        self.consecutive_retransmissions
    }

    /// the number of sequence numbers sent but not yet acknowledged
    pub fn bytes_in_flight(&self) -> u64 {
        self.next_seqno - self.acked
    }

    pub fn next_seqno_absolute(&self) -> u64 {
        self.next_seqno
    }

    pub fn next_seqno(&self) -> WrappingInt32 {
        WrappingInt32::wrap(self.next_seqno, self.isn)
    }

    pub fn isn(&self) -> WrappingInt32 {
        self.isn
    }

    pub fn state(&self) -> SenderState {
        if self.stream.error() {
            SenderState::Error
        }
        else if !self.syn_sent {
            SenderState::Closed
        }
        else if self.acked == 0 {
            SenderState::SynSent
        }
        else if !self.fin_sent {
            SenderState::SynAcked
        }
        else if self.bytes_in_flight() > 0 {
            SenderState::FinSent
        }
        else {
            SenderState::FinAcked
        }
    }

    pub fn stream_in(&self) -> &ByteStream {
        &self.stream
    }

    pub fn stream_in_mut(&mut self) -> &mut ByteStream {
        &mut self.stream
    }

    pub fn segments_out_mut(&mut self) -> &mut VecDeque<TcpSegment> {
        &mut self.segments_out
    }
}
