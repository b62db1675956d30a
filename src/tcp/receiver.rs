use std::sync::Arc;
use tracing::{debug, trace};
use crate::config::TcpConfig;
use crate::stream::byte_stream::ByteStream;
use crate::stream::stream_reassembler::StreamReassembler;
use crate::tcp::segment::TcpSegment;
use crate::tcp::wrapping_integers::WrappingInt32;
use crate::util::safe_converter::SafeCast;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReceiverState {
    /// waiting for the peer's SYN
    Listen,
    SynReceived,
    /// the peer's FIN was received and everything before it was assembled
    FinReceived,
    Error,
}

/// The inbound half of a connection. It latches the peer's ISN from the first SYN, translates
///  sequence numbers into stream indices and hands the payload to a [StreamReassembler], and it
///  computes the ackno and window to advertise back to the peer.
pub struct TcpReceiver {
    isn: Option<WrappingInt32>,
    reassembler: StreamReassembler,
    capacity: usize,
}

impl TcpReceiver {
    pub fn new(config: Arc<TcpConfig>) -> TcpReceiver {
        TcpReceiver {
            isn: None,
            reassembler: StreamReassembler::new(config.recv_capacity),
            capacity: config.recv_capacity,
        }
    }

    pub fn segment_received(&mut self, segment: &TcpSegment) {
        let isn = match self.isn {
            Some(isn) => isn,
            None => {
                if !segment.header.syn() {
                    trace!("no SYN received yet - discarding segment #{}", segment.header.seqno);
                    return;
                }
                debug!("received SYN, peer's ISN is {}", segment.header.seqno);
                self.isn = Some(segment.header.seqno);
                segment.header.seqno
            }
        };

        let checkpoint = self.reassembler.stream_out().bytes_written();
        let absolute_seqno = segment.header.seqno.unwrap(isn, checkpoint);

        // the SYN occupies absolute seqno 0, payload starts at 1
        let stream_index = if segment.header.syn() {
            0
        }
        else {
            match absolute_seqno.checked_sub(1) {
                Some(index) => index,
                None => {
                    debug!("segment without SYN at the ISN's sequence number - discarding");
                    return;
                }
            }
        };

        let absolute_ackno = self.absolute_ackno();
        let capacity: u64 = self.capacity.safe_cast();
        let window_end = absolute_ackno + capacity;
        if absolute_seqno + segment.length_in_sequence_space() <= absolute_ackno {
            trace!("segment #{} contains only data that was received before - discarding", absolute_seqno);
            return;
        }
        if absolute_seqno >= window_end {
            trace!("segment #{} is beyond the window ending at #{} - discarding", absolute_seqno, window_end);
            return;
        }

        self.reassembler.push_substring(&segment.payload, stream_index, segment.header.fin());
    }

    /// The next absolute seqno expected from the peer. This counts the SYN and, once the stream
    ///  is complete, the FIN.
    fn absolute_ackno(&self) -> u64 {
        let stream = self.reassembler.stream_out();
        let fin: u64 = if stream.input_ended() { 1 } else { 0 };
        1 + stream.bytes_written() + fin
    }

    /// the ackno to send to the peer, `None` before the SYN is received
    pub fn ackno(&self) -> Option<WrappingInt32> {
        self.isn
            .map(|isn| WrappingInt32::wrap(self.absolute_ackno(), isn))
    }

    /// The number of bytes the receiver is willing to accept beyond the ackno. This is the part
    ///  of the capacity not occupied by data the application has yet to read.
    pub fn window_size(&self) -> usize {
        self.capacity - self.reassembler.stream_out().buffer_size()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.reassembler.unassembled_bytes()
    }

    pub fn state(&self) -> ReceiverState {
        let stream = self.reassembler.stream_out();
        if stream.error() {
            ReceiverState::Error
        }
        else if self.isn.is_none() {
            ReceiverState::Listen
        }
        else if stream.input_ended() {
            ReceiverState::FinReceived
        }
        else {
            ReceiverState::SynReceived
        }
    }

    pub fn stream_out(&self) -> &ByteStream {
        self.reassembler.stream_out()
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        self.reassembler.stream_out_mut()
    }
}
