use std::sync::Arc;
use tracing::{debug, trace, warn};
use crate::config::TcpConfig;
use crate::stream::byte_stream::ByteStream;
use crate::tcp::receiver::TcpReceiver;
use crate::tcp::segment::{TcpFlags, TcpSegment};
use crate::tcp::segment_sink::SegmentSink;
use crate::tcp::sender::{SenderState, TcpSender};
use crate::util::safe_converter::SaturatingCast;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConnectionState {
    /// no SYN sent or received yet
    Idle,
    /// the handshake is under way or data is flowing in both directions
    Open,
    /// the peer finished its stream, we may still be sending
    InboundDone,
    /// we finished our stream, the peer may still be sending
    OutboundDone,
    /// both streams are finished, waiting for acknowledgements or lingering
    Closing,
    /// cleanly shut down
    Closed,
    /// terminated by RST, either received or sent because of too many retransmissions
    Aborted,
}

/// A full TCP connection, combining a [TcpSender] for the outbound stream and a [TcpReceiver]
///  for the inbound stream.
///
/// The connection is driven from the outside: the driver hands it incoming segments, the
///  application's writes and the passage of time. Everything the connection wants to send goes to
///  its [SegmentSink], stamped with the receiver's current ackno and window.
///
/// A connection ends either cleanly, when both streams are finished and acknowledged (and the
///  side that finished first has lingered long enough to acknowledge retransmissions of the
///  peer's FIN), or abruptly through RST. Dropping a connection that is still active sends a
///  RST to the peer.
pub struct Connection<S: SegmentSink> {
    config: Arc<TcpConfig>,
    sender: TcpSender,
    receiver: TcpReceiver,
    sink: S,

    outbound_ended: bool,
    inbound_ended: bool,
    outbound_fully_sent: bool,
    outbound_fully_acked: bool,
    linger_after_streams_finish: bool,

    /// a RST was received
    killed: bool,
    /// aborted because of too many consecutive retransmissions
    timed_out: bool,
    /// dropped while still active
    destroying: bool,

    time_since_last_segment_received: u64,
}

impl<S: SegmentSink> Connection<S> {
    pub fn new(config: Arc<TcpConfig>, sink: S) -> anyhow::Result<Connection<S>> {
        config.validate()?;

        Ok(Connection {
            sender: TcpSender::new(config.clone()),
            receiver: TcpReceiver::new(config.clone()),
            config,
            sink,
            outbound_ended: false,
            inbound_ended: false,
            outbound_fully_sent: false,
            outbound_fully_acked: false,
            linger_after_streams_finish: true,
            killed: false,
            timed_out: false,
            destroying: false,
            time_since_last_segment_received: 0,
        })
    }

    fn is_aborted(&self) -> bool {
        self.killed || self.timed_out
    }

    /// initiate the connection by sending a SYN
    pub fn connect(&mut self) {
        self.sender.fill_window();
        self.flush();
    }

    /// Write application data to the outbound stream, returning the number of bytes that fit.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.is_aborted() {
            debug!("write to an aborted connection - ignoring");
            return 0;
        }

        let written = self.sender.stream_in_mut().write(data);
        self.sender.fill_window();
        self.flush();
        written
    }

    /// The application is done writing. The FIN is sent as soon as the peer's window allows.
    pub fn end_input_stream(&mut self) {
        self.sender.stream_in_mut().end_input();
        self.sender.fill_window();
        self.flush();
        self.outbound_ended = true;
    }

    pub fn segment_received(&mut self, segment: &TcpSegment) {
        if self.is_aborted() {
            trace!("segment received on an aborted connection - ignoring");
            return;
        }

        if segment.header.rst() {
            warn!("connection reset by peer");
            self.sender.stream_in_mut().set_error();
            self.receiver.stream_out_mut().set_error();
            self.killed = true;
            return;
        }

        self.receiver.segment_received(segment);

        if segment.header.ack() && self.sender.next_seqno_absolute() > 0 {
            self.sender.ack_received(segment.header.ackno, segment.header.win);
            if self.outbound_fully_sent && self.sender.state() == SenderState::FinAcked {
                if !self.outbound_fully_acked {
                    debug!("FIN was acknowledged, outbound stream is complete");
                }
                self.outbound_fully_acked = true;
            }
        }

        if segment.length_in_sequence_space() > 0 {
            // make sure the peer gets an updated ackno and window
            if self.sender.next_seqno_absolute() == 0 {
                self.sender.fill_window();
            }
            else if self.sender.segments_out_mut().is_empty() {
                self.sender.send_empty_segment();
            }
        }
        else if let Some(ackno) = self.receiver.ackno() {
            if segment.header.seqno == ackno - 1 {
                trace!("received keep-alive probe");
                self.sender.send_empty_segment();
            }
        }

        self.flush();

        if self.receiver.stream_out().input_ended() {
            self.inbound_ended = true;
            if !self.sender.stream_in().eof() {
                // the peer finished first, so it will linger and absorb our retransmissions
                self.linger_after_streams_finish = false;
            }
        }

        self.time_since_last_segment_received = 0;
    }

    /// Advance the connection's virtual clock.
    pub fn tick(&mut self, elapsed_ms: u64) {
        if self.is_aborted() {
            return;
        }

        self.time_since_last_segment_received = self.time_since_last_segment_received.saturating_add(elapsed_ms);
        self.sender.tick(elapsed_ms);

        if self.sender.consecutive_retransmissions() > self.config.max_retx_attempts {
            warn!("{} consecutive retransmissions - aborting connection", self.sender.consecutive_retransmissions());
            self.timed_out = true;
            self.sender.stream_in_mut().set_error();
            self.receiver.stream_out_mut().set_error();
            if self.sender.segments_out_mut().is_empty() {
                self.sender.send_empty_segment();
            }
        }

        if self.inbound_ended
            && self.outbound_ended
            && self.outbound_fully_acked
            && self.linger_after_streams_finish
            && self.time_since_last_segment_received >= self.config.linger_timeout_ms()
        {
            debug!("lingered for {} ms without receiving a segment - closing", self.time_since_last_segment_received);
            self.linger_after_streams_finish = false;
        }

        self.flush();
    }

    /// hand all segments the sender queued to the sink, stamped with the receiver's ackno and window
    fn flush(&mut self) {
        let abort = self.timed_out || self.destroying;

        while let Some(mut segment) = self.sender.segments_out_mut().pop_front() {
            if let Some(ackno) = self.receiver.ackno() {
                segment.header.flags |= TcpFlags::ACK;
                segment.header.ackno = ackno;
                segment.header.win = self.receiver.window_size().saturating_cast();
            }
            if abort {
                segment.header.flags |= TcpFlags::RST;
            }
            if segment.header.fin() {
                self.outbound_fully_sent = true;
            }

            if let Err(e) = self.sink.send_segment(segment) {
                warn!("error sending segment: {}", e);
            }
        }
    }

    /// `false` once the connection is finished, cleanly or through RST
    pub fn active(&self) -> bool {
        let shut_down = self.inbound_ended
            && self.outbound_ended
            && self.outbound_fully_sent
            && self.outbound_fully_acked
            && !self.linger_after_streams_finish;

        !self.killed && !self.timed_out && !shut_down
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_aborted() {
            ConnectionState::Aborted
        }
        else if !self.active() {
            ConnectionState::Closed
        }
        else if self.inbound_ended && self.outbound_ended {
            ConnectionState::Closing
        }
        else if self.inbound_ended {
            ConnectionState::InboundDone
        }
        else if self.outbound_ended {
            ConnectionState::OutboundDone
        }
        else if self.sender.next_seqno_absolute() == 0 && self.receiver.ackno().is_none() {
            ConnectionState::Idle
        }
        else {
            ConnectionState::Open
        }
    }

    /// the number of bytes the application can currently write
    pub fn remaining_outbound_capacity(&self) -> usize {
        self.sender.stream_in().remaining_capacity()
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.sender.bytes_in_flight()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.receiver.unassembled_bytes()
    }

    pub fn time_since_last_segment_received(&self) -> u64 {
        self.time_since_last_segment_received
    }

    /// the stream of bytes received from the peer, for the application to read
    pub fn inbound_stream(&self) -> &ByteStream {
        self.receiver.stream_out()
    }

    pub fn inbound_stream_mut(&mut self) -> &mut ByteStream {
        self.receiver.stream_out_mut()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: SegmentSink> Drop for Connection<S> {
    fn drop(&mut self) {
        if self.active() {
            warn!("unclean shutdown of an active connection - sending RST");
            self.destroying = true;
            self.sender.send_empty_segment();
            self.flush();
        }
    }
}
