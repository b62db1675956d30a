use std::collections::VecDeque;
use std::sync::Arc;
use bytes::BytesMut;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::trace;
use crate::config::TcpConfig;
use crate::tcp::connection::Connection;
use crate::tcp::segment::TcpSegment;

pub type QueueConnection = Connection<VecDeque<TcpSegment>>;

/// How badly the link treats segments, each value a percentage
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkBehavior {
    pub loss_percent: u32,
    pub duplicate_percent: u32,
    /// chance of swapping a segment with the one sent before it
    pub reorder_percent: u32,
}

/// Two connections `a` and `b` connected through an in-memory link. Segments pass through the
///  wire codec, and the link loses, duplicates and reorders them based on a seeded RNG so that
///  test runs are reproducible.
pub struct Loopback {
    pub a: QueueConnection,
    pub b: QueueConnection,
    link: LinkBehavior,
    rng: StdRng,
}

impl Loopback {
    pub fn new(config_a: TcpConfig, config_b: TcpConfig, link: LinkBehavior, seed: u64) -> Loopback {
        Loopback {
            a: Connection::new(Arc::new(config_a), VecDeque::new()).unwrap(),
            b: Connection::new(Arc::new(config_b), VecDeque::new()).unwrap(),
            link,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn chance(&mut self, percent: u32) -> bool {
        self.rng.next_u32() % 100 < percent
    }

    fn transmit(&mut self, segments: Vec<TcpSegment>) -> Vec<TcpSegment> {
        let mut result = Vec::new();
        for segment in segments {
            if self.chance(self.link.loss_percent) {
                trace!("link: dropping segment {}", segment.header.seqno);
                continue;
            }

            let mut buf = BytesMut::new();
            segment.ser(&mut buf);
            let received = TcpSegment::deser(&buf).unwrap();

            if self.chance(self.link.duplicate_percent) {
                result.push(received.clone());
            }
            result.push(received);
        }

        for i in 1..result.len() {
            if self.chance(self.link.reorder_percent) {
                result.swap(i - 1, i);
            }
        }
        result
    }

    /// Deliver everything both sides sent, including the replies this triggers, until neither
    ///  side has anything left to send.
    pub fn exchange(&mut self) {
        for _ in 0..1000 {
            let from_a = self.a.sink_mut().drain(..).collect::<Vec<_>>();
            let from_b = self.b.sink_mut().drain(..).collect::<Vec<_>>();
            if from_a.is_empty() && from_b.is_empty() {
                return;
            }

            for segment in self.transmit(from_a) {
                self.b.segment_received(&segment);
            }
            for segment in self.transmit(from_b) {
                self.a.segment_received(&segment);
            }
        }
        panic!("connections keep sending segments back and forth");
    }

    pub fn tick(&mut self, elapsed_ms: u64) {
        self.a.tick(elapsed_ms);
        self.b.tick(elapsed_ms);
        self.exchange();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use rstest::rstest;
    use crate::tcp::connection::ConnectionState;
    use crate::tcp::wrapping_integers::WrappingInt32;

    const RTO: u64 = 50;

    fn config(isn: u32) -> TcpConfig {
        TcpConfig {
            send_capacity: 4000,
            recv_capacity: 4000,
            rt_timeout: Duration::from_millis(RTO),
            max_payload_size: 500,
            max_retx_attempts: 8,
            linger_factor: 10,
            fixed_isn: Some(WrappingInt32::new(isn)),
        }
    }

    fn test_data(len: usize, salt: usize) -> Vec<u8> {
        (0..len)
            .map(|i| ((i * 7 + i / 251 + salt) % 256) as u8)
            .collect()
    }

    fn read_available(connection: &mut QueueConnection, received: &mut Vec<u8>) {
        let len = connection.inbound_stream().buffer_size();
        let data = connection.inbound_stream_mut().read(len).unwrap();
        received.extend_from_slice(&data);
    }

    #[test]
    fn test_handshake_transfer_and_close() {
        let mut loopback = Loopback::new(config(17), config(u32::MAX), LinkBehavior::default(), 0);

        loopback.a.connect();
        loopback.exchange();
        assert_eq!(loopback.a.state(), ConnectionState::Open);
        assert_eq!(loopback.b.state(), ConnectionState::Open);

        assert_eq!(loopback.a.write(b"hello"), 5);
        loopback.exchange();
        let mut received = Vec::new();
        read_available(&mut loopback.b, &mut received);
        assert_eq!(received, b"hello".to_vec());
        assert_eq!(loopback.a.bytes_in_flight(), 0);

        // a closes first and lingers, b closes in reaction and is done as soon as its FIN is acked
        loopback.a.end_input_stream();
        loopback.exchange();
        assert!(loopback.b.inbound_stream().eof());
        assert_eq!(loopback.a.state(), ConnectionState::OutboundDone);
        assert_eq!(loopback.b.state(), ConnectionState::InboundDone);

        loopback.b.end_input_stream();
        loopback.exchange();
        assert!(loopback.a.inbound_stream().eof());
        assert_eq!(loopback.b.state(), ConnectionState::Closed);
        assert_eq!(loopback.a.state(), ConnectionState::Closing);

        loopback.tick(10 * RTO - 1);
        assert!(loopback.a.active());
        loopback.tick(1);
        assert!(!loopback.a.active());
        assert_eq!(loopback.a.state(), ConnectionState::Closed);
    }

    #[rstest]
    #[case::perfect_link(LinkBehavior::default(), 1)]
    #[case::lossy_link(LinkBehavior { loss_percent: 10, duplicate_percent: 5, reorder_percent: 10 }, 1)]
    #[case::lossy_link_other_seed(LinkBehavior { loss_percent: 10, duplicate_percent: 5, reorder_percent: 10 }, 2)]
    #[case::reordering_link(LinkBehavior { loss_percent: 0, duplicate_percent: 20, reorder_percent: 50 }, 3)]
    fn test_bidirectional_transfer(#[case] link: LinkBehavior, #[case] seed: u64) {
        let mut loopback = Loopback::new(config(123_456), config(u32::MAX - 1000), link, seed);

        let data_a = test_data(30_000, 1);
        let data_b = test_data(20_000, 2);
        let mut written_a = 0;
        let mut written_b = 0;
        let mut received_a = Vec::new();
        let mut received_b = Vec::new();

        loopback.a.connect();

        for _ in 0..100_000 {
            if written_a < data_a.len() {
                written_a += loopback.a.write(&data_a[written_a..]);
                if written_a == data_a.len() {
                    loopback.a.end_input_stream();
                }
            }
            // b opens passively, so it starts writing only after the handshake
            if written_b < data_b.len() && loopback.b.state() != ConnectionState::Idle {
                written_b += loopback.b.write(&data_b[written_b..]);
                if written_b == data_b.len() {
                    loopback.b.end_input_stream();
                }
            }

            loopback.tick(5);

            read_available(&mut loopback.b, &mut received_b);
            read_available(&mut loopback.a, &mut received_a);

            if !loopback.a.active() && !loopback.b.active() {
                break;
            }
        }

        assert_eq!(received_b, data_a);
        assert_eq!(received_a, data_b);
        assert!(loopback.a.inbound_stream().eof());
        assert!(loopback.b.inbound_stream().eof());
        assert_eq!(loopback.a.state(), ConnectionState::Closed);
        assert_eq!(loopback.b.state(), ConnectionState::Closed);
    }
}
