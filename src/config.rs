use std::time::Duration;
use anyhow::bail;
use crate::tcp::wrapping_integers::WrappingInt32;

/// Per-connection configuration, shared between a connection's sender and receiver.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Capacity of the outbound byte stream, i.e. the number of bytes the application can write
    ///  ahead of what the sender has put on the wire
    pub send_capacity: usize,

    /// Capacity of the inbound side: this bounds the bytes buffered for the application plus
    ///  the out-of-order bytes held by the reassembler, and it is what the receiver advertises
    ///  as its window (clamped to `u16::MAX` on the wire)
    pub recv_capacity: usize,

    /// Initial retransmission timeout. The sender doubles it on each consecutive timeout while
    ///  the peer's window is open, and resets it when new data is acknowledged.
    pub rt_timeout: Duration,

    /// Maximum number of payload bytes in a single segment. This is a property of the link
    ///  below, the engine does not discover it.
    pub max_payload_size: usize,

    /// A connection aborts (sending RST) when the number of consecutive retransmissions of the
    ///  same segment exceeds this value
    pub max_retx_attempts: u32,

    /// After both directions are finished cleanly, the side that closed first stays alive for
    ///  `linger_factor * rt_timeout` since the last received segment, so it can still
    ///  acknowledge retransmissions of the peer's FIN
    pub linger_factor: u32,

    /// Initial sequence number for the outbound direction. `None` draws a random ISN, which is
    ///  what production code should do; tests use a fixed ISN for reproducibility.
    pub fixed_isn: Option<WrappingInt32>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            send_capacity: 64000,
            recv_capacity: 64000,
            rt_timeout: Duration::from_millis(1000),
            max_payload_size: 1000,
            max_retx_attempts: 8,
            linger_factor: 10,
            fixed_isn: None,
        }
    }
}

impl TcpConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.send_capacity == 0 {
            bail!("send capacity must be positive");
        }
        if self.recv_capacity == 0 {
            bail!("receive capacity must be positive");
        }
        if self.max_payload_size == 0 {
            bail!("max payload size must be positive");
        }
        if self.rt_timeout.is_zero() {
            bail!("retransmission timeout must be positive");
        }
        if u64::try_from(self.rt_timeout.as_millis()).is_err() {
            bail!("retransmission timeout {:?} is out of range", self.rt_timeout);
        }
        Ok(())
    }

    /// the initial retransmission timeout in milliseconds, which is the unit of the virtual clock
    pub fn rt_timeout_ms(&self) -> u64 {
        // validate() rejects values that don't fit
        u64::try_from(self.rt_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// time without a received segment after which a finished connection stops lingering
    pub fn linger_timeout_ms(&self) -> u64 {
        self.rt_timeout_ms().saturating_mul(self.linger_factor.into())
    }
}
