//! The unit of exchange between the engine and the network: a segment is a header plus an
//!  (optionally empty) payload.
//!
//! The engine itself works with [TcpSegment] values. Turning them into bytes is the business
//!  of the link collaborator, but a simple wire format is provided here for collaborators that
//!  just need *some* encoding, and for tests that push segments through a byte-level channel.
//!
//! ## Wire format
//!
//! All numbers in network byte order (BE):
//! ```ascii
//!  0: sequence number (u32)
//!  4: ack number (u32) - 0 unless the ACK flag is set
//!  8: flags (u8):
//!     * bit 0: FIN
//!     * bit 1: SYN
//!     * bit 2: RST
//!     * bit 4: ACK
//!     * other bits must be 0
//!  9: reserved (u8), must be 0
//! 10: window (u16)
//! 12: checksum (u32): CRC-32 over the header (with this field set to 0) and the payload
//! 16: payload - the rest of the datagram
//! ```

use anyhow::bail;
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_32_ISO_HDLC};
use crate::tcp::wrapping_integers::WrappingInt32;
use crate::util::safe_converter::SafeCast;

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct TcpFlags: u8 {
        const FIN = 0b0000_0001;
        const SYN = 0b0000_0010;
        const RST = 0b0000_0100;
        const ACK = 0b0001_0000;
    }
}

impl Default for TcpFlags {
    fn default() -> Self {
        TcpFlags::empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct TcpHeader {
    pub seqno: WrappingInt32,
    /// meaningful only if the ACK flag is set
    pub ackno: WrappingInt32,
    pub flags: TcpFlags,
    pub win: u16,
}

impl TcpHeader {
    pub const SERIALIZED_LEN: usize = 16;

    const CHECKSUM_OFFSET: usize = 12;

    pub fn syn(&self) -> bool {
        self.flags.contains(TcpFlags::SYN)
    }
    pub fn ack(&self) -> bool {
        self.flags.contains(TcpFlags::ACK)
    }
    pub fn fin(&self) -> bool {
        self.flags.contains(TcpFlags::FIN)
    }
    pub fn rst(&self) -> bool {
        self.flags.contains(TcpFlags::RST)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct TcpSegment {
    pub header: TcpHeader,
    pub payload: Bytes,
}

static CHECKSUM: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

impl TcpSegment {
    pub fn new(seqno: WrappingInt32, flags: TcpFlags, payload: Bytes) -> TcpSegment {
        TcpSegment {
            header: TcpHeader {
                seqno,
                flags,
                ..Default::default()
            },
            payload,
        }
    }

    /// the number of sequence numbers this segment occupies: SYN and FIN count one each
    pub fn length_in_sequence_space(&self) -> u64 {
        let mut result: u64 = self.payload.len().safe_cast();
        if self.header.syn() {
            result += 1;
        }
        if self.header.fin() {
            result += 1;
        }
        result
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        let start = buf.len();

        buf.put_u32(self.header.seqno.raw_value());
        if self.header.ack() {
            buf.put_u32(self.header.ackno.raw_value());
        }
        else {
            buf.put_u32(0);
        }
        buf.put_u8(self.header.flags.bits());
        buf.put_u8(0);
        buf.put_u16(self.header.win);
        buf.put_u32(0); // checksum placeholder
        buf.put_slice(&self.payload);

        let checksum = CHECKSUM.checksum(&buf[start..]);
        let checksum_offs = start + TcpHeader::CHECKSUM_OFFSET;
        buf[checksum_offs..checksum_offs + 4].copy_from_slice(&checksum.to_be_bytes());
    }

    pub fn deser(datagram: &[u8]) -> anyhow::Result<TcpSegment> {
        if datagram.len() < TcpHeader::SERIALIZED_LEN {
            bail!("datagram of length {} is too short for a segment header", datagram.len());
        }

        let mut digest = CHECKSUM.digest();
        digest.update(&datagram[..TcpHeader::CHECKSUM_OFFSET]);
        digest.update(&[0; 4]);
        digest.update(&datagram[TcpHeader::SERIALIZED_LEN..]);
        let actual_checksum = digest.finalize();

        let mut buf = datagram;
        let seqno = WrappingInt32::new(buf.get_u32());
        let ackno = WrappingInt32::new(buf.get_u32());
        let raw_flags = buf.get_u8();
        let reserved = buf.get_u8();
        let win = buf.get_u16();
        let expected_checksum = buf.get_u32();

        if actual_checksum != expected_checksum {
            bail!("checksum mismatch: header says {:08x}, content has {:08x}", expected_checksum, actual_checksum);
        }
        let flags = match TcpFlags::from_bits(raw_flags) {
            Some(flags) => flags,
            None => bail!("unsupported flags {:08b}", raw_flags),
        };
        if reserved != 0 {
            bail!("reserved header byte is {} instead of 0", reserved);
        }

        Ok(TcpSegment {
            header: TcpHeader {
                seqno,
                ackno,
                flags,
                win,
            },
            payload: Bytes::copy_from_slice(buf),
        })
    }
}
