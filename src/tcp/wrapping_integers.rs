use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};

/// A 32 bit sequence number as it appears on the wire. It is relative to an initial sequence
///  number (ISN), and it wraps around, so it is meaningless without a reference point - see
///  [WrappingInt32::unwrap].
///
/// Each direction of a connection has its own ISN.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct WrappingInt32(u32);

impl Display for WrappingInt32 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl WrappingInt32 {
    pub const fn new(raw_value: u32) -> WrappingInt32 {
        WrappingInt32(raw_value)
    }

    pub fn raw_value(&self) -> u32 {
        self.0
    }

    /// the on-wire representation of an absolute (zero-based, 64 bit) sequence number
    pub fn wrap(absolute: u64, isn: WrappingInt32) -> WrappingInt32 {
        // truncation is the point: only the lower 32 bits survive the wrap-around
        WrappingInt32(isn.0.wrapping_add(absolute as u32))
    }

    /// The absolute sequence number that wraps to `self` and is closest to `checkpoint`. If two
    ///  candidates are equally close, the lower one wins.
    ///
    /// This is exact for the entire u64 range: near 0 and near u64::MAX, the nearest candidate
    ///  that actually exists is returned.
    pub fn unwrap(self, isn: WrappingInt32, checkpoint: u64) -> u64 {
        const SPAN: u64 = 1 << 32;

        let diff = self - WrappingInt32::wrap(checkpoint, isn);
        if diff >= 0 {
            let forward = diff as u64;
            checkpoint.checked_add(forward)
                .unwrap_or_else(|| checkpoint - (SPAN - forward))
        }
        else {
            let backward = u64::from(diff.unsigned_abs());
            checkpoint.checked_sub(backward)
                .unwrap_or_else(|| checkpoint + (SPAN - backward))
        }
    }
}

impl Add<u32> for WrappingInt32 {
    type Output = WrappingInt32;

    fn add(self, rhs: u32) -> WrappingInt32 {
        WrappingInt32(self.0.wrapping_add(rhs))
    }
}

impl Sub<u32> for WrappingInt32 {
    type Output = WrappingInt32;

    fn sub(self, rhs: u32) -> WrappingInt32 {
        WrappingInt32(self.0.wrapping_sub(rhs))
    }
}

/// The signed distance from `rhs` to `self`, i.e. the number of increments needed to get from
///  `rhs` to `self`, negative if fewer decrements are needed. A distance of exactly 2^31 comes
///  out as `i32::MIN`.
impl Sub<WrappingInt32> for WrappingInt32 {
    type Output = i32;

    fn sub(self, rhs: WrappingInt32) -> i32 {
        self.0.wrapping_sub(rhs.0) as i32
    }
}
