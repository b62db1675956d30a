use std::collections::VecDeque;
#[cfg(test)] use mockall::automock;
use crate::tcp::segment::TcpSegment;

/// The boundary between a connection and whatever carries its segments to the peer. An
///  implementation may encapsulate segments in IP datagrams, UDP packets or anything else, or
///  just collect them for inspection.
#[cfg_attr(test, automock)]
pub trait SegmentSink {
    fn send_segment(&mut self, segment: TcpSegment) -> anyhow::Result<()>;
}

/// collects segments in memory, e.g. for a driver that polls them
impl SegmentSink for VecDeque<TcpSegment> {
    fn send_segment(&mut self, segment: TcpSegment) -> anyhow::Result<()> {
        self.push_back(segment);
        Ok(())
    }
}
