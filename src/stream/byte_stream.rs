use std::cmp::min;
use anyhow::bail;
use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;
use crate::util::safe_converter::SafeCast;

/// A bounded, in-memory FIFO of bytes with a writer side and a reader side. This is what the
///  application writes to and reads from, and it is where both directions of a connection
///  buffer data.
///
/// Nothing ever blocks: writes beyond the remaining capacity are truncated, and reads must not
///  ask for more than is buffered.
#[derive(Debug)]
pub struct ByteStream {
    capacity: usize,
    buffer: BytesMut,
    bytes_written: u64,
    bytes_read: u64,
    input_ended: bool,
    error: bool,
}

impl ByteStream {
    pub fn new(capacity: usize) -> ByteStream {
        ByteStream {
            capacity,
            buffer: BytesMut::with_capacity(capacity),
            bytes_written: 0,
            bytes_read: 0,
            input_ended: false,
            error: false,
        }
    }

    /// Appends as much of `data` as fits, returning the number of bytes actually written. Nothing
    ///  is written after `end_input()` or once an error is latched.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.error {
            trace!("write to a stream in error state - ignoring {} bytes", data.len());
            return 0;
        }
        if self.input_ended {
            trace!("write after end of input - ignoring {} bytes", data.len());
            return 0;
        }

        let len = min(data.len(), self.remaining_capacity());
        self.buffer.extend_from_slice(&data[..len]);
        let len_u64: u64 = len.safe_cast();
        self.bytes_written += len_u64;
        len
    }

    /// a copy of the next `len` bytes, without removing them
    pub fn peek(&self, len: usize) -> anyhow::Result<Bytes> {
        self.check_buffered(len)?;
        Ok(Bytes::copy_from_slice(&self.buffer[..len]))
    }

    /// discard the next `len` bytes
    pub fn pop(&mut self, len: usize) -> anyhow::Result<()> {
        self.check_buffered(len)?;
        self.buffer.advance(len);
        let len_u64: u64 = len.safe_cast();
        self.bytes_read += len_u64;
        Ok(())
    }

    /// remove and return the next `len` bytes
    pub fn read(&mut self, len: usize) -> anyhow::Result<Bytes> {
        self.check_buffered(len)?;
        Ok(self.split_off_front(len))
    }

    /// remove and return up to `max_len` bytes - as many as are buffered
    pub fn read_available(&mut self, max_len: usize) -> Bytes {
        let len = min(max_len, self.buffer.len());
        self.split_off_front(len)
    }

    fn split_off_front(&mut self, len: usize) -> Bytes {
        let len_u64: u64 = len.safe_cast();
        self.bytes_read += len_u64;
        self.buffer.split_to(len).freeze()
    }

    fn check_buffered(&self, len: usize) -> anyhow::Result<()> {
        if len > self.buffer.len() {
            bail!("requested {} bytes, but only {} bytes are buffered", len, self.buffer.len());
        }
        Ok(())
    }

    /// signal that the writer will not write any more data
    pub fn end_input(&mut self) {
        self.input_ended = true;
    }

    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    /// true iff the writer ended the input and the reader consumed everything
    pub fn eof(&self) -> bool {
        self.input_ended && self.buffer.is_empty()
    }

    /// latches a terminal error, e.g. because the connection was reset
    pub fn set_error(&mut self) {
        self.error = true;
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }
}
