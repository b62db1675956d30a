pub mod byte_stream;
pub mod stream_reassembler;
