pub mod connection;
pub mod receiver;
pub mod retransmission_timer;
pub mod segment;
pub mod segment_sink;
pub mod sender;
pub mod wrapping_integers;
