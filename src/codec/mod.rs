//! Codec module - serialization of structured payload values.
//!
//! The framing layer treats payloads as opaque bytes; everything structured
//! goes through [`MsgPackCodec`]. Keeping the codec behind this seam is what
//! makes the payload encoding swappable without touching the wire format.

mod msgpack;

pub use msgpack::MsgPackCodec;
