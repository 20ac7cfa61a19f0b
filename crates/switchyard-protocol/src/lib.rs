//! # switchyard-protocol
//!
//! Wire format spoken between a Switchyard node and its remote control
//! service.
//!
//! Every message is a [`Frame`]: a JSON-like object whose `"type"` field
//! names the message and whose remaining fields are its body.
//!
//! - **Text** - a single JSON object per websocket text message
//! - **Binary** - MessagePack with a 4-byte big-endian length prefix
//!
//! ## Example
//!
//! ```rust
//! use switchyard_protocol::{codec, Frame};
//!
//! let frame = Frame::from_text(r#"{"type":"drive","throttle":40,"steering":-3,"brake":false}"#).unwrap();
//! assert_eq!(frame.kind, "drive");
//!
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, ProtocolError};
pub use frames::{Frame, AUTHORIZE};
