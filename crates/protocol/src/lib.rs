//! Binary wire protocol for event-relay.
//!
//! This crate implements the self-describing tagged-union value format that
//! events are encoded with on the wire, and the event codec on top of it:
//!
//! - Values: scalars (flag, integers of 1/2/4/8 bytes, float, double,
//!   string, UUID, blob, null), homogeneous scalar arrays, containers and
//!   container arrays
//! - Containers: ordered tag-name to value mappings, decodable selectively
//!   (unwanted tags are skipped without being materialized)
//! - Events: `[version][16-byte time-ordered id][container payload]`
//! - Batch messages: `[i32 count][event]*count`
//!
//! All fixed-width integers are big-endian on the wire. Every encoded value
//! can be skipped in O(size) without a full decode: for each value kind the
//! decoder defines both `read` and `skip`, and `skip` consumes exactly as
//! many bytes as `read` would.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod event;
pub mod value;

pub use decoder::{ContainerReader, Decoder};
pub use encoder::Encoder;
pub use error::{DecodeError, Result};
pub use event::{Event, EventBuilder, EventReader, EventWriter};
pub use value::{Container, ScalarArray, Value};
