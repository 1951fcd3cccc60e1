//! # Network Streaming
//!
//! Delta encoding of entity state for remote clients and time-buffered
//! interpolation of the received state.
//!
//! ## Organization
//!
//! - **Message**: Wire messages, client ids and the [`Transport`] seam
//! - **Codec**: Fixed-precision value and section framing
//! - **Stream**: Per-entity stream settings and the per-client synchronizer
//! - **Interpolation**: Snapshot buffer and bracket blending
//! - **Receiver**: Applies create/update/destroy messages to a scenegraph

pub mod codec;
pub mod interpolation;
pub mod message;
pub mod receiver;
pub mod stream;

pub use codec::StreamError;
pub use interpolation::{process_interpolate, InterpolationOutcome, TimeStream};
pub use message::{ClientId, Recipients, StreamMessage, Transport};
pub use receiver::{Received, StreamReceiver};
pub use stream::{StreamMode, StreamSection, StreamSettings, StreamSynchronizer};
