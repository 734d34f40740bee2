//! # `swo`
//!
//! A streaming decoder for the Serial Wire Output (SWO) trace stream of
//! ARM Cortex-M microcontrollers: the ITM and DWT packet protocol as
//! specified in the [ARMv7-M architecture reference manual, Appendix
//! D4](https://developer.arm.com/documentation/ddi0403/ed/).
//!
//! Raw trace data captured from a debug probe is [fed](Context::feed)
//! into the ring buffer of a [`Context`](Context) in arbitrarily sized
//! chunks. [`Context::decode`](Context::decode) then reconstructs packet
//! boundaries and hands every complete packet to a callback as a
//! [`TracePacket`](TracePacket), together with the raw bytes it was
//! decoded from. Packets that are not yet complete stay buffered until
//! more data arrives.
//!
//! Usage is simple:
//! ```
//! use swo::{Context, DecodeFlags, Flow};
//!
//! let mut packets = vec![];
//! let mut ctx = Context::new(1024)?;
//! ctx.set_packet_callback(|packet, _raw| {
//!     packets.push(packet.clone());
//!     Flow::Continue
//! });
//!
//! // e.g. data read from a probe or a capture file
//! ctx.feed(&[0x70, 0x01, 0xab])?;
//! ctx.decode(None, DecodeFlags { end_of_stream: true })?;
//! drop(ctx);
//!
//! assert_eq!(packets.len(), 2);
//! # Ok::<(), swo::Error>(())
//! ```
//!
//! Packets can also be pulled one at a time with
//! [`Context::singles`](Context::singles).
#![deny(rustdoc::broken_intra_doc_links)]

mod buffer;
mod context;
mod decoder;
mod dwt;
mod error;
mod iter;
mod logging;
mod packet;

pub use context::{Context, DecodeFlags, Flow, PacketCallback};
pub use decoder::classify;
pub use error::{strerror, strerror_name, Error, OK};
pub use iter::Singles;
pub use logging::{
    LogCallback, LogLevel, ParseLogLevelError, DEFAULT_LOG_DOMAIN, LOG_DOMAIN_MAX_LENGTH,
};
pub use packet::{
    ExceptionAction, ExtensionSource, MemoryAccessType, PacketKind, TimestampDataRelation,
    TracePacket, VectActive, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE,
};
