//! The decode loop and the state it runs on.

use crate::buffer::RingBuffer;
use crate::decoder::PacketDecoder;
use crate::error::Error;
use crate::iter::Singles;
use crate::logging::{LogLevel, Logger};
use crate::packet::{TracePacket, MAX_PACKET_SIZE};

/// Returned by the packet callback to steer the decode loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Decode the next packet.
    Continue,

    /// Return from [`Context::decode`](Context::decode) successfully,
    /// leaving the remaining buffered data untouched.
    Stop,

    /// Abort decoding; [`Context::decode`](Context::decode) returns
    /// [`Error::Callback`](Error::Callback) with the given code.
    Error(i32),
}

/// Options for a single decode call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeFlags {
    /// No more data will be fed. Once no further complete packet can
    /// be decoded, any remaining buffered bytes are delivered as
    /// [`Unknown`](TracePacket::Unknown) packets of at most
    /// [`MAX_PACKET_SIZE`](MAX_PACKET_SIZE) bytes each.
    pub end_of_stream: bool,
}

/// Invoked for every decoded packet with the packet and the raw stream
/// bytes it was decoded from.
pub type PacketCallback<'a> = Box<dyn FnMut(&TracePacket, &[u8]) -> Flow + 'a>;

/// A decode session: owns (or borrows) the ring buffer that is fed
/// with trace data, the packet callback and the log configuration.
///
/// A context is not meant to be shared; every operation runs to
/// completion on the caller's thread.
pub struct Context<'a> {
    buffer: RingBuffer<'a>,
    log: Logger<'a>,
    callback: Option<PacketCallback<'a>>,
    packet: Option<TracePacket>,
    raw: Vec<u8>,
}

impl<'a> Context<'a> {
    /// Creates a context with an internally allocated ring buffer of
    /// `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidArgument);
        }

        let buffer = RingBuffer::with_capacity(capacity).ok_or(Error::AllocationFailure)?;
        Ok(Context::from_buffer(buffer))
    }

    /// Creates a context whose ring buffer lives in `memory`. The
    /// capacity is the length of `memory`.
    pub fn with_buffer(memory: &'a mut [u8]) -> Result<Self, Error> {
        if memory.is_empty() {
            return Err(Error::InvalidArgument);
        }

        Ok(Context::from_buffer(RingBuffer::with_storage(memory)))
    }

    fn from_buffer(buffer: RingBuffer<'a>) -> Self {
        Context {
            buffer,
            log: Logger::new(),
            callback: None,
            packet: None,
            raw: Vec::with_capacity(MAX_PACKET_SIZE),
        }
    }

    /// Appends trace data to the ring buffer. Nothing is written if
    /// `data` does not fit into the free space.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), Error> {
        self.buffer.write(data)?;
        Ok(())
    }

    /// Decodes buffered packets and hands each one to the packet
    /// callback, if any, removing it from the buffer afterwards.
    ///
    /// Stops once the buffer is exhausted, the packet at the read
    /// position is incomplete, `limit` packets have been delivered or
    /// the callback returns [`Flow::Stop`](Flow::Stop). Returns the
    /// number of packets delivered.
    pub fn decode(&mut self, limit: Option<usize>, flags: DecodeFlags) -> Result<usize, Error> {
        let limit = match limit {
            Some(0) => return Err(Error::InvalidArgument),
            Some(n) => n,
            None => usize::MAX,
        };

        let mut draining = false;
        let mut count = 0;

        while count < limit {
            let packet = match self.next_packet(flags, &mut draining) {
                Some(packet) => packet,
                None => break,
            };

            self.consume(packet)?;
            count += 1;

            match self.deliver() {
                Flow::Continue => (),
                Flow::Stop => {
                    self.log
                        .debug(format_args!("Decoding stopped by callback function."));
                    break;
                }
                Flow::Error(code) => return Err(Error::Callback(code)),
            }
        }

        Ok(count)
    }

    /// Returns an iterator that decodes and consumes buffered packets
    /// one at a time. The packet callback is not invoked.
    pub fn singles(&mut self, flags: DecodeFlags) -> Singles<'_, 'a> {
        Singles::new(self, flags)
    }

    /// Determines the next packet without consuming it. Once the
    /// stream has ended and nothing more decodes, `draining` is set
    /// and everything left is chunked into unknown packets.
    pub(crate) fn next_packet(
        &mut self,
        flags: DecodeFlags,
        draining: &mut bool,
    ) -> Option<TracePacket> {
        if !*draining {
            if let Some(header) = self.buffer.peek_byte(0) {
                if let Ok(packet) = PacketDecoder::new(&self.buffer, &mut self.log).decode(header)
                {
                    return Some(packet);
                }
            }

            if !flags.end_of_stream || self.buffer.is_empty() {
                return None;
            }

            self.log.debug(format_args!(
                "End of stream reached; treating {} remaining bytes as unknown data.",
                self.buffer.bytes_available()
            ));
            *draining = true;
        }

        match self.buffer.bytes_available() {
            0 => None,
            n => Some(TracePacket::Unknown {
                size: n.min(MAX_PACKET_SIZE),
            }),
        }
    }

    /// Moves the bytes spanned by `packet` out of the ring buffer and
    /// makes it the last decoded packet.
    pub(crate) fn consume(&mut self, packet: TracePacket) -> Result<&TracePacket, Error> {
        self.raw.resize(packet.byte_len(), 0);
        self.buffer.read(&mut self.raw)?;

        Ok(&*self.packet.insert(packet))
    }

    fn deliver(&mut self) -> Flow {
        match (self.callback.as_mut(), self.packet.as_ref()) {
            (Some(callback), Some(packet)) => callback(packet, &self.raw),
            _ => Flow::Continue,
        }
    }

    /// Registers the callback invoked for every decoded packet,
    /// replacing any previous one. Data the callback needs is captured
    /// by the closure.
    pub fn set_packet_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&TracePacket, &[u8]) -> Flow + 'a,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Removes the packet callback; decoded packets are then consumed
    /// silently.
    pub fn clear_packet_callback(&mut self) {
        self.callback = None;
    }

    /// The most recently decoded packet.
    pub fn last_packet(&self) -> Option<&TracePacket> {
        self.packet.as_ref()
    }

    /// Number of buffered bytes not yet consumed by decoding.
    pub fn bytes_available(&self) -> usize {
        self.buffer.bytes_available()
    }

    /// Capacity of the ring buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Discards all buffered data.
    pub fn flush(&mut self) {
        self.buffer.flush();
    }

    pub fn log_level(&self) -> LogLevel {
        self.log.level()
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log.set_level(level);
    }

    pub fn log_domain(&self) -> &str {
        self.log.domain()
    }

    /// Sets the prefix of messages forwarded to the `log` facade. It
    /// is truncated to
    /// [`LOG_DOMAIN_MAX_LENGTH`](crate::LOG_DOMAIN_MAX_LENGTH) bytes.
    pub fn set_log_domain(&mut self, domain: &str) {
        self.log.set_domain(domain);
    }

    /// Routes log messages that pass the level filter to `callback`
    /// instead of the `log` facade.
    pub fn set_log_callback<F>(&mut self, callback: F)
    where
        F: FnMut(LogLevel, &str) + 'a,
    {
        self.log.set_callback(Some(Box::new(callback)));
    }

    pub fn clear_log_callback(&mut self) {
        self.log.set_callback(None);
    }
}
