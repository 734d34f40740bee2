use crate::context::{Context, DecodeFlags};
use crate::packet::TracePacket;

/// Iterator over the packets buffered in a [`Context`](Context),
/// created by [`Context::singles`](Context::singles).
///
/// Each yielded packet is consumed from the ring buffer. Iteration ends
/// when the buffer is exhausted or holds only an incomplete packet; if
/// the stream has ended, the remainder is yielded as unknown data
/// first.
pub struct Singles<'c, 'a> {
    context: &'c mut Context<'a>,
    flags: DecodeFlags,
    draining: bool,
}

impl<'c, 'a> Singles<'c, 'a> {
    pub(crate) fn new(context: &'c mut Context<'a>, flags: DecodeFlags) -> Self {
        Self {
            context,
            flags,
            draining: false,
        }
    }
}

impl<'c, 'a> Iterator for Singles<'c, 'a> {
    type Item = TracePacket;

    fn next(&mut self) -> Option<Self::Item> {
        let packet = self.context.next_packet(self.flags, &mut self.draining)?;
        self.context.consume(packet).ok().cloned()
    }
}
