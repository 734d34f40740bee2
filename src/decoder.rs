//! Classification and decoding of the packet at the read position of a
//! [`RingBuffer`](crate::buffer::RingBuffer).
//!
//! Nothing in here consumes buffered data: every decoder only peeks and
//! reports either a complete packet or [`Incomplete`](Incomplete).

use bitmatch::bitmatch;
use bitvec::prelude::*;

use crate::buffer::RingBuffer;
use crate::dwt::{self, HardwareSource};
use crate::error::MalformedPacket;
use crate::logging::Logger;
use crate::packet::{
    ExtensionSource, PacketKind, TimestampDataRelation, TracePacket, MAX_PAYLOAD_SIZE,
};

/// Minimum number of zero bits preceding the set bit of a
/// synchronization packet.
const SYNC_MIN_ZEROS: usize = 48;

/// Continuation bit of header and payload bytes.
const C_MASK: u8 = 0x80;

const LTS1_TS_MASK: u32 = 0x0fff_ffff;
const GTS1_TS_MASK: u32 = 0x03ff_ffff;
const GTS1_CLKCH_MASK: u32 = 1 << 26;
const GTS1_WRAP_MASK: u32 = 1 << 27;
const GTS2_TS_MASK: u32 = 0x003f_ffff;
const GTS2_PAYLOAD_SIZE: usize = 4;

/// The packet at the read position extends past the buffered data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Incomplete;

/// Determines the packet kind from a header byte. Several patterns
/// overlap; the first matching arm wins.
#[allow(clippy::bad_bit_mask)]
#[bitmatch]
pub fn classify(header: u8) -> PacketKind {
    #[bitmatch]
    match header {
        // Synchronization packet category
        "0000_0000" => PacketKind::Synchronization,

        // Protocol packet category
        "0111_0000" => PacketKind::Overflow,
        "0???_0000" => PacketKind::LocalTimestamp, // LTS2
        "11??_0000" => PacketKind::LocalTimestamp, // LTS1
        "????_1?00" => PacketKind::Extension,
        "1001_0100" => PacketKind::GlobalTimestamp1,
        "1011_0100" => PacketKind::GlobalTimestamp2,

        // Source packet category
        "????_?tss" => match (t, s) {
            (_, 0) => PacketKind::Unknown,
            (0, _) => PacketKind::Instrumentation,
            _ => PacketKind::HardwareSource,
        },
    }
}

/// Decodes the continuation-terminated field that follows the header.
///
/// Byte `i` contributes its lower seven bits at bit `7 * i`. The fourth
/// byte, if reached, contributes all eight bits and ends the field.
/// Returns the field and the number of payload bytes it spans.
pub(crate) fn decode_varint(buffer: &RingBuffer) -> Result<(u32, usize), Incomplete> {
    let mut value: u32 = 0;

    for i in 0..MAX_PAYLOAD_SIZE - 1 {
        let b = buffer.peek_byte(1 + i).ok_or(Incomplete)?;
        value |= ((b & !C_MASK) as u32) << (7 * i);

        if b & C_MASK == 0 {
            return Ok((value, i + 1));
        }
    }

    let last = MAX_PAYLOAD_SIZE - 1;
    let b = buffer.peek_byte(1 + last).ok_or(Incomplete)?;
    value |= (b as u32) << (7 * last);

    Ok((value, MAX_PAYLOAD_SIZE))
}

/// Decodes the packet at the read position of a buffer.
pub(crate) struct PacketDecoder<'d, 'b, 'l> {
    buffer: &'d RingBuffer<'b>,
    log: &'d mut Logger<'l>,
}

impl<'d, 'b, 'l> PacketDecoder<'d, 'b, 'l> {
    pub fn new(buffer: &'d RingBuffer<'b>, log: &'d mut Logger<'l>) -> Self {
        PacketDecoder { buffer, log }
    }

    /// Decodes the packet introduced by `header`, the byte at the read
    /// position.
    pub fn decode(&mut self, header: u8) -> Result<TracePacket, Incomplete> {
        match classify(header) {
            PacketKind::Synchronization => self.sync(),
            PacketKind::Overflow => {
                self.log.debug(format_args!("Overflow packet decoded."));
                Ok(TracePacket::Overflow)
            }
            PacketKind::LocalTimestamp => self.local_timestamp(header),
            PacketKind::GlobalTimestamp1 => self.global_timestamp1(),
            PacketKind::GlobalTimestamp2 => self.global_timestamp2(),
            PacketKind::Extension => self.extension(header),
            PacketKind::Instrumentation => self.instrumentation(header),
            PacketKind::HardwareSource => {
                let hw = self.source(header, "hardware source")?;
                Ok(dwt::decode(&hw, self.log))
            }
            PacketKind::Unknown => {
                self.log
                    .debug(format_args!("Unknown header: {:02x}.", header));
                Ok(TracePacket::Unknown { size: 1 })
            }
        }
    }

    /// Like [`decode_varint`](decode_varint), logging a suspension.
    fn varint(&mut self, what: &str) -> Result<(u32, usize), Incomplete> {
        decode_varint(self.buffer).map_err(|e| {
            self.log.debug(format_args!(
                "Not enough bytes available to decode {} packet.",
                what
            ));
            e
        })
    }

    /// Counts zero bits from the header on until the first set bit.
    fn sync(&mut self) -> Result<TracePacket, Incomplete> {
        let mut zero_bytes = 1;
        let byte = loop {
            match self.buffer.peek_byte(zero_bytes) {
                None => {
                    self.log.debug(format_args!(
                        "Not enough bytes available to decode synchronization packet."
                    ));
                    return Err(Incomplete);
                }
                Some(0) => zero_bytes += 1,
                Some(b) => break b,
            }
        };

        let zeros = zero_bytes * 8 + byte.view_bits::<Lsb0>().leading_zeros();
        if zeros < SYNC_MIN_ZEROS {
            self.log
                .warn(format_args!("{}", MalformedPacket::InvalidSync(zeros)));
            return Ok(TracePacket::Unknown { size: zero_bytes });
        }

        self.log
            .debug(format_args!("Synchronization packet decoded."));
        Ok(TracePacket::Synchronization { size: zeros + 1 })
    }

    #[bitmatch]
    fn local_timestamp(&mut self, header: u8) -> Result<TracePacket, Incomplete> {
        #[bitmatch]
        let "cttt_????" = header;

        if c == 0 {
            self.log
                .debug(format_args!("Local timestamp (LTS2) packet decoded."));
            return Ok(TracePacket::LocalTimestamp {
                size: 1,
                value: t as u32,
                relation: TimestampDataRelation::Sync,
            });
        }

        let (field, len) = self.varint("local timestamp")?;
        if field & !LTS1_TS_MASK != 0 {
            self.log.warn(format_args!(
                "{}",
                MalformedPacket::TrailingBits {
                    kind: "local timestamp (LTS1)",
                    field,
                }
            ));
        }

        self.log
            .debug(format_args!("Local timestamp (LTS1) packet decoded."));
        Ok(TracePacket::LocalTimestamp {
            size: len + 1,
            value: field & LTS1_TS_MASK,
            relation: TimestampDataRelation::from_tc(t),
        })
    }

    fn global_timestamp1(&mut self) -> Result<TracePacket, Incomplete> {
        let (field, len) = self.varint("global timestamp (GTS1)")?;
        if field & !(GTS1_WRAP_MASK | GTS1_CLKCH_MASK | GTS1_TS_MASK) != 0 {
            self.log.warn(format_args!(
                "{}",
                MalformedPacket::TrailingBits {
                    kind: "global timestamp (GTS1)",
                    field,
                }
            ));
        }

        self.log
            .debug(format_args!("Global timestamp (GTS1) packet decoded."));
        Ok(TracePacket::GlobalTimestamp1 {
            size: len + 1,
            value: field & GTS1_TS_MASK,
            clkch: field & GTS1_CLKCH_MASK != 0,
            wrap: field & GTS1_WRAP_MASK != 0,
        })
    }

    fn global_timestamp2(&mut self) -> Result<TracePacket, Incomplete> {
        let (field, len) = self.varint("global timestamp (GTS2)")?;
        if len != GTS2_PAYLOAD_SIZE {
            self.log.warn(format_args!(
                "{}",
                MalformedPacket::InvalidGts2Size(len)
            ));
            return Ok(TracePacket::Unknown { size: 1 });
        }

        if field & !GTS2_TS_MASK != 0 {
            self.log.warn(format_args!(
                "{}",
                MalformedPacket::TrailingBits {
                    kind: "global timestamp (GTS2)",
                    field,
                }
            ));
        }

        self.log
            .debug(format_args!("Global timestamp (GTS2) packet decoded."));
        Ok(TracePacket::GlobalTimestamp2 {
            size: len + 1,
            value: field & GTS2_TS_MASK,
        })
    }

    #[bitmatch]
    fn extension(&mut self, header: u8) -> Result<TracePacket, Incomplete> {
        #[bitmatch]
        let "cppp_?h??" = header;

        let mut size = 1;
        let mut value = p as u32;
        if c != 0 {
            let (field, len) = self.varint("extension")?;
            value |= field << 3;
            size += len;
        }

        self.log.debug(format_args!("Extension packet decoded."));
        Ok(TracePacket::Extension {
            size,
            source: if h != 0 {
                ExtensionSource::Hardware
            } else {
                ExtensionSource::Itm
            },
            value,
        })
    }

    /// Reads the address and the little-endian payload of a source
    /// packet.
    #[bitmatch]
    fn source(&mut self, header: u8, what: &str) -> Result<HardwareSource, Incomplete> {
        #[bitmatch]
        let "aaaa_a?ss" = header;

        // See (Appendix D4.2.8, Table D4-4)
        let len = match s {
            0b01 => 1,
            0b10 => 2,
            _ => 4,
        };

        let mut payload = [0; MAX_PAYLOAD_SIZE];
        if self.buffer.peek(&mut payload[..len], 1).is_err() {
            self.log.debug(format_args!(
                "Not enough bytes available to decode {} packet.",
                what
            ));
            return Err(Incomplete);
        }

        Ok(HardwareSource {
            size: len + 1,
            address: a,
            payload,
            value: u32::from_le_bytes(payload),
        })
    }

    fn instrumentation(&mut self, header: u8) -> Result<TracePacket, Incomplete> {
        let HardwareSource {
            size,
            address,
            value,
            ..
        } = self.source(header, "instrumentation")?;

        self.log
            .debug(format_args!("Instrumentation packet decoded."));
        Ok(TracePacket::Instrumentation {
            size,
            address,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(bytes: &[u8]) -> RingBuffer<'static> {
        let mut buffer = RingBuffer::with_capacity(64).unwrap();
        buffer.write(bytes).unwrap();
        buffer
    }

    fn decode_one(bytes: &[u8]) -> Result<TracePacket, Incomplete> {
        let buffer = buffer_with(bytes);
        let mut log = Logger::new();
        let header = buffer.peek_byte(0).unwrap();
        PacketDecoder::new(&buffer, &mut log).decode(header)
    }

    #[test]
    fn classify_precedence() {
        for (header, kind) in [
            (0x00, PacketKind::Synchronization),
            (0x70, PacketKind::Overflow),
            (0x10, PacketKind::LocalTimestamp),
            (0x60, PacketKind::LocalTimestamp),
            (0xc0, PacketKind::LocalTimestamp),
            (0xf0, PacketKind::LocalTimestamp),
            (0x08, PacketKind::Extension),
            (0x8c, PacketKind::Extension),
            (0x94, PacketKind::GlobalTimestamp1),
            (0xb4, PacketKind::GlobalTimestamp2),
            (0x01, PacketKind::Instrumentation),
            (0xfb, PacketKind::Instrumentation),
            (0x05, PacketKind::HardwareSource),
            (0x47, PacketKind::HardwareSource),
            (0x04, PacketKind::Unknown),
            (0x80, PacketKind::Unknown),
            (0x84, PacketKind::Unknown),
        ]
        .iter()
        {
            assert_eq!(classify(*header), *kind, "header {:#04x}", header);
        }
    }

    #[test]
    fn varint() {
        #[rustfmt::skip]
        let cases: &[(&[u8], u32, usize)] = &[
            (&[0xff, 0b0000_0001], 1, 1),
            (&[0xff, 0b1000_0001, 0b0000_0010], 0b10_0000001, 2),
            (&[0xff, 0b1111_1111, 0b1111_1111, 0b1111_1111, 0b1111_1111], 0x1fff_ffff, 4),
        ];

        for (bytes, value, len) in cases.iter() {
            let buffer = buffer_with(bytes);
            assert_eq!(decode_varint(&buffer), Ok((*value, *len)));
        }
    }

    #[test]
    fn varint_incomplete() {
        let buffer = buffer_with(&[0xc0, 0x80, 0x80]);
        assert_eq!(decode_varint(&buffer), Err(Incomplete));

        let buffer = buffer_with(&[0xc0]);
        assert_eq!(decode_varint(&buffer), Err(Incomplete));
    }

    #[test]
    fn sync_threshold() {
        let mut bytes = vec![0; 6];
        bytes.push(0b0000_0001);
        assert_eq!(
            decode_one(&bytes),
            Ok(TracePacket::Synchronization { size: 49 })
        );

        let mut bytes = vec![0; 5];
        bytes.push(0b1000_0000);
        assert_eq!(decode_one(&bytes), Ok(TracePacket::Unknown { size: 5 }));

        assert_eq!(decode_one(&[0, 0, 0]), Err(Incomplete));
    }

    #[test]
    fn sync_lowest_set_bit() {
        let mut bytes = vec![0; 6];
        bytes.push(0b1010_0000);
        assert_eq!(
            decode_one(&bytes),
            Ok(TracePacket::Synchronization { size: 54 })
        );
    }

    #[test]
    fn lts_trailing_bits_are_masked() {
        assert_eq!(
            decode_one(&[0xd0, 0xff, 0xff, 0xff, 0xff]),
            Ok(TracePacket::LocalTimestamp {
                size: 5,
                value: LTS1_TS_MASK,
                relation: TimestampDataRelation::TimestampDelayed,
            })
        );
    }

    #[test]
    fn gts2_wrong_length_is_unknown() {
        assert_eq!(
            decode_one(&[0xb4, 0x01]),
            Ok(TracePacket::Unknown { size: 1 })
        );
    }

    #[test]
    fn source_incomplete() {
        assert_eq!(decode_one(&[0x03, 0x11, 0x22]), Err(Incomplete));
        assert_eq!(decode_one(&[0x0e, 0x11]), Err(Incomplete));
    }
}
