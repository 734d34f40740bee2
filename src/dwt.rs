//! Refinement of hardware source packets into Data Watchpoint and Trace
//! (DWT) packets, keyed by the discriminator ID in the packet address.

use bitmatch::bitmatch;

use crate::error::MalformedPacket;
use crate::logging::Logger;
use crate::packet::{ExceptionAction, MemoryAccessType, TracePacket, MAX_PAYLOAD_SIZE};

const EVENT_COUNTER_ID: u8 = 0;
const EVENT_COUNTER_SIZE: usize = 2;

const EXCEPTION_TRACE_ID: u8 = 1;
const EXCEPTION_TRACE_SIZE: usize = 3;

const PC_SAMPLE_ID: u8 = 2;
const PC_SLEEP_SIZE: usize = 2;
const PC_SAMPLE_SIZE: usize = 5;

const PC_VALUE_MASK: u8 = 0x19;
const PC_VALUE_ID: u8 = 0x08;
const PC_VALUE_SIZE: usize = 5;

const ADDRESS_OFFSET_MASK: u8 = 0x19;
const ADDRESS_OFFSET_ID: u8 = 0x09;
const ADDRESS_OFFSET_SIZE: usize = 3;

const DATA_VALUE_MASK: u8 = 0x18;
const DATA_VALUE_ID: u8 = 0x10;

/// A fully read hardware source packet, before refinement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HardwareSource {
    /// Packet size including the header, in bytes.
    pub size: usize,
    pub address: u8,
    pub payload: [u8; MAX_PAYLOAD_SIZE],
    pub value: u32,
}

impl HardwareSource {
    fn generic(&self) -> TracePacket {
        TracePacket::Hardware {
            size: self.size,
            address: self.address,
            value: self.value,
        }
    }

    fn expect_size(&self, kind: &'static str, size: usize) -> Result<(), MalformedPacket> {
        if self.size != size {
            return Err(MalformedPacket::InvalidSize {
                kind,
                size: self.size,
            });
        }

        Ok(())
    }

    /// Comparator number; bits\[2:1\] of the discriminator ID.
    fn comparator(&self) -> u8 {
        (self.address & 0x06) >> 1
    }
}

/// Refines `hw` into a DWT packet. Only the first layout whose
/// discriminator matches is tried; if its size or contents are
/// invalid, a warning is logged and the generic hardware packet is
/// returned.
pub(crate) fn decode(hw: &HardwareSource, log: &mut Logger) -> TracePacket {
    let refined = match hw.address {
        EVENT_COUNTER_ID => event_counter(hw),
        EXCEPTION_TRACE_ID => exception_trace(hw),
        PC_SAMPLE_ID => pc_sample(hw),
        a if a & PC_VALUE_MASK == PC_VALUE_ID => pc_value(hw),
        a if a & ADDRESS_OFFSET_MASK == ADDRESS_OFFSET_ID => address_offset(hw),
        a if a & DATA_VALUE_MASK == DATA_VALUE_ID => Ok(data_value(hw)),
        _ => {
            log.debug(format_args!("Hardware source packet decoded."));
            return hw.generic();
        }
    };

    match refined {
        Ok(packet) => {
            log.debug(format_args!("DWT packet decoded: {:?}.", packet));
            packet
        }
        Err(e) => {
            log.warn(format_args!("{}", e));
            hw.generic()
        }
    }
}

#[bitmatch]
fn event_counter(hw: &HardwareSource) -> Result<TracePacket, MalformedPacket> {
    hw.expect_size("event counter", EVENT_COUNTER_SIZE)?;

    #[bitmatch]
    let "??yf_lsec" = hw.payload[0];
    Ok(TracePacket::EventCounter {
        cpi: c != 0,
        exc: e != 0,
        sleep: s != 0,
        lsu: l != 0,
        fold: f != 0,
        cyc: y != 0,
    })
}

#[bitmatch]
fn exception_trace(hw: &HardwareSource) -> Result<TracePacket, MalformedPacket> {
    hw.expect_size("exception trace", EXCEPTION_TRACE_SIZE)?;

    #[bitmatch]
    let "??ff_???e" = hw.payload[1];
    Ok(TracePacket::ExceptionTrace {
        exception: ((e as u16) << 8) | hw.payload[0] as u16,
        action: ExceptionAction::from_function(f),
    })
}

fn pc_sample(hw: &HardwareSource) -> Result<TracePacket, MalformedPacket> {
    match hw.size {
        PC_SLEEP_SIZE if hw.value == 0 => Ok(TracePacket::PcSample { pc: None }),
        PC_SLEEP_SIZE => Err(MalformedPacket::InvalidPcSleep(hw.value)),
        PC_SAMPLE_SIZE => Ok(TracePacket::PcSample { pc: Some(hw.value) }),
        size => Err(MalformedPacket::InvalidSize {
            kind: "periodic PC sample",
            size,
        }),
    }
}

fn pc_value(hw: &HardwareSource) -> Result<TracePacket, MalformedPacket> {
    hw.expect_size("data trace PC value", PC_VALUE_SIZE)?;

    Ok(TracePacket::PcValue {
        comparator: hw.comparator(),
        pc: hw.value,
    })
}

fn address_offset(hw: &HardwareSource) -> Result<TracePacket, MalformedPacket> {
    hw.expect_size("data trace address offset", ADDRESS_OFFSET_SIZE)?;

    Ok(TracePacket::AddressOffset {
        comparator: hw.comparator(),
        offset: hw.value as u16,
    })
}

fn data_value(hw: &HardwareSource) -> TracePacket {
    TracePacket::DataValue {
        size: hw.size,
        comparator: hw.comparator(),
        access_type: if hw.address & 0x01 != 0 {
            MemoryAccessType::Write
        } else {
            MemoryAccessType::Read
        },
        value: hw.value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hw(address: u8, payload: &[u8]) -> HardwareSource {
        let mut bytes = [0; MAX_PAYLOAD_SIZE];
        bytes[..payload.len()].copy_from_slice(payload);
        HardwareSource {
            size: payload.len() + 1,
            address,
            payload: bytes,
            value: u32::from_le_bytes(bytes),
        }
    }

    fn refine(hw: &HardwareSource) -> TracePacket {
        decode(hw, &mut Logger::new())
    }

    #[test]
    fn event_counter_flags() {
        assert_eq!(
            refine(&hw(0, &[0b0010_1010])),
            TracePacket::EventCounter {
                cpi: false,
                exc: true,
                sleep: false,
                lsu: true,
                fold: false,
                cyc: true,
            }
        );
    }

    #[test]
    fn exception_number_is_nine_bits() {
        assert_eq!(
            refine(&hw(1, &[0x10, 0b0001_0001])),
            TracePacket::ExceptionTrace {
                exception: 0x110,
                action: ExceptionAction::Entered,
            }
        );
        assert_eq!(
            refine(&hw(1, &[0x03, 0b0000_0000])),
            TracePacket::ExceptionTrace {
                exception: 3,
                action: ExceptionAction::Reserved,
            }
        );
    }

    #[test]
    fn pc_sample_sizes() {
        assert_eq!(
            refine(&hw(2, &[0x00])),
            TracePacket::PcSample { pc: None }
        );
        assert_eq!(
            refine(&hw(2, &[0x78, 0x56, 0x34, 0x12])),
            TracePacket::PcSample {
                pc: Some(0x1234_5678)
            }
        );
        // Non-zero sleep sample and an impossible size stay generic.
        assert_eq!(
            refine(&hw(2, &[0x01])),
            TracePacket::Hardware {
                size: 2,
                address: 2,
                value: 1,
            }
        );
        assert_eq!(
            refine(&hw(2, &[0x01, 0x00])),
            TracePacket::Hardware {
                size: 3,
                address: 2,
                value: 1,
            }
        );
    }

    #[test]
    fn data_trace_layouts() {
        assert_eq!(
            refine(&hw(0b01110, &[1, 2, 3, 4])),
            TracePacket::PcValue {
                comparator: 3,
                pc: 0x0403_0201,
            }
        );
        assert_eq!(
            refine(&hw(0b01011, &[0x34, 0x12])),
            TracePacket::AddressOffset {
                comparator: 1,
                offset: 0x1234,
            }
        );
        assert_eq!(
            refine(&hw(0b10101, &[0xaa])),
            TracePacket::DataValue {
                size: 2,
                comparator: 2,
                access_type: MemoryAccessType::Write,
                value: 0xaa,
            }
        );
        assert_eq!(
            refine(&hw(0b10010, &[0xaa, 0xbb, 0xcc, 0xdd])),
            TracePacket::DataValue {
                size: 5,
                comparator: 1,
                access_type: MemoryAccessType::Read,
                value: 0xddcc_bbaa,
            }
        );
    }

    #[test]
    fn first_match_wins() {
        // PC value layout with the wrong size does not fall through.
        assert_eq!(
            refine(&hw(0b01000, &[1, 2])),
            TracePacket::Hardware {
                size: 3,
                address: 0b01000,
                value: 0x0201,
            }
        );
        // Event counter with the wrong size.
        assert_eq!(
            refine(&hw(0, &[1, 2])),
            TracePacket::Hardware {
                size: 3,
                address: 0,
                value: 0x0201,
            }
        );
    }

    #[test]
    fn unmatched_address_is_generic() {
        assert_eq!(
            refine(&hw(3, &[0x42])),
            TracePacket::Hardware {
                size: 2,
                address: 3,
                value: 0x42,
            }
        );
        assert_eq!(
            refine(&hw(0b11000, &[0x42])),
            TracePacket::Hardware {
                size: 2,
                address: 0b11000,
                value: 0x42,
            }
        );
    }
}
