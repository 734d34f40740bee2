//! Defines SWO packets and their possible contents.

pub use cortex_m::peripheral::scb::VectActive;

/// Maximum payload size of a packet in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 4;

/// Maximum size of any packet except synchronization packets, in bytes.
/// Trailing data drained at end of stream is delivered in chunks of at
/// most this size.
pub const MAX_PACKET_SIZE: usize = 1 + MAX_PAYLOAD_SIZE;

/// The top-level kind of a packet as determined from its header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketKind {
    Synchronization,
    Overflow,
    LocalTimestamp,
    GlobalTimestamp1,
    GlobalTimestamp2,
    Extension,
    Instrumentation,
    HardwareSource,
    Unknown,
}

/// The set of packets that can be decoded.
///
/// Every packet has a [size](TracePacket::size): in bits for
/// [`Synchronization`](TracePacket::Synchronization), in bytes
/// including the header for all other packets.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TracePacket {
    // Synchronization packet category
    /// A unique pattern of at least 48 zero bits followed by a set bit,
    /// used to recover byte alignment of the stream.
    Synchronization {
        /// Packet size in bits, including the terminating set bit.
        size: usize,
    },

    // Protocol packet category
    /// The ITM or DWT output buffer overflowed, or the local timestamp
    /// counter wrapped.
    Overflow,

    /// A delta timestamp measuring the interval since the last local
    /// timestamp.
    LocalTimestamp {
        size: usize,

        /// Timestamp value; at most 28 bits wide.
        value: u32,

        /// Relationship between the generation of this timestamp and
        /// the corresponding source packet.
        relation: TimestampDataRelation,
    },

    /// Lower-order bits of an absolute timestamp from the global
    /// timestamp clock.
    GlobalTimestamp1 {
        size: usize,

        /// Bits\[25:0\] of the global timestamp.
        value: u32,

        /// Set if the system has asserted a clock change input since
        /// the last global timestamp.
        clkch: bool,

        /// Set if the higher-order bits output by the last GTS2 have
        /// changed.
        wrap: bool,
    },

    /// Higher-order bits of an absolute timestamp from the global
    /// timestamp clock.
    GlobalTimestamp2 {
        size: usize,

        /// Bits\[47:26\] of the global timestamp.
        value: u32,
    },

    /// Additional information about the source of subsequent packets,
    /// e.g. the stimulus port page.
    Extension {
        size: usize,
        source: ExtensionSource,
        value: u32,
    },

    // Source packet category
    /// Payload written to an ITM stimulus port.
    Instrumentation {
        size: usize,

        /// Stimulus port number.
        address: u8,

        /// Payload as a little-endian integer.
        value: u32,
    },

    /// A hardware source packet that did not match any DWT packet
    /// layout.
    Hardware {
        size: usize,

        /// Discriminator ID.
        address: u8,

        /// Payload as a little-endian integer.
        value: u32,
    },

    /// One or more DWT event counters have wrapped.
    EventCounter {
        /// CPICNT wrap.
        cpi: bool,
        /// EXCCNT wrap.
        exc: bool,
        /// SLEEPCNT wrap.
        sleep: bool,
        /// LSUCNT wrap.
        lsu: bool,
        /// FOLDCNT wrap.
        fold: bool,
        /// POSTCNT wrap.
        cyc: bool,
    },

    /// The processor has entered, exited or returned to an exception.
    ExceptionTrace {
        /// Exception number; 9 bits wide.
        exception: u16,
        action: ExceptionAction,
    },

    /// Periodic PC sample.
    PcSample {
        /// The sampled PC. `None` if the processor was sleeping.
        pc: Option<u32>,
    },

    /// A DWT comparator matched a PC value.
    PcValue { comparator: u8, pc: u32 },

    /// A DWT comparator matched an address.
    AddressOffset {
        comparator: u8,

        /// Bits\[15:0\] of the data address.
        offset: u16,
    },

    /// A DWT comparator matched a data value.
    DataValue {
        size: usize,
        comparator: u8,
        access_type: MemoryAccessType,
        value: u32,
    },

    /// Data that could not be decoded as any packet.
    Unknown { size: usize },
}

/// Indicates the relationship between the generation of a local
/// timestamp packet and the corresponding ITM or DWT source packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimestampDataRelation {
    /// The timestamp is synchronous to the source packet.
    Sync,

    /// The timestamp packet is delayed relative to the source packet.
    TimestampDelayed,

    /// The source packet is delayed relative to the associated event.
    DataDelayed,

    /// Both the timestamp and the source packet are delayed.
    BothDelayed,
}

impl TimestampDataRelation {
    /// Maps the two TC bits of an LTS1 header.
    pub(crate) fn from_tc(tc: u8) -> Self {
        match tc & 0b11 {
            0b00 => TimestampDataRelation::Sync,
            0b01 => TimestampDataRelation::TimestampDelayed,
            0b10 => TimestampDataRelation::DataDelayed,
            _ => TimestampDataRelation::BothDelayed,
        }
    }
}

/// Source of an extension packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExtensionSource {
    /// Instrumentation Trace Macrocell.
    Itm,

    /// Hardware source.
    Hardware,
}

/// Denotes the action taken by the processor by a given exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExceptionAction {
    /// Reserved function code.
    Reserved,

    /// Exception was entered.
    Entered,

    /// Exception was exited.
    Exited,

    /// Exception was returned to.
    Returned,
}

impl ExceptionAction {
    pub(crate) fn from_function(function: u8) -> Self {
        match function & 0b11 {
            0b01 => ExceptionAction::Entered,
            0b10 => ExceptionAction::Exited,
            0b11 => ExceptionAction::Returned,
            _ => ExceptionAction::Reserved,
        }
    }
}

/// Denotes the type of memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryAccessType {
    /// Memory was read.
    Read,

    /// Memory was written.
    Write,
}

impl TracePacket {
    /// The packet size: in bits for synchronization packets, in bytes
    /// including the header for all others.
    pub fn size(&self) -> usize {
        match self {
            TracePacket::Synchronization { size }
            | TracePacket::LocalTimestamp { size, .. }
            | TracePacket::GlobalTimestamp1 { size, .. }
            | TracePacket::GlobalTimestamp2 { size, .. }
            | TracePacket::Extension { size, .. }
            | TracePacket::Instrumentation { size, .. }
            | TracePacket::Hardware { size, .. }
            | TracePacket::DataValue { size, .. }
            | TracePacket::Unknown { size } => *size,
            TracePacket::Overflow => 1,
            TracePacket::EventCounter { .. } => 2,
            TracePacket::ExceptionTrace { .. } | TracePacket::AddressOffset { .. } => 3,
            TracePacket::PcSample { pc: None } => 2,
            TracePacket::PcSample { pc: Some(_) } | TracePacket::PcValue { .. } => 5,
        }
    }

    /// Number of stream bytes this packet occupies. Synchronization
    /// packets are rounded up to whole bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            TracePacket::Synchronization { size } => (size + 7) / 8,
            packet => packet.size(),
        }
    }

    /// The top-level kind of this packet. DWT packets are all
    /// [`HardwareSource`](PacketKind::HardwareSource).
    pub fn kind(&self) -> PacketKind {
        match self {
            TracePacket::Synchronization { .. } => PacketKind::Synchronization,
            TracePacket::Overflow => PacketKind::Overflow,
            TracePacket::LocalTimestamp { .. } => PacketKind::LocalTimestamp,
            TracePacket::GlobalTimestamp1 { .. } => PacketKind::GlobalTimestamp1,
            TracePacket::GlobalTimestamp2 { .. } => PacketKind::GlobalTimestamp2,
            TracePacket::Extension { .. } => PacketKind::Extension,
            TracePacket::Instrumentation { .. } => PacketKind::Instrumentation,
            TracePacket::Hardware { .. }
            | TracePacket::EventCounter { .. }
            | TracePacket::ExceptionTrace { .. }
            | TracePacket::PcSample { .. }
            | TracePacket::PcValue { .. }
            | TracePacket::AddressOffset { .. }
            | TracePacket::DataValue { .. } => PacketKind::HardwareSource,
            TracePacket::Unknown { .. } => PacketKind::Unknown,
        }
    }

    /// Maps the exception number of an exception trace packet to the
    /// active vector it denotes. `None` for other packets and for
    /// exception numbers that do not fit the vector table.
    pub fn vect_active(&self) -> Option<VectActive> {
        match self {
            TracePacket::ExceptionTrace { exception, .. } if *exception <= 0xff => {
                VectActive::from(*exception as u8)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_m::peripheral::scb::Exception;

    #[test]
    fn sizes() {
        assert_eq!(TracePacket::Overflow.size(), 1);
        assert_eq!(TracePacket::PcSample { pc: None }.size(), 2);
        assert_eq!(TracePacket::PcSample { pc: Some(0) }.size(), 5);
        assert_eq!(TracePacket::Unknown { size: 3 }.byte_len(), 3);

        let sync = TracePacket::Synchronization { size: 49 };
        assert_eq!(sync.size(), 49);
        assert_eq!(sync.byte_len(), 7);
        assert_eq!(TracePacket::Synchronization { size: 48 }.byte_len(), 6);
    }

    #[test]
    fn kinds() {
        assert_eq!(
            TracePacket::PcValue { comparator: 1, pc: 0 }.kind(),
            PacketKind::HardwareSource
        );
        assert_eq!(
            TracePacket::Instrumentation {
                size: 2,
                address: 0,
                value: 0
            }
            .kind(),
            PacketKind::Instrumentation
        );
    }

    #[test]
    fn exception_vectors() {
        let trace = |exception| TracePacket::ExceptionTrace {
            exception,
            action: ExceptionAction::Entered,
        };

        assert_eq!(
            trace(15).vect_active(),
            Some(VectActive::Exception(Exception::SysTick))
        );
        assert!(matches!(
            trace(48).vect_active(),
            Some(VectActive::Interrupt { .. })
        ));
        assert_eq!(trace(0x1ff).vect_active(), None);
        assert_eq!(TracePacket::Overflow.vect_active(), None);
    }
}
