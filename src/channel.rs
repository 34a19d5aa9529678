//! Module for the transport collaborators of a UDS server
//!
//! The engine talks to the outside world through three traits:
//! * [CanBus] - the raw CAN driver the ECU receives frames from
//! * [IsoTpLink] - an ISO15765-2 segmentation/reassembly link. A server
//!   needs two of these, one for physically addressed and one for
//!   functionally addressed traffic
//! * [Clock] - a monotonic millisecond time source
//!
//! None of these are implemented here against real hardware; the
//! [crate::simulation] module contains in-memory implementations for tests.

use thiserror::Error;

/// Largest PDU an ISO15765-2 link can carry (ISO 15765-2 §5.3.3).
pub const ISO_TP_MTU: usize = 4095;

/// Communication channel result
pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, Error)]
/// Error produced by a communication channel
pub enum ChannelError {
    /// The channel's receive buffer holds no complete PDU
    #[error("channel's receive buffer is empty")]
    BufferEmpty,
    /// The channel's transmit buffer cannot take another PDU
    #[error("channel's transmit buffer is full")]
    BufferFull,
    /// A PDU did not fit in the buffer offered to the channel
    #[error("PDU of {size} bytes does not fit in {limit} bytes")]
    PduTooLarge {
        /// Size of the offending PDU
        size: usize,
        /// Capacity it had to fit in
        limit: usize,
    },
    /// Fault in the underlying interface (driver specific)
    #[error("underlying interface fault: {0}")]
    InterfaceError(String),
}

/// Transmission state of an [IsoTpLink]'s send queue
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SendStatus {
    /// Nothing queued, the last PDU (if any) left the wire completely
    #[default]
    Idle,
    /// A PDU is still being segmented onto the bus
    InProgress,
}

/// A classic CAN frame (up to 8 data bytes)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CanFrame {
    id: u32,
    dlc: u8,
    data: [u8; 8],
}

impl CanFrame {
    /// Creates a new CAN frame. Data beyond 8 bytes is truncated.
    pub fn new(id: u32, data: &[u8]) -> Self {
        let dlc = data.len().min(8);
        let mut buf = [0u8; 8];
        buf[..dlc].copy_from_slice(&data[..dlc]);
        Self {
            id,
            dlc: dlc as u8,
            data: buf,
        }
    }

    /// Arbitration ID of the frame
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Payload bytes of the frame
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}

/// Raw CAN driver interface.
///
/// The server drains at most one frame per poll tick and routes it to the
/// matching ISO-TP link by arbitration ID. Transmission is performed by the
/// links themselves; [CanBus::tx] exists so link implementations built on
/// top of this trait have a way out onto the bus.
pub trait CanBus {
    /// Polls the driver for one received frame. Returns `None` when the
    /// hardware receive queue is empty.
    fn rx_poll(&mut self) -> Option<CanFrame>;

    /// Queues one frame for transmission
    fn tx(&mut self, frame: &CanFrame) -> ChannelResult<()>;
}

/// An ISO15765-2 (ISO-TP) link carrying UDS PDUs for one addressing scheme.
///
/// The server owns two links (physical and functional) and drives both from
/// its poll loop: incoming CAN frames are pushed in via
/// [IsoTpLink::on_can_frame], the link advances its own timers and flow
/// control in [IsoTpLink::poll], and reassembled PDUs are pulled out with
/// [IsoTpLink::receive].
pub trait IsoTpLink {
    /// Configures the link with its transmit and receive arbitration IDs.
    /// Called once by the server during construction, before any traffic.
    fn init(&mut self, send_id: u32, recv_id: u32) -> ChannelResult<()>;

    /// Feeds one received CAN frame (already matched to this link's receive
    /// ID) into the reassembly state machine
    fn on_can_frame(&mut self, frame: &CanFrame);

    /// Advances link internal timers and flow control
    fn poll(&mut self);

    /// Queues one complete UDS PDU for segmented transmission
    fn send(&mut self, pdu: &[u8]) -> ChannelResult<()>;

    /// Copies a completely reassembled PDU into `buf` and returns its size.
    ///
    /// Returns [ChannelError::BufferEmpty] when no complete PDU is waiting,
    /// and [ChannelError::PduTooLarge] when `buf` cannot hold it.
    fn receive(&mut self, buf: &mut [u8]) -> ChannelResult<usize>;

    /// Reports whether the send queue is still segmenting a PDU onto the
    /// bus. The server uses the `InProgress -> Idle` edge to re-enter a
    /// handler after a response-pending (NRC 0x78) reply went out.
    fn send_status(&self) -> SendStatus;
}

/// Monotonic millisecond time source.
///
/// The value wraps around after `u32::MAX` ms (roughly 49.7 days); the
/// server compares deadlines with wrapping arithmetic so the rollover is
/// harmless.
pub trait Clock {
    /// Current time in milliseconds
    fn now_ms(&self) -> u32;
}
