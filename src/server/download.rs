//! Download transfer state (SIDs 0x34 / 0x36 / 0x37)
//!
//! A download session exists from a positive RequestDownload until either a
//! positive RequestTransferExit, any error during TransferData or
//! RequestTransferExit, or a server reset. While a session is active another
//! RequestDownload is refused with NRC 0x22.

use core::fmt;

use crate::protocol::UdsError;
use crate::server::{EcuStatus, Response};

/// The decoded fields of a RequestDownload (0x34) request, handed to the
/// application's request-download hook.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// dataFormatIdentifier byte (compression / encryption method); 0x00
    /// means neither
    pub data_format_identifier: u8,
    /// Start address the tester wants to write to. The engine treats this
    /// as an opaque unsigned value; its interpretation belongs to the
    /// application.
    pub memory_address: usize,
    /// Total number of bytes the tester announced it will transfer
    pub memory_size: usize,
}

/// Receiver for the data blocks of one download, supplied by the
/// application when it grants a RequestDownload.
pub trait TransferHandler {
    /// Called once per accepted TransferData block, in block order.
    ///
    /// Returning [UdsError::RequestCorrectlyReceivedResponsePending] yields:
    /// the engine answers 0x78 and calls this method again with the *same*
    /// block once the pending reply has left the wire, so the
    /// implementation must be prepared to see one block repeatedly until it
    /// returns a terminal code. Any other error tears the session down.
    fn on_transfer(&mut self, status: &EcuStatus, block: &[u8]) -> Result<(), UdsError>;

    /// Called on a clean RequestTransferExit. May append a
    /// transferResponseParameterRecord to the reply. Not called when the
    /// session is torn down by an error.
    fn on_exit(&mut self, status: &EcuStatus, record: &mut Response) -> Result<(), UdsError>;
}

/// What the application returns when it accepts a RequestDownload.
pub struct DownloadGrant {
    /// Receiver for the transfer data blocks
    pub handler: Box<dyn TransferHandler>,
    /// Largest TransferData request (including SID and block sequence
    /// counter) the ECU will accept. Must be at least 3; the engine clamps
    /// it to the ISO-TP MTU of 4095 bytes.
    pub max_block_length: u16,
}

impl fmt::Debug for DownloadGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadGrant")
            .field("max_block_length", &self.max_block_length)
            .finish_non_exhaustive()
    }
}

pub(crate) struct DownloadSession {
    pub(crate) handler: Box<dyn TransferHandler>,
    pub(crate) requested_size: usize,
    pub(crate) transferred: usize,
    pub(crate) block_sequence_counter: u8,
}

impl DownloadSession {
    pub(crate) fn new(handler: Box<dyn TransferHandler>, requested_size: usize) -> Self {
        Self {
            handler,
            requested_size,
            transferred: 0,
            block_sequence_counter: 1,
        }
    }
}

impl fmt::Debug for DownloadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadSession")
            .field("requested_size", &self.requested_size)
            .field("transferred", &self.transferred)
            .field("block_sequence_counter", &self.block_sequence_counter)
            .finish_non_exhaustive()
    }
}
