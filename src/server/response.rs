//! Response buffer handling
//!
//! Handlers never get a raw `&mut [u8]`; they append through [Response],
//! which enforces the configured transmit buffer capacity. A write that
//! would overflow is reported as [UdsError::GeneralProgrammingFailure],
//! which the dispatcher turns into the mandated negative response.

use log::error;

use crate::protocol::{NEGATIVE_RESPONSE_SID, UdsError};

/// Write-only view of the response PDU under construction.
#[derive(Debug, Default)]
pub struct Response {
    buf: Vec<u8>,
    limit: usize,
}

impl Response {
    pub(crate) fn with_capacity(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit),
            limit,
        }
    }

    /// Appends one byte to the response
    pub fn push(&mut self, byte: u8) -> Result<(), UdsError> {
        self.write(&[byte])
    }

    /// Appends a run of bytes to the response.
    ///
    /// Fails with [UdsError::GeneralProgrammingFailure] when the configured
    /// transmit buffer capacity would be exceeded; nothing is written in
    /// that case.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), UdsError> {
        if self.buf.len() + bytes.len() > self.limit {
            error!(
                "response overflow: {} + {} bytes exceeds the {} byte transmit buffer",
                self.buf.len(),
                bytes.len(),
                self.limit
            );
            return Err(UdsError::GeneralProgrammingFailure);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing has been written (or the response was dropped)
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    /// Replaces whatever was written with the 3 byte negative response
    /// `{0x7F, sid, nrc}`. Constructor validation guarantees the transmit
    /// buffer holds at least this much.
    pub(crate) fn set_negative(&mut self, sid: u8, nrc: UdsError) {
        self.buf.clear();
        self.buf
            .extend_from_slice(&[NEGATIVE_RESPONSE_SID, sid, nrc.into()]);
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
