//! TransferData (0x36) and RequestTransferExit (0x37)

use log::{debug, warn};

use crate::protocol::{UdsCommand, UdsError};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Accepts one block of an active download.
    ///
    /// The block sequence counter is only checked (and advanced) when this
    /// is a fresh request: on a response-pending re-entry the very same
    /// request bytes come through again, and counting them twice would
    /// corrupt the sequence.
    pub(crate) fn transfer_data(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        if req.len() < 2 {
            return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
        }
        let status = self.status();
        let in_rcrrp = self.state.rcrrp_in_flight;
        let bsc = req[1];
        let block = &req[2..];

        let outcome = match self.download.as_mut() {
            None => return Err(UdsError::UploadDownloadNotAccepted),
            Some(session) => {
                if !in_rcrrp && bsc != session.block_sequence_counter {
                    warn!(
                        "block sequence mismatch: got 0x{bsc:02X}, expected 0x{:02X}",
                        session.block_sequence_counter
                    );
                    Err(UdsError::RequestSequenceError)
                } else if !in_rcrrp
                    && session.transferred + block.len() > session.requested_size
                {
                    warn!(
                        "block overruns the announced download size of {} bytes",
                        session.requested_size
                    );
                    Err(UdsError::TransferDataSuspended)
                } else {
                    if !in_rcrrp {
                        session.block_sequence_counter =
                            session.block_sequence_counter.wrapping_add(1);
                        session.transferred += block.len();
                    }
                    session.handler.on_transfer(&status, block)
                }
            }
        };

        match outcome {
            Ok(()) => {
                resp.push(UdsCommand::TransferData.response_sid())?;
                resp.push(bsc)?;
                Ok(())
            }
            Err(UdsError::RequestCorrectlyReceivedResponsePending) => {
                Err(UdsError::RequestCorrectlyReceivedResponsePending)
            }
            Err(nrc) => {
                warn!("tearing down download session after {nrc:?}");
                self.download = None;
                Err(nrc)
            }
        }
    }

    /// Closes an active download. `on_exit` runs only here, never on the
    /// error teardown paths.
    pub(crate) fn request_transfer_exit(
        &mut self,
        _req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        let status = self.status();
        let outcome = match self.download.as_mut() {
            None => return Err(UdsError::UploadDownloadNotAccepted),
            Some(session) => {
                resp.push(UdsCommand::RequestTransferExit.response_sid())?;
                session.handler.on_exit(&status, resp)
            }
        };

        match outcome {
            Ok(()) => {
                debug!("download session finished cleanly");
                self.download = None;
                Ok(())
            }
            Err(UdsError::RequestCorrectlyReceivedResponsePending) => {
                Err(UdsError::RequestCorrectlyReceivedResponsePending)
            }
            Err(nrc) => {
                warn!("tearing down download session after {nrc:?} on transfer exit");
                self.download = None;
                Err(nrc)
            }
        }
    }
}
