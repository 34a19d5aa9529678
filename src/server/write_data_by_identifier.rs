//! WriteDataByIdentifier (0x2E)

use crate::protocol::{UdsCommand, UdsError};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Writes one DID. The request must carry at least one data byte; the
    /// positive response echoes the DID.
    pub(crate) fn write_data_by_identifier(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        if req.len() < 4 {
            return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
        }
        let status = self.status();
        let Some(hook) = self.handlers.write_data_by_identifier.as_mut() else {
            return Err(UdsError::ServiceNotSupported);
        };

        let did = u16::from_be_bytes([req[1], req[2]]);
        hook(&status, did, &req[3..])?;

        resp.push(UdsCommand::WriteDataByIdentifier.response_sid())?;
        resp.write(&did.to_be_bytes())?;
        Ok(())
    }
}
