//! ReadDataByIdentifier (0x22)

use crate::protocol::{UdsCommand, UdsError};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Reads one or more DIDs. The hook is called per DID in request
    /// order; each record is framed as `[did_hi, did_lo, data...]`. The
    /// first DID the hook rejects fails the whole request with that NRC.
    pub(crate) fn read_data_by_identifier(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        if req.len() < 3 || (req.len() - 1) % 2 != 0 {
            return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
        }
        let status = self.status();
        let Some(hook) = self.handlers.read_data_by_identifier.as_mut() else {
            return Err(UdsError::ServiceNotSupported);
        };

        resp.push(UdsCommand::ReadDataByIdentifier.response_sid())?;
        for did in req[1..].chunks_exact(2) {
            let did = u16::from_be_bytes([did[0], did[1]]);
            resp.write(&did.to_be_bytes())?;
            hook(&status, did, resp)?;
        }
        Ok(())
    }
}
