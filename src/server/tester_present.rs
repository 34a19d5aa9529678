//! TesterPresent (0x3E)

use crate::protocol::{UdsCommand, UdsError};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Keeps the active session alive by pushing the S3 deadline out. No
    /// hook is involved; the engine answers by itself.
    pub(crate) fn tester_present(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        self.refresh_s3();
        resp.push(UdsCommand::TesterPresent.response_sid())?;
        resp.push(req[1] & 0x3F)?;
        Ok(())
    }
}
