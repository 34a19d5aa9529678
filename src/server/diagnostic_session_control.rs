//! DiagnosticSessionControl (0x10)

use log::debug;

use crate::protocol::{UdsCommand, UdsError, UdsSessionType};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Switches the diagnostic session and reports the session parameter
    /// record: P2 with 1 ms resolution, P2* with 10 ms resolution.
    pub(crate) fn diagnostic_session_control(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        let target_byte = req[1] & 0x4F;
        let status = self.status();
        let Some(hook) = self.handlers.session_control.as_mut() else {
            return Err(UdsError::ServiceNotSupported);
        };
        let target = UdsSessionType::from(target_byte);
        hook(&status, target)?;

        self.state.session_type = target;
        if target != UdsSessionType::Default {
            // non-default sessions live under S3 supervision from now on
            self.refresh_s3();
        }
        debug!("active session is now {target:?}");

        resp.push(UdsCommand::DiagnosticSessionControl.response_sid())?;
        resp.push(target_byte)?;
        resp.write(&(self.options.p2_ms as u16).to_be_bytes())?;
        resp.write(&((self.options.p2_star_ms / 10) as u16).to_be_bytes())?;
        Ok(())
    }
}
