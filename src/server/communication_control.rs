//! CommunicationControl (0x28)

use crate::protocol::{SUPPRESS_POS_RSP_BIT, UdsCommand, UdsError};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Adjusts which message kinds the ECU transmits/receives on its
    /// application buses. The communicationType byte is passed to the hook
    /// uninterpreted.
    pub(crate) fn communication_control(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        if req.len() < 3 {
            return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
        }
        let control_type = req[1] & !SUPPRESS_POS_RSP_BIT;
        let communication_type = req[2];
        let status = self.status();
        let Some(hook) = self.handlers.communication_control.as_mut() else {
            return Err(UdsError::ServiceNotSupported);
        };
        hook(&status, control_type, communication_type)?;

        resp.push(UdsCommand::CommunicationControl.response_sid())?;
        resp.push(control_type)?;
        Ok(())
    }
}
