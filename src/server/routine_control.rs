//! RoutineControl (0x31)

use crate::protocol::{RoutineControlType, SUPPRESS_POS_RSP_BIT, UdsCommand, UdsError};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Starts, stops or queries a routine. The hook may append a
    /// routineStatusRecord after the 4 byte response header.
    pub(crate) fn routine_control(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        if req.len() < 4 {
            return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
        }
        let Some(operation) = RoutineControlType::from_repr(req[1] & !SUPPRESS_POS_RSP_BIT)
        else {
            return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
        };
        let rid = u16::from_be_bytes([req[2], req[3]]);
        let status = self.status();
        let Some(hook) = self.handlers.routine_control.as_mut() else {
            return Err(UdsError::ServiceNotSupported);
        };

        resp.push(UdsCommand::RoutineControl.response_sid())?;
        resp.push(operation as u8)?;
        resp.write(&rid.to_be_bytes())?;
        hook(&status, operation, rid, &req[4..], resp)?;
        Ok(())
    }
}
