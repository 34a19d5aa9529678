//! SecurityAccess (0x27)
//!
//! Odd sub-functions request a seed, the following even sub-function sends
//! the computed key. A successful key exchange for sub-function `n` grants
//! security level `n - 1`.

use log::{debug, error};

use crate::protocol::{SUPPRESS_POS_RSP_BIT, UdsCommand, UdsError};
use crate::server::{Response, UdsServer};

/// Sub-function values ISO14229 reserves: 0x00, the ISO15764 extended data
/// link security range, and 0x7F.
fn security_level_reserved(level: u8) -> bool {
    matches!(level, 0x00 | 0x43..=0x5E | 0x7F)
}

impl UdsServer {
    pub(crate) fn security_access(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        let sub_function = req[1] & !SUPPRESS_POS_RSP_BIT;
        if security_level_reserved(sub_function) {
            return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
        }
        let status = self.status();
        let Some(handler) = self.handlers.security_access.as_mut() else {
            return Err(UdsError::ServiceNotSupported);
        };

        resp.push(UdsCommand::SecurityAccess.response_sid())?;
        resp.push(sub_function)?;
        if sub_function % 2 == 1 {
            // requestSeed
            handler.generate_seed(&status, sub_function, &req[2..], resp)?;
            if resp.len() <= 2 {
                error!("security access seed for sub-function 0x{sub_function:02X} is empty");
                return Err(UdsError::GeneralProgrammingFailure);
            }
        } else {
            // sendKey
            handler.validate_key(&status, sub_function, &req[2..])?;
            self.state.security_level = sub_function - 1;
            debug!("security level is now {}", self.state.security_level);
        }
        Ok(())
    }
}
