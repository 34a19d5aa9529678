//! ECUReset (0x11)

use log::warn;

use crate::protocol::{ResetType, UdsCommand, UdsError};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Schedules an ECU reset. On a positive hook outcome the engine
    /// latches [crate::server::EcuStatus::ecu_reset_scheduled] and stops
    /// consuming requests; the platform performs the actual reset.
    pub(crate) fn ecu_reset(&mut self, req: &[u8], resp: &mut Response) -> Result<(), UdsError> {
        let reset_byte = req[1] & 0x3F;
        let status = self.status();
        let Some(hook) = self.handlers.ecu_reset.as_mut() else {
            // an ECU that speaks UDS but has no reset path is miswired,
            // which is a different failure than "service not implemented"
            warn!("ECUReset requested but no reset hook is configured");
            return Err(UdsError::GeneralProgrammingFailure);
        };
        let reset_type = ResetType::from(reset_byte);
        let power_down_time = hook(&status, reset_type)?;

        self.state.ecu_reset_scheduled = true;

        resp.push(UdsCommand::ECUReset.response_sid())?;
        resp.push(reset_byte)?;
        if reset_type == ResetType::EnableRapidPowerShutDown {
            resp.push(power_down_time)?;
        }
        Ok(())
    }
}
