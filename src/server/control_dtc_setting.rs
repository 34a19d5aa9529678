//! ControlDTCSetting (0x85)

use crate::protocol::{UdsCommand, UdsError};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Enables/disables DTC setting. Without a hook the engine accepts
    /// blindly; with one, the hook decides and its NRC is forwarded.
    pub(crate) fn control_dtc_setting(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        let setting_type = req[1] & 0x3F;
        let status = self.status();
        if let Some(hook) = self.handlers.control_dtc_setting.as_mut() {
            hook(&status, setting_type, &req[2..])?;
        }
        resp.push(UdsCommand::ControlDTCSetting.response_sid())?;
        resp.push(setting_type)?;
        Ok(())
    }
}
