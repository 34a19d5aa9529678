//! UDS wire-level definitions (ISO14229)
//!
//! Service identifiers, negative response codes and the handful of
//! sub-function enumerations the server engine interprets itself. All other
//! sub-function semantics belong to the application handlers.

use strum_macros::{EnumIter, FromRepr};

/// Added to a request SID to form the positive response SID
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

/// SID of every negative response message (`{0x7F, request SID, NRC}`)
pub const NEGATIVE_RESPONSE_SID: u8 = 0x7F;

/// suppressPosRspMsgIndication bit in the sub-function byte of a request
pub const SUPPRESS_POS_RSP_BIT: u8 = 0x80;

#[derive(FromRepr, EnumIter, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
/// UDS Command Service IDs known to the dispatch table.
///
/// A request whose first byte matches none of these is answered with
/// [UdsError::ServiceNotSupported]. Being listed here does not mean the
/// service is implemented; it means the engine knows whether the service
/// carries a sub-function byte and can therefore apply the correct length
/// and suppression rules before deciding it is unsupported.
pub enum UdsCommand {
    /// Diagnostic session control
    DiagnosticSessionControl = 0x10,
    /// ECU Reset
    ECUReset = 0x11,
    /// Clears stored diagnostic trouble codes
    ClearDiagnosticInformation = 0x14,
    /// Reads diagnostic trouble code information
    ReadDTCInformation = 0x19,
    /// Reads data by a 16 bit identifier
    ReadDataByIdentifier = 0x22,
    /// Reads data from a memory region
    ReadMemoryByAddress = 0x23,
    /// Reads scaling data by a 16 bit identifier
    ReadScalingDataByIdentifier = 0x24,
    /// Security access (seed/key exchange)
    SecurityAccess = 0x27,
    /// Controls normal ECU communication
    CommunicationControl = 0x28,
    /// Reads data by a periodic identifier
    ReadDataByPeriodicIdentifier = 0x2A,
    /// Dynamically defines a data identifier
    DynamicallyDefineDataIdentifier = 0x2C,
    /// Writes data by a 16 bit identifier
    WriteDataByIdentifier = 0x2E,
    /// Input/output control by identifier
    InputOutputControlByIdentifier = 0x2F,
    /// Starts, stops or queries a routine on the ECU
    RoutineControl = 0x31,
    /// Announces a download (tester to ECU transfer)
    RequestDownload = 0x34,
    /// Announces an upload (ECU to tester transfer)
    RequestUpload = 0x35,
    /// Carries one block of an active transfer
    TransferData = 0x36,
    /// Finishes an active transfer
    RequestTransferExit = 0x37,
    /// File transfer on ECUs with a file system
    RequestFileTransfer = 0x38,
    /// Writes data to a memory region
    WriteMemoryByAddress = 0x3D,
    /// Keeps a non-default session alive
    TesterPresent = 0x3E,
    /// Access timing parameters
    AccessTimingParameters = 0x83,
    /// Secured data transmission
    SecuredDataTransmission = 0x84,
    /// Enables/disables the setting of diagnostic trouble codes
    ControlDTCSetting = 0x85,
    /// Response on event
    ResponseOnEvent = 0x86,
}

impl UdsCommand {
    /// Raw SID byte of the command
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// SID of the positive response to this command
    pub const fn response_sid(self) -> u8 {
        self as u8 | POSITIVE_RESPONSE_OFFSET
    }

    /// True for services whose second request byte is a sub-function byte
    /// (bit 7 = suppressPosRspMsgIndication). Such requests must be at
    /// least 2 bytes long.
    pub const fn has_sub_function(self) -> bool {
        matches!(
            self,
            UdsCommand::DiagnosticSessionControl
                | UdsCommand::ECUReset
                | UdsCommand::ReadDTCInformation
                | UdsCommand::SecurityAccess
                | UdsCommand::CommunicationControl
                | UdsCommand::RoutineControl
                | UdsCommand::TesterPresent
                | UdsCommand::AccessTimingParameters
                | UdsCommand::SecuredDataTransmission
                | UdsCommand::ControlDTCSetting
                | UdsCommand::ResponseOnEvent
        )
    }
}

impl From<UdsCommand> for u8 {
    fn from(cmd: UdsCommand) -> Self {
        cmd as u8
    }
}

#[derive(FromRepr, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
/// UDS negative response codes (NRC).
///
/// Handlers report their outcome as `Result<(), UdsError>`; `Err` carries
/// the NRC that ends up as the third byte of the `{0x7F, SID, NRC}` reply.
/// [UdsError::RequestCorrectlyReceivedResponsePending] is not an error but
/// a yield: the engine answers 0x78 and re-invokes the handler once the
/// reply has left the wire.
pub enum UdsError {
    /// ECU rejected the request (No specific error)
    GeneralReject = 0x10,
    /// Service is not supported by the ECU
    ServiceNotSupported = 0x11,
    /// Sub function is not supported by the ECU
    SubFunctionNotSupported = 0x12,
    /// Request message was an invalid length, or the format of the
    /// request was incorrect
    IncorrectMessageLengthOrInvalidFormat = 0x13,
    /// The response message is too long for the transport protocol
    ResponseTooLong = 0x14,
    /// The ECU is too busy to perform this request and the request
    /// should be repeated
    BusyRepeatRequest = 0x21,
    /// The requested action could not be performed due to the
    /// prerequisite conditions not being correct
    ConditionsNotCorrect = 0x22,
    /// The requests were sent in the incorrect order, for example a key
    /// was sent before its seed was requested
    RequestSequenceError = 0x24,
    /// A subnet component needed for the request timed out
    NoResponseFromSubnetComponent = 0x25,
    /// A failure condition (DTC) prevents execution of the request
    FailurePreventsExecutionOfRequestedAction = 0x26,
    /// The request message contains data outside of a valid range
    RequestOutOfRange = 0x31,
    /// The request requires security access which has not been granted
    SecurityAccessDenied = 0x33,
    /// The key sent for security access was invalid
    InvalidKey = 0x35,
    /// Too many security access attempts with incorrect keys
    ExceedNumberOfAttempts = 0x36,
    /// Security access was re-attempted before the ECU timeout expired
    RequiredTimeDelayNotExpired = 0x37,
    /// The ECU cannot accept the requested upload/download due to a fault
    /// condition
    UploadDownloadNotAccepted = 0x70,
    /// The ECU has halted an active data transfer due to a fault
    TransferDataSuspended = 0x71,
    /// The ECU encountered an error while programming (also used by the
    /// engine for response buffer overflow and broken handler contracts)
    GeneralProgrammingFailure = 0x72,
    /// The blockSequenceCounter of a TransferData request was incorrect
    WrongBlockSequenceCounter = 0x73,
    /// The request was accepted but the reply is not ready yet; the
    /// tester extends its timeout from P2 to P2*
    RequestCorrectlyReceivedResponsePending = 0x78,
    /// The sub function is not supported in the active session
    SubFunctionNotSupportedInActiveSession = 0x7E,
    /// The service is not supported in the active session
    ServiceNotSupportedInActiveSession = 0x7F,
    /// Engine RPM is too high
    RpmTooHigh = 0x81,
    /// Engine RPM is too low
    RpmTooLow = 0x82,
    /// Engine is running
    EngineIsRunning = 0x83,
    /// Engine is not running
    EngineIsNotRunning = 0x84,
    /// Engine has not been running for long enough
    EngineRunTimeTooLow = 0x85,
    /// Coolant temperature is too high
    TemperatureTooHigh = 0x86,
    /// Coolant temperature is too low
    TemperatureTooLow = 0x87,
    /// Vehicle speed is too high
    VehicleSpeedTooHigh = 0x88,
    /// Vehicle speed is too low
    VehicleSpeedTooLow = 0x89,
    /// Throttle or pedal value is too high
    ThrottleTooHigh = 0x8A,
    /// Throttle or pedal value is too low
    ThrottleTooLow = 0x8B,
    /// Transmission is not in neutral
    TransmissionRangeNotInNeutral = 0x8C,
    /// Transmission is not in gear
    TransmissionRangeNotInGear = 0x8D,
    /// Brake is not applied
    BrakeSwitchNotClosed = 0x8F,
    /// Shifter lever is not in park
    ShifterLeverNotInPark = 0x90,
    /// Automatic/CVT transmission torque converter is locked
    TorqueConverterClutchLocked = 0x91,
    /// Voltage is too high
    VoltageTooHigh = 0x92,
    /// Voltage is too low
    VoltageTooLow = 0x93,
}

impl From<UdsError> for u8 {
    fn from(e: UdsError) -> Self {
        e as u8
    }
}

impl UdsError {
    /// True for the NRCs that are never put on the bus in reply to a
    /// functionally addressed request. A broadcast reaches every ECU on the
    /// bus; the ones that simply do not implement the service stay silent
    /// instead of flooding the tester with negative responses.
    pub const fn is_functionally_silenced(self) -> bool {
        matches!(
            self,
            UdsError::ServiceNotSupported
                | UdsError::SubFunctionNotSupported
                | UdsError::ServiceNotSupportedInActiveSession
                | UdsError::SubFunctionNotSupportedInActiveSession
                | UdsError::RequestOutOfRange
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// UDS Diagnostic session modes. Handled by SID 0x10.
pub enum UdsSessionType {
    /// Default diagnostic session mode (the ECU is in this mode on startup).
    /// No S3 supervision applies; the session cannot time out.
    Default,

    /// Session mode enabling all diagnostic services related to flashing or
    /// programming the ECU
    Programming,

    /// Session mode enabling all diagnostic services and adjustment of ECU
    /// values
    Extended,

    /// Session mode enabling the services required for safety
    /// system-related functions
    SafetySystem,

    /// Custom session type. This covers both vehicleManufacturerSpecific
    /// modes (0x40-0x5F) and systemSupplierSpecific modes (0x60-0x7E).
    Other(u8),
}

impl From<UdsSessionType> for u8 {
    fn from(from: UdsSessionType) -> u8 {
        match from {
            UdsSessionType::Default => 0x01,
            UdsSessionType::Programming => 0x02,
            UdsSessionType::Extended => 0x03,
            UdsSessionType::SafetySystem => 0x04,
            UdsSessionType::Other(x) => x,
        }
    }
}

impl From<u8> for UdsSessionType {
    fn from(value: u8) -> Self {
        match value {
            0x01 => UdsSessionType::Default,
            0x02 => UdsSessionType::Programming,
            0x03 => UdsSessionType::Extended,
            0x04 => UdsSessionType::SafetySystem,
            x => UdsSessionType::Other(x),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// ECU reset modes. Handled by SID 0x11.
pub enum ResetType {
    /// Hard reset, simulating a forceful power off/on cycle. Both
    /// non-volatile and volatile memory may be re-initialized.
    HardReset,

    /// Simulated key off/on cycle. Non-volatile memory is typically
    /// preserved, volatile memory re-initialized.
    KeyOffReset,

    /// Soft reset, rebooting the running application while preserving both
    /// memory kinds
    SoftReset,

    /// Enables a rapid power shutdown on the ECU during a key-off cycle.
    /// The positive response to this mode carries the minimum power-down
    /// time in seconds as an extra byte.
    EnableRapidPowerShutDown,

    /// Disables a rapid power shutdown on the ECU during a key-off cycle
    DisableRapidPowerShutDown,

    /// Other OEM defined reset mode
    Other(u8),
}

impl From<ResetType> for u8 {
    fn from(from: ResetType) -> u8 {
        match from {
            ResetType::HardReset => 0x01,
            ResetType::KeyOffReset => 0x02,
            ResetType::SoftReset => 0x03,
            ResetType::EnableRapidPowerShutDown => 0x04,
            ResetType::DisableRapidPowerShutDown => 0x05,
            ResetType::Other(x) => x,
        }
    }
}

impl From<u8> for ResetType {
    fn from(value: u8) -> Self {
        match value {
            0x01 => ResetType::HardReset,
            0x02 => ResetType::KeyOffReset,
            0x03 => ResetType::SoftReset,
            0x04 => ResetType::EnableRapidPowerShutDown,
            0x05 => ResetType::DisableRapidPowerShutDown,
            x => ResetType::Other(x),
        }
    }
}

#[derive(FromRepr, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
/// Operations of the RoutineControl (0x31) service. Any other sub-function
/// value is rejected with NRC 0x13.
pub enum RoutineControlType {
    /// Starts the addressed routine
    StartRoutine = 0x01,
    /// Stops the addressed routine
    StopRoutine = 0x02,
    /// Requests the results of the addressed routine
    RequestRoutineResults = 0x03,
}
