//! The UDS server engine
//!
//! [UdsServer] owns the protocol state of one ECU instance: active session,
//! security level, the P2/S3 timers, an optional download session and the
//! response-pending bookkeeping. The host scheduler calls
//! [UdsServer::poll] repeatedly; everything the engine does happens inside
//! that call, cooperatively and without blocking.
//!
//! Application behavior is wired in through [ServiceHandlers]. Every hook
//! is optional; a request for a service without a hook is answered with
//! NRC 0x11 (with the single deliberate exception of ECUReset, see
//! [ServiceHandlers::ecu_reset]).

use core::fmt;
use std::mem;

use log::{debug, error, warn};
use thiserror::Error;

use crate::channel::{CanBus, ChannelError, Clock, IsoTpLink, SendStatus};
use crate::protocol::{
    ResetType, RoutineControlType, SUPPRESS_POS_RSP_BIT, UdsCommand, UdsError, UdsSessionType,
};

mod communication_control;
mod control_dtc_setting;
mod diagnostic_session_control;
mod download;
mod ecu_reset;
mod read_data_by_identifier;
mod request_download;
mod response;
mod routine_control;
mod security_access;
mod tester_present;
mod transfer_data;
mod write_data_by_identifier;

pub use download::{DownloadGrant, DownloadRequest, TransferHandler};
pub use response::Response;

use download::DownloadSession;

/// How a request reached the server
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Addressing {
    /// 1:1 addressing; the tester talks to this ECU specifically
    #[default]
    Physical,
    /// Broadcast addressing; the request went to every ECU on the bus.
    /// "Not supported" style rejections are silently dropped for these
    /// requests so broadcasts do not flood the bus with negative responses.
    Functional,
}

/// Read-only snapshot of the server's protocol state, handed to every
/// application hook and available via [UdsServer::status].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EcuStatus {
    /// Active diagnostic session
    pub session_type: UdsSessionType,
    /// Granted security level; 0 means locked
    pub security_level: u8,
    /// True once a positive ECUReset response was issued and the platform
    /// has not acted on it yet
    pub ecu_reset_scheduled: bool,
    /// True while a response-pending (NRC 0x78) reply is outstanding. A
    /// handler invoked with this set is being re-entered for a request it
    /// yielded on earlier.
    pub rcrrp_in_flight: bool,
}

/// Hook for DiagnosticSessionControl (0x10). Receives the requested
/// session; on `Ok` the engine switches the session and answers with the
/// session parameter record.
pub type SessionControlHook = Box<dyn FnMut(&EcuStatus, UdsSessionType) -> Result<(), UdsError>>;

/// Hook for ECUReset (0x11). Receives the requested reset mode and returns
/// the minimum power-down time in seconds, which is only put on the wire
/// for [ResetType::EnableRapidPowerShutDown].
pub type EcuResetHook = Box<dyn FnMut(&EcuStatus, ResetType) -> Result<u8, UdsError>>;

/// Hook for ReadDataByIdentifier (0x22). Called once per requested DID, in
/// request order; appends the record data for that DID to the response.
/// The first non-`Ok` return fails the whole request with that NRC.
pub type ReadDataByIdentifierHook =
    Box<dyn FnMut(&EcuStatus, u16, &mut Response) -> Result<(), UdsError>>;

/// Hook for WriteDataByIdentifier (0x2E). Receives the DID and its new
/// record data.
pub type WriteDataByIdentifierHook =
    Box<dyn FnMut(&EcuStatus, u16, &[u8]) -> Result<(), UdsError>>;

/// Hook for CommunicationControl (0x28). Receives the controlType
/// sub-function (suppression bit already masked off) and the
/// communicationType byte.
pub type CommunicationControlHook =
    Box<dyn FnMut(&EcuStatus, u8, u8) -> Result<(), UdsError>>;

/// Hook for RoutineControl (0x31). Receives the operation, the routine
/// identifier and the routineControlOptionRecord, and may append a
/// routineStatusRecord to the response.
pub type RoutineControlHook = Box<
    dyn FnMut(&EcuStatus, RoutineControlType, u16, &[u8], &mut Response) -> Result<(), UdsError>,
>;

/// Hook for RequestDownload (0x34). Accepting returns a [DownloadGrant]
/// carrying the block receiver and the block size the ECU can take.
pub type RequestDownloadHook =
    Box<dyn FnMut(&EcuStatus, &DownloadRequest) -> Result<DownloadGrant, UdsError>>;

/// Hook for ControlDTCSetting (0x85). Receives the dtcSettingType
/// (suppression bit masked off) and the dtcSettingControlOptionRecord.
/// Unlike the other services, this hook is optional *behavior*: without it
/// the engine accepts the request blindly.
pub type ControlDtcSettingHook =
    Box<dyn FnMut(&EcuStatus, u8, &[u8]) -> Result<(), UdsError>>;

/// Notification hook fired when a non-default session dies of S3 timeout.
/// After the hook returns the engine restores the default session itself.
pub type SessionTimeoutHook = Box<dyn FnMut(&EcuStatus)>;

/// Seed/key provider for SecurityAccess (0x27). Both halves of the
/// exchange live on one object so an application cannot wire up a seed
/// generator without the matching key check.
pub trait SecurityAccessHandler {
    /// Produces the seed for the requested security level (the odd
    /// sub-function value) and appends it to `seed`.
    ///
    /// Contract: a level that is already unlocked must yield an all-zero
    /// seed of the nominal length, and a locked level must never yield all
    /// zeros - that is how testers distinguish the two. An empty seed is
    /// treated as a broken handler (NRC 0x72).
    fn generate_seed(
        &mut self,
        status: &EcuStatus,
        level: u8,
        record: &[u8],
        seed: &mut Response,
    ) -> Result<(), UdsError>;

    /// Checks the key for the level being unlocked (`level` is the even
    /// sub-function value). On `Ok` the engine sets the security level to
    /// `level - 1`.
    fn validate_key(&mut self, status: &EcuStatus, level: u8, key: &[u8])
    -> Result<(), UdsError>;
}

/// The capability set of the application: one optional hook per supported
/// service. An absent hook makes the engine answer the matching requests
/// with NRC 0x11 ServiceNotSupported, except where noted.
#[derive(Default)]
pub struct ServiceHandlers {
    /// DiagnosticSessionControl (0x10)
    pub session_control: Option<SessionControlHook>,
    /// ECUReset (0x11). Absence is answered with NRC 0x72 rather than
    /// 0x11: an ECU that advertises UDS but cannot reset is treated as
    /// misconfigured, not as lacking the service.
    pub ecu_reset: Option<EcuResetHook>,
    /// ReadDataByIdentifier (0x22)
    pub read_data_by_identifier: Option<ReadDataByIdentifierHook>,
    /// WriteDataByIdentifier (0x2E)
    pub write_data_by_identifier: Option<WriteDataByIdentifierHook>,
    /// CommunicationControl (0x28)
    pub communication_control: Option<CommunicationControlHook>,
    /// RoutineControl (0x31)
    pub routine_control: Option<RoutineControlHook>,
    /// SecurityAccess (0x27), seed and key together
    pub security_access: Option<Box<dyn SecurityAccessHandler>>,
    /// RequestDownload (0x34); also gates 0x36/0x37 which require the
    /// session this hook opens
    pub request_download: Option<RequestDownloadHook>,
    /// ControlDTCSetting (0x85); absent means "accept blindly"
    pub control_dtc_setting: Option<ControlDtcSettingHook>,
    /// S3 session timeout notification
    pub session_timeout: Option<SessionTimeoutHook>,
}

impl fmt::Debug for ServiceHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandlers")
            .field("session_control", &self.session_control.is_some())
            .field("ecu_reset", &self.ecu_reset.is_some())
            .field(
                "read_data_by_identifier",
                &self.read_data_by_identifier.is_some(),
            )
            .field(
                "write_data_by_identifier",
                &self.write_data_by_identifier.is_some(),
            )
            .field(
                "communication_control",
                &self.communication_control.is_some(),
            )
            .field("routine_control", &self.routine_control.is_some())
            .field("security_access", &self.security_access.is_some())
            .field("request_download", &self.request_download.is_some())
            .field("control_dtc_setting", &self.control_dtc_setting.is_some())
            .field("session_timeout", &self.session_timeout.is_some())
            .finish()
    }
}

/// UDS server configuration
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UdsServerOptions {
    /// Arbitration ID the physical link transmits with
    pub physical_send_id: u32,
    /// Arbitration ID carrying physically addressed requests
    pub physical_recv_id: u32,
    /// Arbitration ID the functional link transmits with
    pub functional_send_id: u32,
    /// Arbitration ID carrying functionally addressed (broadcast) requests
    pub functional_recv_id: u32,
    /// P2: minimum spacing between consuming two consecutive requests, in
    /// ms. Also reported to the tester in the 0x10 response (1 ms
    /// resolution, so at most 0xFFFF).
    pub p2_ms: u32,
    /// P2*: extended reply window after a response-pending reply, in ms.
    /// Reported to the tester with 10 ms resolution, so at most 0x9FFF6.
    pub p2_star_ms: u32,
    /// S3: a non-default session falls back to default after this many ms
    /// without a TesterPresent
    pub s3_ms: u32,
    /// Capacity of the request buffer in bytes (> 2)
    pub receive_buffer_size: usize,
    /// Capacity of the response buffer in bytes (> 2)
    pub transmit_buffer_size: usize,
}

/// Construction/configuration error of a [UdsServer]
#[derive(Debug, Error)]
pub enum ServerError {
    /// A buffer capacity cannot even hold a negative response
    #[error("{which} buffer capacity of {capacity} bytes is too small (minimum 3)")]
    BufferTooSmall {
        /// Which buffer ("receive" or "transmit")
        which: &'static str,
        /// The offending capacity
        capacity: usize,
    },
    /// Physical and functional traffic cannot share a receive ID
    #[error("physical and functional receive IDs collide (0x{id:X})")]
    ReceiveIdCollision {
        /// The colliding arbitration ID
        id: u32,
    },
    /// A timing parameter does not fit the session parameter record of the
    /// 0x10 response
    #[error("{which} of {value} ms does not fit the session parameter record")]
    TimingOutOfRange {
        /// Which parameter ("P2" or "P2*")
        which: &'static str,
        /// The configured value
        value: u32,
    },
    /// An ISO-TP link rejected its configuration
    #[error("transport link setup failed: {0}")]
    Channel(#[from] ChannelError),
}

#[derive(Debug)]
struct ServerState {
    session_type: UdsSessionType,
    security_level: u8,
    rcrrp_in_flight: bool,
    not_ready_to_receive: bool,
    ecu_reset_scheduled: bool,
    p2_deadline: u32,
    s3_deadline: u32,
}

impl ServerState {
    fn power_on(now: u32) -> Self {
        Self {
            session_type: UdsSessionType::Default,
            security_level: 0,
            rcrrp_in_flight: false,
            not_ready_to_receive: false,
            ecu_reset_scheduled: false,
            p2_deadline: now,
            s3_deadline: now,
        }
    }
}

/// Request/response scratch space. The request survives across polls while
/// a response-pending reply is outstanding, so the re-dispatch works on the
/// identical bytes.
#[derive(Debug, Default)]
struct Exchange {
    req: Vec<u8>,
    len: usize,
    addressing: Addressing,
    resp: Response,
}

/// `now > deadline` under wrapping u32 millisecond arithmetic
fn deadline_passed(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) > 0
}

/// The ECU-side UDS protocol engine. One instance per served ECU identity;
/// multiple servers may coexist in one process.
pub struct UdsServer {
    options: UdsServerOptions,
    phys: Box<dyn IsoTpLink>,
    func: Box<dyn IsoTpLink>,
    can: Box<dyn CanBus>,
    clock: Box<dyn Clock>,
    handlers: ServiceHandlers,
    state: ServerState,
    download: Option<DownloadSession>,
    exchange: Exchange,
}

impl fmt::Debug for UdsServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdsServer")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("download", &self.download)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl UdsServer {
    /// Creates a new server over the two ISO-TP links.
    ///
    /// Both links are configured with their arbitration IDs from `options`
    /// before any traffic flows. Fails on nonsensical configuration; the
    /// capacity floor of 3 bytes exists because a negative response must
    /// always fit.
    pub fn new(
        options: UdsServerOptions,
        mut physical_link: Box<dyn IsoTpLink>,
        mut functional_link: Box<dyn IsoTpLink>,
        can: Box<dyn CanBus>,
        clock: Box<dyn Clock>,
        handlers: ServiceHandlers,
    ) -> Result<Self, ServerError> {
        if options.receive_buffer_size <= 2 {
            return Err(ServerError::BufferTooSmall {
                which: "receive",
                capacity: options.receive_buffer_size,
            });
        }
        if options.transmit_buffer_size <= 2 {
            return Err(ServerError::BufferTooSmall {
                which: "transmit",
                capacity: options.transmit_buffer_size,
            });
        }
        if options.physical_recv_id == options.functional_recv_id {
            return Err(ServerError::ReceiveIdCollision {
                id: options.physical_recv_id,
            });
        }
        if options.p2_ms > u16::MAX as u32 {
            return Err(ServerError::TimingOutOfRange {
                which: "P2",
                value: options.p2_ms,
            });
        }
        if options.p2_star_ms / 10 > u16::MAX as u32 {
            return Err(ServerError::TimingOutOfRange {
                which: "P2*",
                value: options.p2_star_ms,
            });
        }

        physical_link.init(options.physical_send_id, options.physical_recv_id)?;
        functional_link.init(options.functional_send_id, options.functional_recv_id)?;

        let now = clock.now_ms();
        Ok(Self {
            options,
            phys: physical_link,
            func: functional_link,
            can,
            clock,
            handlers,
            state: ServerState::power_on(now),
            download: None,
            exchange: Exchange {
                req: vec![0; options.receive_buffer_size],
                len: 0,
                addressing: Addressing::Physical,
                resp: Response::with_capacity(options.transmit_buffer_size),
            },
        })
    }

    /// Snapshot of the protocol state, as also passed to every hook
    pub fn status(&self) -> EcuStatus {
        EcuStatus {
            session_type: self.state.session_type,
            security_level: self.state.security_level,
            ecu_reset_scheduled: self.state.ecu_reset_scheduled,
            rcrrp_in_flight: self.state.rcrrp_in_flight,
        }
    }

    /// True once a positive ECUReset response was issued. The platform is
    /// expected to watch this and perform the actual reset; the engine
    /// refuses further requests while it is set.
    pub fn ecu_reset_scheduled(&self) -> bool {
        self.state.ecu_reset_scheduled
    }

    /// Returns the engine to power-on state: default session, security
    /// locked, any download session torn down, all latches cleared.
    pub fn reset(&mut self) {
        let now = self.clock.now_ms();
        self.state = ServerState::power_on(now);
        self.download = None;
        self.exchange.len = 0;
        self.exchange.resp.clear();
    }

    /// Drives the engine for one tick. Call this from the host scheduler
    /// at a cadence fast enough to honor the configured P2 time.
    ///
    /// Each call drains at most one CAN frame, ticks both transport links,
    /// supervises the S3 session timeout and dispatches at most one UDS
    /// request. Physically addressed requests take priority over
    /// functionally addressed ones arriving in the same tick.
    pub fn poll(&mut self) {
        if let Some(frame) = self.can.rx_poll() {
            if frame.id() == self.options.physical_recv_id {
                self.phys.on_can_frame(&frame);
            } else if frame.id() == self.options.functional_recv_id {
                self.func.on_can_frame(&frame);
            }
        }
        self.phys.poll();
        self.func.poll();

        let now = self.clock.now_ms();
        if self.state.session_type != UdsSessionType::Default
            && deadline_passed(now, self.state.s3_deadline)
        {
            warn!(
                "S3 timeout, dropping {:?} session back to default",
                self.state.session_type
            );
            let status = self.status();
            if let Some(hook) = self.handlers.session_timeout.as_mut() {
                hook(&status);
            }
            self.state.session_type = UdsSessionType::Default;
        }

        if self.state.rcrrp_in_flight {
            // The pending reply has to clear the wire before the handler
            // may produce the real one.
            if self.phys.send_status() == SendStatus::Idle {
                debug!("response-pending reply transmitted, re-entering handler");
                self.dispatch_current();
            }
            return;
        }
        if self.state.not_ready_to_receive {
            return;
        }
        if !deadline_passed(now, self.state.p2_deadline) {
            return;
        }

        let received = match receive_from(self.phys.as_mut(), &mut self.exchange.req) {
            Some(n) => {
                self.exchange.addressing = Addressing::Physical;
                Some(n)
            }
            None => receive_from(self.func.as_mut(), &mut self.exchange.req).map(|n| {
                self.exchange.addressing = Addressing::Functional;
                n
            }),
        };
        let Some(len) = received else { return };
        if len == 0 {
            return;
        }
        self.exchange.len = len;
        self.state.p2_deadline = now.wrapping_add(self.options.p2_ms);
        self.dispatch_current();
    }

    /// Runs the buffered request through service dispatch and the response
    /// policy, then queues whatever survives the policy for transmission.
    fn dispatch_current(&mut self) {
        let mut xchg = mem::take(&mut self.exchange);
        {
            let req = &xchg.req[..xchg.len];
            xchg.resp.clear();
            let outcome = self.run_service(req, &mut xchg.resp);
            self.apply_response_policy(req, xchg.addressing, outcome, &mut xchg.resp);
        }
        if !xchg.resp.is_empty() {
            if let Err(e) = self.phys.send(xchg.resp.as_bytes()) {
                error!("failed to queue response for transmission: {e}");
            }
        }
        self.exchange = xchg;
        self.state.not_ready_to_receive =
            self.state.rcrrp_in_flight || self.state.ecu_reset_scheduled;
    }

    fn run_service(&mut self, req: &[u8], resp: &mut Response) -> Result<(), UdsError> {
        let Some(cmd) = UdsCommand::from_repr(req[0]) else {
            debug!("unknown SID 0x{:02X}", req[0]);
            return Err(UdsError::ServiceNotSupported);
        };
        if cmd.has_sub_function() && req.len() < 2 {
            return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
        }
        match cmd {
            UdsCommand::DiagnosticSessionControl => self.diagnostic_session_control(req, resp),
            UdsCommand::ECUReset => self.ecu_reset(req, resp),
            UdsCommand::ReadDataByIdentifier => self.read_data_by_identifier(req, resp),
            UdsCommand::WriteDataByIdentifier => self.write_data_by_identifier(req, resp),
            UdsCommand::SecurityAccess => self.security_access(req, resp),
            UdsCommand::CommunicationControl => self.communication_control(req, resp),
            UdsCommand::RoutineControl => self.routine_control(req, resp),
            UdsCommand::RequestDownload => self.request_download(req, resp),
            UdsCommand::TransferData => self.transfer_data(req, resp),
            UdsCommand::RequestTransferExit => self.request_transfer_exit(req, resp),
            UdsCommand::TesterPresent => self.tester_present(req, resp),
            UdsCommand::ControlDTCSetting => self.control_dtc_setting(req, resp),
            _ => Err(UdsError::ServiceNotSupported),
        }
    }

    /// Applies the suppression, silence and response-pending rules to the
    /// raw handler outcome.
    fn apply_response_policy(
        &mut self,
        req: &[u8],
        addressing: Addressing,
        outcome: Result<(), UdsError>,
        resp: &mut Response,
    ) {
        let sid = req[0];
        match outcome {
            Ok(()) => {
                self.state.rcrrp_in_flight = false;
                let suppress = UdsCommand::from_repr(sid).is_some_and(|c| {
                    c.has_sub_function() && req.len() >= 2 && req[1] & SUPPRESS_POS_RSP_BIT != 0
                });
                if suppress {
                    debug!("suppressing positive response to 0x{sid:02X}");
                    resp.clear();
                }
            }
            Err(UdsError::RequestCorrectlyReceivedResponsePending) => {
                debug!("handler for 0x{sid:02X} yielded, answering response-pending");
                resp.set_negative(sid, UdsError::RequestCorrectlyReceivedResponsePending);
                self.state.rcrrp_in_flight = true;
            }
            Err(nrc) => {
                self.state.rcrrp_in_flight = false;
                if addressing == Addressing::Functional && nrc.is_functionally_silenced() {
                    debug!(
                        "dropping {nrc:?} reply to functionally addressed 0x{sid:02X} request"
                    );
                    resp.clear();
                } else {
                    resp.set_negative(sid, nrc);
                }
            }
        }
    }

    /// Refreshes the S3 session-alive deadline
    pub(crate) fn refresh_s3(&mut self) {
        let now = self.clock.now_ms();
        self.state.s3_deadline = now.wrapping_add(self.options.s3_ms);
    }
}

fn receive_from(link: &mut dyn IsoTpLink, buf: &mut [u8]) -> Option<usize> {
    match link.receive(buf) {
        Ok(n) => Some(n),
        Err(ChannelError::BufferEmpty) => None,
        Err(e) => {
            warn!("transport receive fault: {e}");
            None
        }
    }
}
