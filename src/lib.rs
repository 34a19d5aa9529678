#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_imports,
    unused_import_braces,
    unused_qualifications
)]

//! A crate which implements the ECU (server) side of the UDS diagnostic protocol
//! (Unified diagnostic services - ISO14229), for use in embedded control units
//! that have to answer a diagnostic tester over ISO-TP (ISO15765-2) on CAN.
//!
//! ## What this crate does
//!
//! The engine decodes each incoming UDS request PDU, dispatches it to the
//! application handlers wired in at construction time, and emits the
//! protocol-correct positive response, negative response, or nothing at all
//! where ISO14229 mandates silence. It owns the conformance rules that are
//! easy to get wrong on an ECU:
//!
//! * Session timing (P2 request spacing, S3 session timeout, P2* extension
//!   via the 0x78 response-pending mechanism)
//! * Suppress-positive-response handling for sub-function services
//! * Silent dropping of "not supported" style errors for functionally
//!   (broadcast) addressed requests
//! * The RequestDownload / TransferData / RequestTransferExit state machine,
//!   including block sequence counting and teardown on error
//! * Security access level bookkeeping for seed/key exchanges
//!
//! ## What this crate does NOT do
//!
//! The CAN driver, the two ISO-TP links (physically and functionally
//! addressed) and the millisecond time source are external collaborators,
//! reached through the traits in [channel]. This crate contains no hardware
//! access of its own; the [simulation] module provides in-memory stand-ins
//! for all three so servers can be exercised in unit tests.
//!
//! ## Usage
//!
//! Construct a [server::UdsServer] from a [server::UdsServerOptions], two
//! ISO-TP links, a CAN driver, a clock and a [server::ServiceHandlers]
//! capability set, then call [server::UdsServer::poll] from the host
//! scheduler at a cadence fast enough to honor the configured P2 time.

pub mod channel;
pub mod protocol;
pub mod server;
pub mod simulation;

pub use protocol::{UdsCommand, UdsError};
pub use server::{UdsServer, UdsServerOptions};
