#![allow(dead_code)]

//! Shared fixture: a fully wired server over simulation collaborators.

use uds_ecu::server::{ServiceHandlers, UdsServer, UdsServerOptions};
use uds_ecu::simulation::{SimCanBus, SimClock, SimIsoTpLink};

pub const PHYS_TX_ID: u32 = 0x07E8;
pub const PHYS_RX_ID: u32 = 0x07E0;
pub const FUNC_RX_ID: u32 = 0x07DF;

pub struct TestEcu {
    pub server: UdsServer,
    pub phys: SimIsoTpLink,
    pub func: SimIsoTpLink,
    pub bus: SimCanBus,
    pub clock: SimClock,
}

pub fn options() -> UdsServerOptions {
    UdsServerOptions {
        physical_send_id: PHYS_TX_ID,
        physical_recv_id: PHYS_RX_ID,
        functional_send_id: PHYS_TX_ID,
        functional_recv_id: FUNC_RX_ID,
        p2_ms: 50,
        p2_star_ms: 5000,
        s3_ms: 5000,
        receive_buffer_size: 512,
        transmit_buffer_size: 512,
    }
}

pub fn build(handlers: ServiceHandlers) -> TestEcu {
    build_with_options(options(), handlers)
}

pub fn build_with_options(options: UdsServerOptions, handlers: ServiceHandlers) -> TestEcu {
    let _ = env_logger::builder().is_test(true).try_init();
    let phys = SimIsoTpLink::new();
    let func = SimIsoTpLink::new();
    let bus = SimCanBus::new();
    let clock = SimClock::new();
    let server = UdsServer::new(
        options,
        Box::new(phys.clone()),
        Box::new(func.clone()),
        Box::new(bus.clone()),
        Box::new(clock.clone()),
        handlers,
    )
    .expect("server construction");
    TestEcu {
        server,
        phys,
        func,
        bus,
        clock,
    }
}

impl TestEcu {
    /// Injects a physically addressed request, waits out P2 and polls once.
    /// Returns everything the server put on the wire for it.
    pub fn request_physical(&mut self, req: &[u8]) -> Vec<Vec<u8>> {
        self.clock.advance(100);
        self.phys.inject_request(req);
        self.server.poll();
        self.phys.take_sent()
    }

    /// Same as [TestEcu::request_physical] but over the functional link.
    /// Responses (if any) still leave on the physical link.
    pub fn request_functional(&mut self, req: &[u8]) -> Vec<Vec<u8>> {
        self.clock.advance(100);
        self.func.inject_request(req);
        self.server.poll();
        self.phys.take_sent()
    }
}
