//! Conformance tests for the dispatch layer, session handling and the
//! response policy, driven through simulated transport links.

mod common;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use common::{FUNC_RX_ID, PHYS_RX_ID, PHYS_TX_ID, build};
use uds_ecu::channel::CanFrame;
use uds_ecu::protocol::{UdsError, UdsSessionType};
use uds_ecu::server::{EcuStatus, Response, SecurityAccessHandler, ServiceHandlers};

#[test]
fn session_control_reports_timing_parameters() {
    let mut ecu = build(ServiceHandlers {
        session_control: Some(Box::new(|_, _| Ok(()))),
        ..Default::default()
    });
    // P2 = 50 ms at 1 ms resolution, P2* = 5000 ms at 10 ms resolution
    assert_eq!(
        ecu.request_physical(&[0x10, 0x03]),
        vec![vec![0x50, 0x03, 0x00, 0x32, 0x01, 0xF4]]
    );
    assert_eq!(ecu.server.status().session_type, UdsSessionType::Extended);
}

#[test]
fn session_control_without_hook_is_not_supported() {
    let mut ecu = build(ServiceHandlers::default());
    assert_eq!(
        ecu.request_physical(&[0x10, 0x01]),
        vec![vec![0x7F, 0x10, 0x11]]
    );
}

#[test]
fn suppress_positive_response_bit_silences_the_reply() {
    let mut ecu = build(ServiceHandlers {
        session_control: Some(Box::new(|_, _| Ok(()))),
        ..Default::default()
    });
    assert!(ecu.request_physical(&[0x10, 0x83]).is_empty());
    // the request still took effect
    assert_eq!(ecu.server.status().session_type, UdsSessionType::Extended);
}

#[test]
fn suppress_bit_does_not_silence_negative_responses() {
    let mut ecu = build(ServiceHandlers {
        session_control: Some(Box::new(|_, _| Err(UdsError::ConditionsNotCorrect))),
        ..Default::default()
    });
    assert_eq!(
        ecu.request_physical(&[0x10, 0x83]),
        vec![vec![0x7F, 0x10, 0x22]]
    );
}

#[test]
fn unknown_sid_is_rejected_physically_and_silenced_functionally() {
    let mut ecu = build(ServiceHandlers::default());
    assert_eq!(ecu.request_physical(&[0xBA]), vec![vec![0x7F, 0xBA, 0x11]]);
    assert!(ecu.request_functional(&[0xBA]).is_empty());
}

#[test]
fn functional_requests_silence_the_unsupported_family_only() {
    let mut ecu = build(ServiceHandlers::default());
    // no RDBI hook: ServiceNotSupported, silenced on the functional link
    assert!(ecu.request_functional(&[0x22, 0xF1, 0x90]).is_empty());
    // a length error is NOT part of the silenced family
    let mut ecu = build(ServiceHandlers {
        read_data_by_identifier: Some(Box::new(|_, _, _| Ok(()))),
        ..Default::default()
    });
    assert_eq!(
        ecu.request_functional(&[0x22, 0xF1]),
        vec![vec![0x7F, 0x22, 0x13]]
    );
}

#[test]
fn short_requests_to_sub_function_services_are_malformed() {
    let mut ecu = build(ServiceHandlers::default());
    // 0x19 carries a sub-function even though this engine never implements
    // it, so the length rule applies before the unsupported rejection
    assert_eq!(ecu.request_physical(&[0x19]), vec![vec![0x7F, 0x19, 0x13]]);
    assert_eq!(
        ecu.request_physical(&[0x19, 0x02]),
        vec![vec![0x7F, 0x19, 0x11]]
    );
}

#[test]
fn write_then_read_round_trips_through_identity_hooks() {
    let store: Rc<RefCell<HashMap<u16, Vec<u8>>>> = Rc::new(RefCell::new(HashMap::new()));
    let write_store = store.clone();
    let read_store = store.clone();
    let mut ecu = build(ServiceHandlers {
        write_data_by_identifier: Some(Box::new(move |_, did, data| {
            write_store.borrow_mut().insert(did, data.to_vec());
            Ok(())
        })),
        read_data_by_identifier: Some(Box::new(move |_, did, resp| {
            match read_store.borrow().get(&did) {
                Some(data) => resp.write(data),
                None => Err(UdsError::RequestOutOfRange),
            }
        })),
        ..Default::default()
    });

    assert_eq!(
        ecu.request_physical(&[0x2E, 0xF1, 0x90, 0xDE, 0xAD, 0xBE, 0xEF]),
        vec![vec![0x6E, 0xF1, 0x90]]
    );
    assert_eq!(
        ecu.request_physical(&[0x2E, 0x01, 0x00, 0x42]),
        vec![vec![0x6E, 0x01, 0x00]]
    );
    // both DIDs in one request, records framed in request order
    assert_eq!(
        ecu.request_physical(&[0x22, 0xF1, 0x90, 0x01, 0x00]),
        vec![vec![0x62, 0xF1, 0x90, 0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x00, 0x42]]
    );
    // an unknown DID fails the whole request
    assert_eq!(
        ecu.request_physical(&[0x22, 0xF1, 0x90, 0x7A, 0x7A]),
        vec![vec![0x7F, 0x22, 0x31]]
    );
    // odd DID bytes are malformed
    assert_eq!(
        ecu.request_physical(&[0x22, 0xF1, 0x90, 0x7A]),
        vec![vec![0x7F, 0x22, 0x13]]
    );
}

struct SeedKey;

impl SecurityAccessHandler for SeedKey {
    fn generate_seed(
        &mut self,
        status: &EcuStatus,
        _level: u8,
        _record: &[u8],
        seed: &mut Response,
    ) -> Result<(), UdsError> {
        if status.security_level > 0 {
            seed.write(&[0x00, 0x00])
        } else {
            seed.write(&[0xA5, 0x5A])
        }
    }

    fn validate_key(
        &mut self,
        _status: &EcuStatus,
        _level: u8,
        key: &[u8],
    ) -> Result<(), UdsError> {
        if key == [0xCA, 0xFE] {
            Ok(())
        } else {
            Err(UdsError::InvalidKey)
        }
    }
}

#[test]
fn security_access_unlock_sequence() {
    let mut ecu = build(ServiceHandlers {
        security_access: Some(Box::new(SeedKey)),
        ..Default::default()
    });
    assert_eq!(
        ecu.request_physical(&[0x27, 0x01]),
        vec![vec![0x67, 0x01, 0xA5, 0x5A]]
    );
    assert_eq!(ecu.server.status().security_level, 0);
    assert_eq!(
        ecu.request_physical(&[0x27, 0x02, 0xCA, 0xFE]),
        vec![vec![0x67, 0x02]]
    );
    assert_eq!(ecu.server.status().security_level, 1);
    // an unlocked level hands out the all-zero seed
    assert_eq!(
        ecu.request_physical(&[0x27, 0x01]),
        vec![vec![0x67, 0x01, 0x00, 0x00]]
    );
}

#[test]
fn security_access_rejects_bad_keys_and_reserved_levels() {
    let mut ecu = build(ServiceHandlers {
        security_access: Some(Box::new(SeedKey)),
        ..Default::default()
    });
    assert_eq!(
        ecu.request_physical(&[0x27, 0x02, 0x00, 0x00]),
        vec![vec![0x7F, 0x27, 0x35]]
    );
    assert_eq!(ecu.server.status().security_level, 0);
    assert_eq!(
        ecu.request_physical(&[0x27, 0x7F]),
        vec![vec![0x7F, 0x27, 0x13]]
    );
}

#[test]
fn s3_timeout_fires_the_hook_exactly_once() {
    let fired: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
    let fired_hook = fired.clone();
    let mut ecu = build(ServiceHandlers {
        session_control: Some(Box::new(|_, _| Ok(()))),
        session_timeout: Some(Box::new(move |_| {
            *fired_hook.borrow_mut() += 1;
        })),
        ..Default::default()
    });

    assert_eq!(
        ecu.request_physical(&[0x10, 0x03]).len(),
        1,
        "session switch must answer"
    );
    // idle past S3 (5000 ms)
    ecu.clock.advance(6000);
    ecu.server.poll();
    assert_eq!(*fired.borrow(), 1);
    assert_eq!(ecu.server.status().session_type, UdsSessionType::Default);
    // back in default there is nothing left to time out
    ecu.clock.advance(6000);
    ecu.server.poll();
    assert_eq!(*fired.borrow(), 1);
}

#[test]
fn tester_present_keeps_the_session_alive() {
    let fired: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
    let fired_hook = fired.clone();
    let mut ecu = build(ServiceHandlers {
        session_control: Some(Box::new(|_, _| Ok(()))),
        session_timeout: Some(Box::new(move |_| {
            *fired_hook.borrow_mut() += 1;
        })),
        ..Default::default()
    });

    ecu.request_physical(&[0x10, 0x03]);
    ecu.clock.advance(4000);
    // suppressed positive response, but the S3 refresh still happens
    assert!(ecu.request_physical(&[0x3E, 0x80]).is_empty());
    ecu.clock.advance(4000);
    ecu.server.poll();
    assert_eq!(*fired.borrow(), 0);
    assert_eq!(ecu.server.status().session_type, UdsSessionType::Extended);

    assert_eq!(ecu.request_physical(&[0x3E, 0x00]), vec![vec![0x7E, 0x00]]);
    ecu.clock.advance(6000);
    ecu.server.poll();
    assert_eq!(*fired.borrow(), 1);
}

#[test]
fn ecu_reset_latches_and_blocks_further_requests() {
    let mut ecu = build(ServiceHandlers {
        ecu_reset: Some(Box::new(|_, _| Ok(0x0F))),
        ..Default::default()
    });
    assert_eq!(ecu.request_physical(&[0x11, 0x01]), vec![vec![0x51, 0x01]]);
    assert!(ecu.server.ecu_reset_scheduled());
    // the engine stops consuming requests until the platform resets
    assert!(ecu.request_physical(&[0x3E, 0x00]).is_empty());

    ecu.server.reset();
    assert!(!ecu.server.ecu_reset_scheduled());
    assert_eq!(ecu.request_physical(&[0x3E, 0x00]), vec![vec![0x7E, 0x00]]);
}

#[test]
fn rapid_power_shutdown_reports_the_power_down_time() {
    let mut ecu = build(ServiceHandlers {
        ecu_reset: Some(Box::new(|_, _| Ok(0x0F))),
        ..Default::default()
    });
    assert_eq!(
        ecu.request_physical(&[0x11, 0x04]),
        vec![vec![0x51, 0x04, 0x0F]]
    );
}

#[test]
fn ecu_reset_without_hook_is_a_programming_failure() {
    let mut ecu = build(ServiceHandlers::default());
    assert_eq!(
        ecu.request_physical(&[0x11, 0x01]),
        vec![vec![0x7F, 0x11, 0x72]]
    );
}

#[test]
fn communication_control_echoes_the_control_type() {
    let seen: Rc<RefCell<Vec<(u8, u8)>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_hook = seen.clone();
    let mut ecu = build(ServiceHandlers {
        communication_control: Some(Box::new(move |_, ct, cm| {
            seen_hook.borrow_mut().push((ct, cm));
            Ok(())
        })),
        ..Default::default()
    });
    assert_eq!(
        ecu.request_physical(&[0x28, 0x01, 0x03]),
        vec![vec![0xE8, 0x01]]
    );
    assert_eq!(*seen.borrow(), vec![(0x01, 0x03)]);
    assert_eq!(
        ecu.request_physical(&[0x28, 0x01]),
        vec![vec![0x7F, 0x28, 0x13]]
    );
}

#[test]
fn routine_control_validates_the_operation() {
    let mut ecu = build(ServiceHandlers {
        routine_control: Some(Box::new(|_, _, _, _, _| Ok(()))),
        ..Default::default()
    });
    assert_eq!(
        ecu.request_physical(&[0x31, 0x01, 0x12, 0x34]),
        vec![vec![0x71, 0x01, 0x12, 0x34]]
    );
    assert_eq!(
        ecu.request_physical(&[0x31, 0x04, 0x12, 0x34]),
        vec![vec![0x7F, 0x31, 0x13]]
    );
    assert_eq!(
        ecu.request_physical(&[0x31, 0x01, 0x12]),
        vec![vec![0x7F, 0x31, 0x13]]
    );
}

#[test]
fn control_dtc_setting_accepts_blindly_without_a_hook() {
    let mut ecu = build(ServiceHandlers::default());
    assert_eq!(ecu.request_physical(&[0x85, 0x02]), vec![vec![0xC5, 0x02]]);
}

#[test]
fn control_dtc_setting_hook_may_reject() {
    let mut ecu = build(ServiceHandlers {
        control_dtc_setting: Some(Box::new(|_, _, _| Err(UdsError::ConditionsNotCorrect))),
        ..Default::default()
    });
    assert_eq!(
        ecu.request_physical(&[0x85, 0x02]),
        vec![vec![0x7F, 0x85, 0x22]]
    );
}

#[test]
fn physical_requests_win_over_functional_in_the_same_tick() {
    let mut ecu = build(ServiceHandlers::default());
    ecu.clock.advance(100);
    ecu.phys.inject_request(&[0x3E, 0x00]);
    ecu.func.inject_request(&[0x85, 0x01]);
    ecu.server.poll();
    assert_eq!(ecu.phys.take_sent(), vec![vec![0x7E, 0x00]]);
    // the functional request waits for the next tick past P2
    ecu.clock.advance(100);
    ecu.server.poll();
    assert_eq!(ecu.phys.take_sent(), vec![vec![0xC5, 0x01]]);
}

#[test]
fn p2_spaces_out_consecutive_requests() {
    let mut ecu = build(ServiceHandlers::default());
    ecu.clock.advance(100);
    ecu.phys.inject_request(&[0x3E, 0x00]);
    ecu.phys.inject_request(&[0x3E, 0x00]);
    ecu.server.poll();
    assert_eq!(ecu.phys.take_sent().len(), 1);
    // P2 (50 ms) has not elapsed yet
    ecu.clock.advance(10);
    ecu.server.poll();
    assert!(ecu.phys.take_sent().is_empty());
    ecu.clock.advance(100);
    ecu.server.poll();
    assert_eq!(ecu.phys.take_sent().len(), 1);
}

#[test]
fn can_frames_route_by_arbitration_id() {
    let mut ecu = build(ServiceHandlers::default());
    assert_eq!(ecu.phys.configured_ids(), Some((PHYS_TX_ID, PHYS_RX_ID)));
    assert_eq!(ecu.func.configured_ids(), Some((PHYS_TX_ID, FUNC_RX_ID)));
    ecu.bus.push_frame(CanFrame::new(PHYS_RX_ID, &[0x02, 0x3E, 0x00]));
    ecu.server.poll();
    ecu.bus.push_frame(CanFrame::new(FUNC_RX_ID, &[0x02, 0x3E, 0x00]));
    ecu.server.poll();
    ecu.bus.push_frame(CanFrame::new(0x123, &[0x00]));
    ecu.server.poll();
    assert_eq!(ecu.phys.can_frames_fed(), 1);
    assert_eq!(ecu.func.can_frames_fed(), 1);
}
