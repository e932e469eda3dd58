//! End-to-end driver tests against the mock transport.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use zwave_classes::management::WakeUp;
use zwave_classes::{ids, ClassEvent};
use zwave_driver::{
    data_frame, Driver, DriverConfig, DriverError, DriverEvent, MockHandle, MockTransport,
    OperationStatus,
};
use zwave_proto::{
    FUNC_APPLICATION_COMMAND_HANDLER, FUNC_GET_CAPABILITIES, FUNC_GET_INIT_DATA,
    FUNC_GET_NODE_PROTOCOL_INFO, FUNC_GET_VERSION, FUNC_MEMORY_GET_ID,
    FUNC_REQUEST_NODE_INFO, FUNC_REQUEST_NODE_NEIGHBOR_UPDATE, FUNC_SEND_DATA,
    MSG_TYPE_REQUEST, MSG_TYPE_RESPONSE, NODE_BITMASK_SIZE, UPDATE_STATE_NODE_INFO_RECEIVED,
};

const DEADLINE: Duration = Duration::from_secs(10);

fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + DEADLINE;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// An ApplicationCommandHandler frame carrying one application payload.
fn app_command(node_id: u8, app: &[u8]) -> Vec<u8> {
    let mut body = vec![0x00, node_id, app.len() as u8];
    body.extend_from_slice(app);
    data_frame(MSG_TYPE_REQUEST, FUNC_APPLICATION_COMMAND_HANDLER, &body)
}

/// Script the bootstrap responses: version, ids, capabilities, and a node
/// bitmask naming nodes 2 and 5.
fn script_bootstrap(mock: &MockHandle) {
    let mut version = b"Z-Wave 3.99".to_vec();
    version.push(0x00);
    version.push(0x01);
    mock.script_reply(
        FUNC_GET_VERSION,
        vec![data_frame(MSG_TYPE_RESPONSE, FUNC_GET_VERSION, &version)],
    );
    mock.script_reply(
        FUNC_MEMORY_GET_ID,
        vec![data_frame(
            MSG_TYPE_RESPONSE,
            FUNC_MEMORY_GET_ID,
            &[0xC0, 0xFF, 0xEE, 0x01, 0x01],
        )],
    );
    mock.script_reply(
        FUNC_GET_CAPABILITIES,
        vec![data_frame(MSG_TYPE_RESPONSE, FUNC_GET_CAPABILITIES, &[0x01; 8])],
    );

    // bits 1 and 4 of byte 0: nodes 2 and 5
    let mut init = vec![0x05, 0x00, NODE_BITMASK_SIZE as u8];
    let mut bitmask = [0u8; NODE_BITMASK_SIZE];
    bitmask[0] = (1 << 1) | (1 << 4);
    init.extend_from_slice(&bitmask);
    init.extend_from_slice(&[0x05, 0x00]);
    mock.script_reply(
        FUNC_GET_INIT_DATA,
        vec![data_frame(MSG_TYPE_RESPONSE, FUNC_GET_INIT_DATA, &init)],
    );

    // discovery follow-ups for each created node
    for _ in 0..2 {
        mock.script_reply(
            FUNC_GET_NODE_PROTOCOL_INFO,
            vec![data_frame(
                MSG_TYPE_RESPONSE,
                FUNC_GET_NODE_PROTOCOL_INFO,
                &[0x93, 0x16, 0x00, 0x04, 0x10, 0x01],
            )],
        );
        mock.script_reply(
            FUNC_REQUEST_NODE_INFO,
            vec![data_frame(MSG_TYPE_RESPONSE, FUNC_REQUEST_NODE_INFO, &[0x01])],
        );
    }
}

fn connected_driver() -> (Driver, Receiver<DriverEvent>, MockHandle) {
    let _ = env_logger::builder().is_test(true).try_init();
    let transport = MockTransport::new();
    let mock = transport.handle();
    mock.auto_complete_send_data(true);
    script_bootstrap(&mock);

    let config = DriverConfig {
        port: "mock".into(),
        inter_command_delay: Duration::from_millis(100),
        snapshot_path: None,
        network_key: [0x42; 16],
    };
    let (mut driver, events) = Driver::new(Box::new(transport), config);
    driver.connect().expect("connect");
    wait_until(|| driver.node_ids() == vec![2, 5], "bitmask discovery");
    (driver, events, mock)
}

fn next_node_updated(events: &Receiver<DriverEvent>) -> (u8, Vec<ClassEvent>) {
    let deadline = Instant::now() + DEADLINE;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(DriverEvent::NodeUpdated { node_id, events }) => {
                return (node_id, events.into_iter().map(|d| d.event).collect());
            }
            Ok(_) => continue,
            Err(_) => panic!("no NodeUpdated event"),
        }
    }
}

#[test]
fn test_operations_rejected_outside_connected_lifetime() {
    let _ = env_logger::builder().is_test(true).try_init();
    let transport = MockTransport::new();
    let (driver, _events) = Driver::new(Box::new(transport), DriverConfig::default());
    assert!(matches!(
        driver.request_node_info(2),
        Err(DriverError::NotConnected)
    ));

    let (mut driver, _events, _mock) = connected_driver();
    driver.disconnect();
    assert!(matches!(
        driver.request_node_info(2),
        Err(DriverError::Disposed)
    ));
}

#[test]
fn test_bootstrap_discovers_bitmask_nodes() {
    let (driver, _events, _mock) = connected_driver();

    // node 1 is the controller and is excluded
    assert_eq!(driver.node_ids(), vec![2, 5]);
    assert_eq!(driver.controller_id(), 1);
    wait_until(
        || driver.controller_version().is_some(),
        "version response",
    );
    assert_eq!(driver.controller_version().as_deref(), Some("Z-Wave 3.99"));

    // protocol info was applied to both nodes
    wait_until(
        || driver.with_node(2, |n| n.generic_type == 0x10) == Some(true),
        "protocol info",
    );
}

#[test]
fn test_node_info_frame_builds_class_table() {
    let (driver, _events, mock) = connected_driver();

    // unsolicited node info frame for node 2: binary switch + wake-up
    let body = [
        UPDATE_STATE_NODE_INFO_RECEIVED,
        0x02,
        0x05,
        0x04,
        0x10,
        0x01,
        ids::SWITCH_BINARY,
        ids::WAKE_UP,
    ];
    mock.inject(data_frame(MSG_TYPE_REQUEST, zwave_proto::FUNC_APPLICATION_UPDATE, &body));

    wait_until(
        || driver.with_node(2, |n| n.supports_command_class(ids::SWITCH_BINARY)) == Some(true),
        "node info frame",
    );
    assert_eq!(
        driver.with_node(2, |n| n.supports_command_class(ids::WAKE_UP)),
        Some(true)
    );
}

#[test]
fn test_send_application_completes_transaction() {
    let (driver, _events, mock) = connected_driver();
    mock.take_written();

    let handle = driver
        .send_application(2, zwave_classes::basic::SwitchBinary::set(true))
        .expect("enqueue");
    assert!(handle.wait(DEADLINE), "transaction should complete");

    let frames = mock.written_data_frames();
    let send = frames
        .iter()
        .find(|f| f[3] == FUNC_SEND_DATA)
        .expect("SendData frame written");
    // payload: [node][len][class][cmd][value][txOptions][cb]
    assert_eq!(send[4], 2);
    assert_eq!(send[6], ids::SWITCH_BINARY);
    assert_eq!(send[8], 0xFF);
}

#[test]
fn test_application_report_decodes_to_event() {
    let (_driver, events, mock) = connected_driver();

    mock.inject(app_command(5, &[ids::SWITCH_BINARY, 0x03, 0xFF]));
    let (node_id, decoded) = next_node_updated(&events);
    assert_eq!(node_id, 5);
    assert_eq!(decoded, vec![ClassEvent::SwitchBinaryReport { on: true }]);
}

#[test]
fn test_duplicate_frames_yield_one_event() {
    let (_driver, events, mock) = connected_driver();

    let frame = app_command(5, &[ids::BASIC, 0x03, 0x63]);
    mock.inject(frame.clone());
    mock.inject(frame);

    let (_, decoded) = next_node_updated(&events);
    assert_eq!(decoded, vec![ClassEvent::BasicReport { value: 0x63 }]);
    // the repeat inside the window is suppressed
    let deadline = Instant::now() + Duration::from_millis(500);
    while Instant::now() < deadline {
        if let Ok(DriverEvent::NodeUpdated { .. }) = events.try_recv() {
            panic!("duplicate frame was delivered");
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_sleeping_node_diversion_and_wake_flush() {
    let (driver, _events, mock) = connected_driver();

    // node 2 advertises wake-up and is asleep
    driver.with_node_mut(2, |n| {
        n.update_node_info(&[ids::SWITCH_BINARY, ids::WAKE_UP]);
        WakeUp::set_sleeping(n, true);
    });
    mock.take_written();

    let on = zwave_classes::basic::SwitchBinary::set(true);
    let handle = driver.send_application(2, on).expect("enqueue");
    // fire-and-forget: resolved immediately, nothing on the wire
    assert!(handle.wait(Duration::from_millis(100)));
    std::thread::sleep(Duration::from_millis(300));
    assert!(
        mock.written_data_frames().iter().all(|f| f[3] != FUNC_SEND_DATA),
        "sleeping diversion must not reach the transport"
    );

    // wake-up notification flushes the held message
    mock.inject(app_command(2, &[ids::WAKE_UP, 0x07]));
    wait_until(
        || {
            mock.written_data_frames()
                .iter()
                .any(|f| f[3] == FUNC_SEND_DATA && f[4] == 2 && f[6] == ids::SWITCH_BINARY)
        },
        "wake-up flush",
    );
    assert_eq!(driver.with_node(2, WakeUp::is_sleeping), Some(false));
}

#[test]
fn test_retry_exhaustion_flags_node_asleep() {
    let (driver, _events, mock) = connected_driver();

    // node 2 advertises wake-up; the transport swallows every send attempt
    driver.with_node_mut(2, |n| {
        n.update_node_info(&[ids::SWITCH_BINARY, ids::WAKE_UP]);
    });
    mock.take_written();
    mock.fail_writes(true);

    let handle = driver
        .send_application(2, zwave_classes::basic::SwitchBinary::set(true))
        .expect("enqueue");
    assert!(!handle.wait(DEADLINE), "unreachable node must fail the send");

    // exhausting the retries marks the node asleep and holds the payload
    wait_until(
        || driver.with_node(2, WakeUp::is_sleeping) == Some(true),
        "sleeping flag after retry exhaustion",
    );

    // a later send diverts at enqueue time without touching the wire
    mock.fail_writes(false);
    mock.take_written();
    let handle = driver
        .send_application(2, zwave_classes::basic::SwitchBinary::set(false))
        .expect("enqueue");
    assert!(handle.wait(Duration::from_millis(100)));
    std::thread::sleep(Duration::from_millis(300));
    assert!(
        mock.written_data_frames().iter().all(|f| f[3] != FUNC_SEND_DATA),
        "sends to a node flagged asleep must divert, not transmit"
    );
}

#[test]
fn test_heal_progress_events() {
    let (driver, events, mock) = connected_driver();

    driver.heal_node(2).expect("heal");
    mock.inject(data_frame(
        MSG_TYPE_REQUEST,
        FUNC_REQUEST_NODE_NEIGHBOR_UPDATE,
        &[0x02, 0x22],
    ));

    let deadline = Instant::now() + DEADLINE;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(DriverEvent::HealProgress { status, .. }) => {
                assert_eq!(status, OperationStatus::Done);
                break;
            }
            Ok(_) => continue,
            Err(_) => panic!("no HealProgress event"),
        }
    }
}

#[test]
fn test_secured_send_starts_nonce_exchange() {
    let (driver, _events, mock) = connected_driver();

    driver.with_node_mut(2, |n| {
        n.update_node_info(&[ids::SECURITY, ids::SWITCH_BINARY]);
        n.update_secured_node_info(&[ids::SWITCH_BINARY]);
        n.data.security_mut().network_key = [0x42; 16];
        n.data.security_mut().scheme_agreed = true;
    });
    mock.take_written();

    driver
        .send_application(2, zwave_classes::basic::SwitchBinary::set(true))
        .expect("enqueue");

    // the clear-text payload never goes out; a nonce request does
    wait_until(
        || {
            mock.written_data_frames()
                .iter()
                .any(|f| f[3] == FUNC_SEND_DATA && f[6] == ids::SECURITY && f[7] == 0x40)
        },
        "nonce get",
    );
    assert!(mock
        .written_data_frames()
        .iter()
        .all(|f| f[3] != FUNC_SEND_DATA || f[6] != ids::SWITCH_BINARY));

    // device answers with a nonce; the driver sends the encrypted payload
    let mut nonce_report = vec![ids::SECURITY, 0x80];
    nonce_report.extend_from_slice(&[0xCC; 8]);
    mock.inject(app_command(2, &nonce_report));

    wait_until(
        || {
            mock.written_data_frames()
                .iter()
                .any(|f| f[3] == FUNC_SEND_DATA && f[6] == ids::SECURITY && f[7] == 0x81)
        },
        "encrypted payload",
    );
}
