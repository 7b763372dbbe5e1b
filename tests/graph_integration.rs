//! Port registry and connection graph through the public backend API.

use ersatz::prelude::*;
use ersatz::{ConnectionError, Error, Exact, Prefix};
use proptest::prelude::*;

mod helpers;
use helpers::*;

// =============================================================================
// Registration
// =============================================================================

#[test]
fn test_duplicate_registration_leaves_registry_unchanged() {
    let backend = test_backend();
    let first = backend
        .register_port("in_1", DataType::Audio, PortFlags::INPUT)
        .unwrap();
    let before = backend.get_ports("", None, PortFlags::NONE);

    let err = backend
        .register_port("in_1", DataType::Midi, PortFlags::OUTPUT)
        .unwrap_err();
    assert_eq!(err, Error::DuplicateName("test:in_1".to_string()));

    assert_eq!(backend.get_ports("", None, PortFlags::NONE), before);
    assert_eq!(backend.port_data_type(first).unwrap(), DataType::Audio);
    assert_eq!(backend.port_flags(first).unwrap(), PortFlags::INPUT);
}

#[test]
fn test_get_ports_registration_order_and_filters() {
    let backend = test_backend();
    backend.register_port("z_out", DataType::Audio, PortFlags::OUTPUT).unwrap();
    backend.register_port("a_in", DataType::Audio, PortFlags::INPUT).unwrap();
    backend
        .register_port("midi_in", DataType::Midi, PortFlags::INPUT | PortFlags::TERMINAL)
        .unwrap();

    assert_eq!(
        backend.get_ports("", None, PortFlags::NONE),
        vec!["test:z_out", "test:a_in", "test:midi_in"]
    );
    assert_eq!(
        backend.get_ports("", Some(DataType::Audio), PortFlags::INPUT),
        vec!["test:a_in"]
    );
    assert_eq!(
        backend.get_ports("", None, PortFlags::INPUT | PortFlags::TERMINAL),
        vec!["test:midi_in"]
    );
    assert_eq!(backend.get_ports(Exact("test:a_in"), None, PortFlags::NONE).len(), 1);
    assert_eq!(backend.get_ports(Prefix("test:"), None, PortFlags::NONE).len(), 3);
    assert_eq!(
        backend.get_ports(|name: &str| name.ends_with("_in"), None, PortFlags::NONE),
        vec!["test:a_in", "test:midi_in"]
    );
}

// =============================================================================
// Connections
// =============================================================================

#[test]
fn test_connect_then_disconnect_is_symmetric() {
    let backend = test_backend();
    let a = backend.register_port("out", DataType::Audio, PortFlags::OUTPUT).unwrap();
    let b = backend.register_port("in", DataType::Audio, PortFlags::INPUT).unwrap();

    backend.connect_handles(a, b).unwrap();
    assert!(backend.is_connected_to(a, b).unwrap());
    assert!(backend.is_connected_to(b, a).unwrap());

    backend.disconnect_handles(a, b).unwrap();
    assert!(!backend.is_connected_to(a, b).unwrap());
    assert!(!backend.is_connected_to(b, a).unwrap());

    // Disconnecting again is a no-op.
    backend.disconnect_handles(a, b).unwrap();
}

#[test]
fn test_connect_rejection_reasons() {
    let backend = test_backend();
    let out = backend.register_port("out", DataType::Audio, PortFlags::OUTPUT).unwrap();
    let out2 = backend.register_port("out2", DataType::Audio, PortFlags::OUTPUT).unwrap();
    let midi_in = backend.register_port("midi_in", DataType::Midi, PortFlags::INPUT).unwrap();
    let inp = backend.register_port("in", DataType::Audio, PortFlags::INPUT).unwrap();

    let reason = |r: Result<(), Error>| match r {
        Err(Error::InvalidConnection { reason, .. }) => reason,
        other => panic!("expected InvalidConnection, got {other:?}"),
    };
    assert_eq!(reason(backend.connect_handles(out, out2)), ConnectionError::BothOutputs);
    assert_eq!(reason(backend.connect_handles(out, midi_in)), ConnectionError::TypeMismatch);
    assert_eq!(reason(backend.connect_handles(inp, inp)), ConnectionError::SelfConnection);
    backend.connect_handles(out, inp).unwrap();
    assert_eq!(reason(backend.connect("test:in", "test:out")), ConnectionError::AlreadyConnected);
}

#[test]
fn test_disconnect_all_then_unregister_leaves_no_dangling_edges() {
    let backend = test_backend();
    let hub = backend.register_port("hub", DataType::Audio, PortFlags::OUTPUT).unwrap();
    let sinks: Vec<_> = (0..5)
        .map(|i| {
            backend
                .register_port(&format!("sink_{i}"), DataType::Audio, PortFlags::INPUT)
                .unwrap()
        })
        .collect();
    for &sink in &sinks {
        backend.connect_handles(hub, sink).unwrap();
    }
    assert_eq!(backend.get_connections(hub).unwrap().len(), 5);

    backend.disconnect_all(hub).unwrap();
    backend.unregister_port(hub).unwrap();

    for &sink in &sinks {
        assert!(!backend.is_connected(sink).unwrap());
        assert!(backend.get_connections(sink).unwrap().is_empty());
    }
    assert_eq!(backend.get_port_by_name("test:hub"), None);
}

#[test]
fn test_unregister_connected_port_disconnects_peers() {
    let backend = test_backend();
    let out = backend.register_port("out", DataType::Midi, PortFlags::OUTPUT).unwrap();
    let inp = backend.register_port("in", DataType::Midi, PortFlags::INPUT).unwrap();
    backend.connect_handles(out, inp).unwrap();

    backend.unregister_port(out).unwrap();
    assert!(!backend.is_connected(inp).unwrap());
    assert_eq!(backend.is_connected(out), Err(Error::InvalidHandle(out)));
}

#[test]
fn test_physically_connected_to_system_port() {
    let backend = test_backend();
    backend
        .set_process_handler(ClosureProcessHandler::new(|_| Control::Continue))
        .unwrap();
    backend.start(false).unwrap();

    let out = backend.register_port("out", DataType::Audio, PortFlags::OUTPUT).unwrap();
    assert!(!backend.is_physically_connected(out).unwrap());
    backend.connect_port(out, "system:playback_1").unwrap();
    assert!(backend.is_physically_connected(out).unwrap());
    assert!(backend.connected_to(out, "system:playback_1").unwrap());

    backend.stop().unwrap();
    // System ports are gone, and the edge with them.
    assert!(!backend.is_connected(out).unwrap());
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Connect(usize, usize),
    Disconnect(usize, usize),
    DisconnectAll(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..6, 0usize..6).prop_map(|(a, b)| Op::Connect(a, b)),
        (0usize..6, 0usize..6).prop_map(|(a, b)| Op::Disconnect(a, b)),
        (0usize..6).prop_map(Op::DisconnectAll),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_connections_are_mirrored(ops in prop::collection::vec(op(), 1..40)) {
        let backend = test_backend();
        let ports: Vec<PortHandle> = (0..6)
            .map(|i| {
                let flags = if i < 3 { PortFlags::OUTPUT } else { PortFlags::INPUT };
                backend.register_port(&format!("p{i}"), DataType::Audio, flags).unwrap()
            })
            .collect();

        for op in ops {
            match op {
                Op::Connect(a, b) => {
                    if backend.connect_handles(ports[a], ports[b]).is_ok() {
                        prop_assert!(backend.is_connected_to(ports[a], ports[b]).unwrap());
                        prop_assert!(backend.is_connected_to(ports[b], ports[a]).unwrap());
                    }
                }
                Op::Disconnect(a, b) => {
                    backend.disconnect_handles(ports[a], ports[b]).unwrap();
                    prop_assert!(!backend.is_connected_to(ports[a], ports[b]).unwrap());
                    prop_assert!(!backend.is_connected_to(ports[b], ports[a]).unwrap());
                }
                Op::DisconnectAll(a) => {
                    backend.disconnect_all(ports[a]).unwrap();
                    prop_assert!(!backend.is_connected(ports[a]).unwrap());
                }
            }

            for &x in &ports {
                for &y in &ports {
                    prop_assert_eq!(
                        backend.is_connected_to(x, y).unwrap(),
                        backend.is_connected_to(y, x).unwrap()
                    );
                }
                prop_assert!(!backend.is_connected_to(x, x).unwrap());
            }
        }
    }
}
