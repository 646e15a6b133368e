// Shared fixture for unit tests.

use std::num::NonZeroU8;

use crate::config::TopologyRules;
use crate::model::{
    Connection, Controller, ControllerType, Differential, DifferentialPort, EntityId, Handle,
    Model, Port, Receiver, SharedPort, WireColor,
};
use crate::store::Topology;

/// c1 ── d1 (dp1..dp4, slots A/B at 340) ── dp1 ── rx1 (m1 = 120, m2 = 80)
///
/// Also present but unwired: controller c2 and receiver rx2.
#[allow(clippy::unwrap_used)]
pub(crate) fn sample_topology() -> Topology {
    let rules = TopologyRules {
        ports_per_board: NonZeroU8::new(4).unwrap(),
        shared_port_template: vec![SharedPort::new("A", 340), SharedPort::new("B", 340)],
    };
    let mut topo = Topology::new(rules.clone());

    topo.upsert(Controller {
        id: "c1".into(),
        name: "Falcon F16".into(),
        controller_type: ControllerType::Falcon,
        ports: vec![Port::new("cp1", "Port 1", 800), Port::new("cp2", "Port 2", 800)],
    })
    .unwrap();
    topo.upsert(Controller {
        id: "c2".into(),
        name: "Spare".into(),
        controller_type: ControllerType::Fpp,
        ports: vec![Port::new("cp3", "Port 1", 400)],
    })
    .unwrap();

    let port_ids: Vec<EntityId> = (1..=4).map(|n| EntityId::from(format!("dp{n}"))).collect();
    topo.upsert(Differential {
        id: "d1".into(),
        name: "DB1".into(),
        ports: port_ids.clone(),
    })
    .unwrap();
    for (n, id) in (1u8..).zip(port_ids) {
        topo.upsert(DifferentialPort {
            id,
            differential_id: "d1".into(),
            port_number: n,
            name: format!("Port {n}"),
            shared_ports: rules.shared_port_template.clone(),
        })
        .unwrap();
    }

    topo.upsert(Receiver {
        id: "rx1".into(),
        name: "Rx1".into(),
        ports: vec![Port::new("rp1", "Out 1", 340), Port::new("rp2", "Out 2", 340)],
    })
    .unwrap();
    topo.upsert(Receiver {
        id: "rx2".into(),
        name: "Rx2".into(),
        ports: vec![Port::new("rp3", "Out 1", 340), Port::new("rp4", "Out 2", 340)],
    })
    .unwrap();

    for (id, pixels, port) in [("m1", 120, "rp1"), ("m2", 80, "rp2")] {
        topo.upsert(Model {
            id: id.into(),
            name: id.to_uppercase(),
            pixels,
            port_id: port.into(),
        })
        .unwrap();
    }

    for (id, source, source_handle, target, target_handle) in [
        ("e-c1-d1", "c1", Handle::ControllerOutput, "d1", Handle::BoardInput),
        ("e-dp1-rx1", "dp1", Handle::DiffPortOutput, "rx1", Handle::ReceiverInput),
    ] {
        topo.connections.insert(
            id.into(),
            Connection {
                id: id.into(),
                source: source.into(),
                source_handle,
                target: target.into(),
                target_handle,
                wire_color: WireColor::Black,
            },
        );
    }
    topo
}
