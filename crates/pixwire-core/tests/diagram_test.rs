#![allow(clippy::unwrap_used)]

// Diagram session against a mock diagram server.

use std::time::Duration;

use pixwire_core::{
    Command, CommandResult, ConnectionState, CoreError, Diagram, DiagramConfig, Endpoint, Handle,
    WireColor,
};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn saved_diagram() -> Value {
    let ports: Vec<Value> = (1..=4)
        .map(|n| {
            json!({
                "id": format!("dp{n}"),
                "differentialId": "d1",
                "portNumber": n,
                "name": format!("Port {n}"),
                "sharedPorts": [
                    { "name": "A", "maxPixels": 340 },
                    { "name": "B", "maxPixels": 340 }
                ]
            })
        })
        .collect();

    json!({
        "controllers": [{
            "id": "c1", "name": "F16", "type": "Falcon",
            "ports": [{ "id": "cp1", "name": "Port 1", "maxPixels": 680 }]
        }],
        "differentials": [{
            "id": "d1", "name": "DB1",
            "differentialPorts": ["dp1", "dp2", "dp3", "dp4"]
        }],
        "differentialPorts": ports,
        "receivers": [{
            "id": "rx1", "name": "Rx1",
            "ports": [
                { "id": "rp1", "name": "Out 1", "maxPixels": 340 },
                { "id": "rp2", "name": "Out 2", "maxPixels": 340 }
            ]
        }],
        "models": [{ "id": "m1", "name": "Arch", "pixels": 120, "portId": "rp1" }],
        "connections": [
            {
                "id": "e1", "source": "c1", "sourceHandle": "controller-output",
                "target": "d1", "targetHandle": "diff-board-input", "wireColor": "red"
            },
            {
                "id": "e2", "source": "dp1", "sourceHandle": "diff-port-output",
                "target": "rx1", "targetHandle": "receiver-input", "wireColor": "blue"
            }
        ],
        "viewport": { "x": 0, "y": 0, "zoom": 1 }
    })
}

async fn mock_diagram(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/diagram"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn config(server: &MockServer, feed: bool) -> DiagramConfig {
    DiagramConfig {
        server: Some(Url::parse(&server.uri()).unwrap()),
        feed_enabled: feed,
        ..DiagramConfig::default()
    }
}

fn two_slot_rules(config: &mut DiagramConfig) {
    config.rules.shared_port_template.truncate(2);
    for slot in &mut config.rules.shared_port_template {
        slot.max_pixels = 340;
    }
}

#[tokio::test]
async fn loads_saved_diagram_on_connect() {
    let server = MockServer::start().await;
    mock_diagram(&server, saved_diagram()).await;

    let mut cfg = config(&server, false);
    two_slot_rules(&mut cfg);
    let diagram = Diagram::new(cfg);
    diagram.connect().await.unwrap();

    let topo = diagram.snapshot();
    assert_eq!(topo.controllers().count(), 1);
    assert_eq!(topo.connections().count(), 2);
    let slots = topo
        .capacity()
        .differential_port_utilization(&"dp1".into())
        .unwrap();
    assert_eq!(slots[0].current, 120);
    assert!(diagram.store().last_load().is_some());

    diagram.disconnect().await;
}

#[tokio::test]
async fn empty_server_diagram_starts_empty() {
    let server = MockServer::start().await;
    mock_diagram(&server, json!({})).await;

    let diagram = Diagram::new(config(&server, false));
    diagram.connect().await.unwrap();
    assert!(diagram.snapshot().is_empty());
    assert_eq!(*diagram.connection_state().borrow(), ConnectionState::Connected);
    diagram.disconnect().await;
}

#[tokio::test]
async fn malformed_saved_diagram_fails_connect() {
    let server = MockServer::start().await;
    let mut body = saved_diagram();
    body["differentials"][0]["differentialPorts"] = json!(["dp1", "dp2"]);
    mock_diagram(&server, body).await;

    let diagram = Diagram::new(config(&server, false));
    let err = diagram.connect().await.unwrap_err();
    assert!(err.rejection().is_some());
    assert_eq!(*diagram.connection_state().borrow(), ConnectionState::Failed);
}

#[tokio::test]
async fn edits_are_saved_back() {
    let server = MockServer::start().await;
    mock_diagram(&server, json!({})).await;
    Mock::given(method("POST"))
        .and(path("/api/diagram"))
        .and(body_partial_json(json!({ "differentials": [{ "name": "DB7" }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let diagram = Diagram::new(config(&server, false));
    diagram.connect().await.unwrap();
    let result = diagram
        .execute(Command::AddDifferential { name: "DB7".into() })
        .await
        .unwrap();
    assert!(matches!(result, CommandResult::Created(_)));

    diagram.save().await.unwrap();
    diagram.disconnect().await;
}

#[tokio::test]
async fn feed_updates_replace_controllers_only() {
    let server = MockServer::start().await;
    mock_diagram(&server, saved_diagram()).await;

    let update = json!({
        "type": "update",
        "controllers": [
            { "id": "c1", "name": "F16 (live)", "type": "Falcon",
              "ports": [{ "id": "cp1", "name": "Port 1", "maxPixels": 680 }] },
            { "id": "c9", "name": "Discovered", "type": "WLED",
              "ports": [{ "id": "cp9", "name": "Out", "maxPixels": 300 }] }
        ]
    });
    let body = format!(": hello\n\ndata: {{\"type\":\"heartbeat\"}}\n\ndata: {update}\n\n");
    Mock::given(method("GET"))
        .and(path("/api/xlights/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut cfg = config(&server, true);
    two_slot_rules(&mut cfg);
    let diagram = Diagram::new(cfg);
    let mut stream = diagram.subscribe();
    diagram.connect().await.unwrap();

    let topo = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let topo = stream.latest();
            if topo.controllers().count() == 2 {
                return topo;
            }
            stream.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert_eq!(topo.controller(&"c1".into()).unwrap().name, "F16 (live)");
    assert_eq!(topo.receivers().count(), 1);
    assert_eq!(topo.connections().count(), 2);
    assert!(diagram.store().last_feed_update().is_some());

    diagram.disconnect().await;
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let diagram = Diagram::new(DiagramConfig {
        server: Some(Url::parse("http://127.0.0.1:9/").unwrap()),
        feed_enabled: false,
        timeout: Duration::from_secs(2),
        ..DiagramConfig::default()
    });
    let err = diagram.connect().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::ConnectionFailed { .. } | CoreError::Timeout { .. }
    ));
}

#[tokio::test]
async fn wires_through_the_command_queue() {
    let server = MockServer::start().await;
    mock_diagram(&server, saved_diagram()).await;

    let mut cfg = config(&server, false);
    two_slot_rules(&mut cfg);
    let diagram = Diagram::new(cfg);
    diagram.connect().await.unwrap();

    let err = diagram
        .execute(Command::Connect {
            from: Endpoint::new("dp2", Handle::DiffPortOutput),
            to: Endpoint::new("rx1", Handle::ReceiverInput),
            wire_color: WireColor::Green,
        })
        .await
        .unwrap_err();
    assert!(err.rejection().is_some());

    let CommandResult::Disconnected(conn) = diagram
        .execute(Command::Disconnect { id: "e2".into() })
        .await
        .unwrap()
    else {
        panic!("expected a disconnect");
    };
    assert_eq!(conn.target, "rx1".into());
    assert!(diagram.snapshot().hierarchy().parent_of(&"rx1".into()).is_none());

    diagram.disconnect().await;
}
