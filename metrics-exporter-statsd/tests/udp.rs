use std::{
    net::UdpSocket,
    time::{Duration, Instant},
};

use metrics_exporter_statsd::{Batch, MetricType, MetricValue, SendOutcome, StatsdBuilder};

fn listener() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap_or_else(|e| panic!("failed to bind listener: {e:?}"));
    socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

fn receive(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 1500];
    let len = socket.recv(&mut buf).unwrap_or_else(|e| panic!("no datagram received: {e:?}"));
    String::from_utf8(buf[..len].to_vec()).unwrap()
}

#[test]
fn each_name_is_its_own_datagram() {
    let (socket, port) = listener();
    let client = StatsdBuilder::default().with_port(port).build();

    client.increment(["a", "b"]);

    assert_eq!(receive(&socket), "a:1|c");
    assert_eq!(receive(&socket), "b:1|c");
}

#[test]
fn prefix_and_types_on_the_wire() {
    let (socket, port) = listener();
    let client = StatsdBuilder::default()
        .with_prefix("myapp")
        .with_remote_address(format!("127.0.0.1:{port}"))
        .unwrap()
        .build();

    client.increment("requests");
    client.decrement_by("pool", -2, 1.0);
    client.timing("render", 12.5, 1.0);
    client.gauge("queue_depth", 42, 1.0);
    client.set("uniques", 1234, 1.0);

    assert_eq!(receive(&socket), "myapp.requests:1|c");
    assert_eq!(receive(&socket), "myapp.pool:-2|c");
    assert_eq!(receive(&socket), "myapp.render:12.5|ms");
    assert_eq!(receive(&socket), "myapp.queue_depth:42|g");
    assert_eq!(receive(&socket), "myapp.uniques:1234|s");
}

#[test]
fn packed_payloads() {
    let (socket, port) = listener();
    let client = StatsdBuilder::default().with_port(port).with_maximum_payload_length(1432).build();

    let mut batch = Batch::new();
    batch.insert("a", MetricValue::Integer(1), MetricType::Counter);
    batch.insert("b", MetricValue::Integer(2), MetricType::Gauge);

    let outcome = client.send(&batch, 1.0);
    assert!(outcome.is_complete(), "unexpected outcome: {outcome:?}");
    assert_eq!(receive(&socket), "a:1|c\nb:2|g");
}

#[test]
fn nobody_listening_is_not_an_error() {
    let port = {
        let (socket, port) = listener();
        drop(socket);
        port
    };

    let client = StatsdBuilder::default().with_port(port).build();

    let started = Instant::now();
    for _ in 0..10 {
        client.increment("lost");
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn disabled_sends_nothing() {
    let (socket, port) = listener();
    socket.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let client = StatsdBuilder::default().with_port(port).with_enabled(false).build();

    client.increment("requests");

    let mut batch = Batch::new();
    batch.insert("requests", MetricValue::Integer(1), MetricType::Counter);
    assert!(matches!(client.send(&batch, 1.0), SendOutcome::Disabled));

    let mut buf = [0u8; 64];
    assert!(socket.recv(&mut buf).is_err());
}
