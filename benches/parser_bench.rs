// benches/parser_bench.rs
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use object_gateway::network::{
    message::ATTR_PID, parser, EventKind, NetworkMessage, NetworkMessageEvent, NetworkMessageRequest,
    RequestOperation,
};

fn bench_parse(c: &mut Criterion) {
    let request: NetworkMessage = NetworkMessageRequest::new(42, "sensor-a", "sensor-b", RequestOperation::GetPropertyValue)
        .with_attribute(ATTR_PID, "temperature")
        .into();
    let request = parser::to_wire(&request).unwrap();

    let event: NetworkMessage =
        NetworkMessageEvent::new(7, "sensor-b", "alarm", EventKind::Published, Some("{\"level\":3}".into())).into();
    let event = parser::to_wire(&event).unwrap();

    c.bench_function("parse_request", |b| b.iter(|| parser::parse(black_box(&request))));
    c.bench_function("parse_event", |b| b.iter(|| parser::parse(black_box(&event))));
    c.bench_function("parse_malformed", |b| b.iter(|| parser::parse(black_box("{\"messageType\":\"bogus\"}"))));
}

criterion_group!(parser_benches, bench_parse);
criterion_main!(parser_benches);
