// tests/integration/gateway_tests.rs
use std::collections::HashMap;
use std::time::{Duration, Instant};

use object_gateway::{
    network::{message::ATTR_PID, EventKind, MemoryHub, RequestOperation},
    utils::error::GatewayError,
};

use crate::common::{eventually, TestGateway};

fn pid(name: &str) -> HashMap<String, String> {
    HashMap::from([(ATTR_PID.to_string(), name.to_string())])
}

#[test_log::test(tokio::test)]
async fn test_request_crosses_gateways() {
    let hub = MemoryHub::new();
    let gateway_a = TestGateway::new(&hub);
    let gateway_b = TestGateway::new(&hub);

    gateway_a.manager.establish_connection("a", "pa").await.unwrap();
    gateway_b.manager.establish_connection("b", "pb").await.unwrap();

    let started = Instant::now();
    let response = gateway_a
        .manager
        .send_request("a", "b", RequestOperation::GetPropertyValue, pid("temp"), HashMap::new(), None)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.source_oid(), "b");

    let body: serde_json::Value = serde_json::from_str(response.body().unwrap()).unwrap();
    assert_eq!(body["object"], "b");
    assert_eq!(body["property"], "temp");
}

#[tokio::test]
async fn test_request_errors_surface_as_gateway_errors() {
    let hub = MemoryHub::new();
    let gateway = TestGateway::new(&hub);

    let not_connected = gateway
        .manager
        .send_request("a", "b", RequestOperation::GetPropertyValue, pid("temp"), HashMap::new(), None)
        .await;
    assert!(matches!(not_connected, Err(GatewayError::NotConnected(_))));

    gateway.manager.establish_connection("a", "pa").await.unwrap();
    let unreachable = gateway
        .manager
        .send_request("a", "ghost", RequestOperation::GetPropertyValue, pid("temp"), HashMap::new(), None)
        .await;
    assert!(matches!(unreachable, Err(GatewayError::Unreachable(_))));
}

#[tokio::test]
async fn test_reestablishing_checks_the_password() {
    let hub = MemoryHub::new();
    let gateway = TestGateway::new(&hub);

    let first = gateway.manager.establish_connection("a", "pa").await.unwrap();
    let second = gateway.manager.establish_connection("a", "pa").await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    let wrong = gateway.manager.establish_connection("a", "nope").await;
    assert!(matches!(wrong, Err(GatewayError::Unauthorized(_))));
    assert_eq!(gateway.manager.connection_list(), vec!["a".to_string()]);
}

#[tokio::test]
async fn test_rejected_engine_login_leaves_no_session() {
    let hub = MemoryHub::new();
    hub.register_credentials("a", "pa");
    let gateway = TestGateway::new(&hub);

    let result = gateway.manager.establish_connection("a", "wrong").await;

    assert!(matches!(result, Err(GatewayError::ServiceUnavailable(_))));
    assert!(gateway.manager.connection_list().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_event_subscription_lifecycle() {
    let hub = MemoryHub::new();
    let subscriber = TestGateway::new(&hub);
    let owner = TestGateway::new(&hub);

    subscriber.manager.establish_connection("a", "pa").await.unwrap();
    owner.manager.establish_connection("b", "pb").await.unwrap();
    owner.manager.activate_event_channel("b", "alarm").await.unwrap();

    let response = subscriber
        .manager
        .subscribe_to_event_channel("a", "b", "alarm")
        .await
        .unwrap();
    assert_eq!(response.status_code(), 200);

    let a = subscriber.manager.descriptor("a").unwrap();
    let b = owner.manager.descriptor("b").unwrap();
    assert_eq!(a.subscribed_event_channels().get("alarm").map(String::as_str), Some("b"));
    assert_eq!(b.number_of_subscribers("alarm"), Some(1));

    let status = subscriber.manager.event_channel_status("a", "b", "alarm").await.unwrap();
    let status: serde_json::Value = serde_json::from_str(status.body().unwrap()).unwrap();
    assert_eq!(status["active"], true);
    assert_eq!(status["subscribers"], 1);

    let sent = owner
        .manager
        .send_event_to_subscribed_objects("b", "alarm", Some("{\"level\":3}".into()))
        .await
        .unwrap();
    assert_eq!(sent, 1);
    assert!(eventually(|| subscriber.agent.events.lock().len() == 1).await);
    {
        let events = subscriber.agent.events.lock();
        let (destination, event) = &events[0];
        assert_eq!(destination, "a");
        assert_eq!(event.event_id(), "alarm");
        assert_eq!(event.kind(), EventKind::Published);
        assert_eq!(event.body(), Some("{\"level\":3}"));
    }

    owner.manager.deactivate_event_channel("b", "alarm").await.unwrap();
    assert_eq!(b.number_of_subscribers("alarm"), Some(0));
    assert!(eventually(|| a.subscribed_event_channels().is_empty()).await);
    assert!(eventually(|| subscriber.agent.events.lock().len() == 2).await);
    assert_eq!(subscriber.agent.events.lock()[1].1.kind(), EventKind::ChannelClosed);
}

#[tokio::test]
async fn test_event_channel_errors() {
    let hub = MemoryHub::new();
    let subscriber = TestGateway::new(&hub);
    let owner = TestGateway::new(&hub);

    subscriber.manager.establish_connection("a", "pa").await.unwrap();
    owner.manager.establish_connection("b", "pb").await.unwrap();

    let missing = subscriber
        .manager
        .subscribe_to_event_channel("a", "b", "alarm")
        .await
        .unwrap();
    assert_eq!(missing.status_code(), 404);
    assert!(subscriber.manager.descriptor("a").unwrap().subscribed_event_channels().is_empty());

    let deactivated = owner.manager.deactivate_event_channel("b", "alarm").await;
    assert!(matches!(deactivated, Err(GatewayError::NotFound(_))));

    let published = owner.manager.send_event_to_subscribed_objects("b", "alarm", None).await;
    assert!(matches!(published, Err(GatewayError::NotFound(_))));

    owner.manager.activate_event_channel("b", "alarm").await.unwrap();
    owner.manager.deactivate_event_channel("b", "alarm").await.unwrap();
    let inactive = subscriber
        .manager
        .subscribe_to_event_channel("a", "b", "alarm")
        .await
        .unwrap();
    assert_eq!(inactive.status_code(), 403);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let hub = MemoryHub::new();
    let subscriber = TestGateway::new(&hub);
    let owner = TestGateway::new(&hub);

    subscriber.manager.establish_connection("a", "pa").await.unwrap();
    owner.manager.establish_connection("b", "pb").await.unwrap();
    owner.manager.activate_event_channel("b", "alarm").await.unwrap();
    subscriber.manager.subscribe_to_event_channel("a", "b", "alarm").await.unwrap();

    let response = subscriber
        .manager
        .unsubscribe_from_event_channel("a", "b", "alarm")
        .await
        .unwrap();
    assert_eq!(response.status_code(), 200);
    assert!(subscriber.manager.descriptor("a").unwrap().subscribed_event_channels().is_empty());

    let sent = owner.manager.send_event_to_subscribed_objects("b", "alarm", None).await.unwrap();
    assert_eq!(sent, 0);
}

#[tokio::test]
async fn test_sweep_and_terminate() {
    let hub = MemoryHub::new();
    let gateway = TestGateway::new(&hub);

    let a = gateway.manager.establish_connection("a", "pa").await.unwrap();
    gateway.manager.establish_connection("b", "pb").await.unwrap();
    let roster = gateway.manager.roster("a").await.unwrap();
    assert_eq!(roster.into_iter().collect::<Vec<_>>(), vec!["b".to_string()]);

    // the engine dropped "a" behind the manager's back
    a.disconnect().await;
    assert_eq!(gateway.manager.sweep().await, 1);
    assert_eq!(gateway.manager.connection_list(), vec!["b".to_string()]);

    assert!(gateway.manager.terminate_connection("b").await);
    assert!(!gateway.manager.terminate_connection("b").await);
    assert!(!gateway.manager.is_connected("b").await);
}

#[tokio::test]
async fn test_maintenance_task_evicts_dead_sessions() {
    let hub = MemoryHub::new();
    let gateway = TestGateway::new(&hub);

    let a = gateway.manager.establish_connection("a", "pa").await.unwrap();
    let maintenance = gateway.manager.start_maintenance(Duration::from_millis(20));

    a.disconnect().await;
    assert!(eventually(|| gateway.manager.connection_list().is_empty()).await);

    maintenance.abort();
}
