// tests/integration/api_tests.rs
use actix_web::{
    dev::ServiceResponse,
    http::{header, StatusCode},
    test::{self, TestRequest},
    web::Data,
    App,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use object_gateway::{api, network::MemoryHub};

use crate::common::{eventually, TestGateway};

fn basic(object_id: &str, password: &str) -> (header::HeaderName, String) {
    (
        header::AUTHORIZATION,
        format!("Basic {}", STANDARD.encode(format!("{}:{}", object_id, password))),
    )
}

async fn body(response: ServiceResponse) -> Value {
    test::read_body_json(response).await
}

macro_rules! app {
    ($gateway:expr) => {
        test::init_service(
            App::new()
                .app_data(Data::from($gateway.manager.clone()))
                .configure(api::configure),
        )
        .await
    };
}

macro_rules! call {
    ($app:expr, $request:expr) => {
        test::call_service(&$app, $request.to_request()).await
    };
}

#[actix_web::test]
async fn test_requests_without_credentials_are_challenged() {
    let gateway = TestGateway::new(&MemoryHub::new());
    let app = app!(gateway);

    let response = call!(app, TestRequest::get().uri("/api/objects/login"));

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    let message = body(response).await;
    assert_eq!(message["error"], true);
    assert_eq!(message["statusCode"], 401);
}

#[actix_web::test]
async fn test_login_and_logout() {
    let gateway = TestGateway::new(&MemoryHub::new());
    let app = app!(gateway);

    let login = call!(app, TestRequest::get().uri("/api/objects/login").insert_header(basic("a", "pa")));
    assert_eq!(login.status(), StatusCode::OK);
    let message = body(login).await;
    assert_eq!(message["error"], false);
    assert_eq!(message["message"], "a");
    assert!(gateway.manager.is_connected("a").await);

    let wrong = call!(app, TestRequest::get().uri("/api/objects/logout").insert_header(basic("a", "px")));
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let logout = call!(app, TestRequest::get().uri("/api/objects/logout").insert_header(basic("a", "pa")));
    assert_eq!(logout.status(), StatusCode::OK);
    assert!(gateway.manager.connection_list().is_empty());

    let again = call!(app, TestRequest::get().uri("/api/objects/logout").insert_header(basic("a", "pa")));
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_roster_and_property_forwarding() {
    let gateway = TestGateway::new(&MemoryHub::new());
    gateway.manager.establish_connection("b", "pb").await.unwrap();
    let app = app!(gateway);

    let roster = call!(app, TestRequest::get().uri("/api/objects").insert_header(basic("a", "pa")));
    assert_eq!(roster.status(), StatusCode::OK);
    assert_eq!(body(roster).await["message"], serde_json::json!(["b"]));

    let read = call!(
        app,
        TestRequest::get()
            .uri("/api/objects/b/properties/temp")
            .insert_header(basic("a", "pa"))
    );
    assert_eq!(read.status(), StatusCode::OK);
    let value = body(read).await;
    assert_eq!(value["object"], "b");
    assert_eq!(value["property"], "temp");

    let write = call!(
        app,
        TestRequest::put()
            .uri("/api/objects/b/properties/temp")
            .insert_header(basic("a", "pa"))
            .set_payload("{\"value\":21}")
    );
    assert_eq!(write.status(), StatusCode::OK);
    assert_eq!(body(write).await["body"], "{\"value\":21}");

    let unreachable = call!(
        app,
        TestRequest::post()
            .uri("/api/objects/ghost/actions/blink")
            .insert_header(basic("a", "pa"))
    );
    assert_eq!(unreachable.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_event_channel_endpoints() {
    let gateway = TestGateway::new(&MemoryHub::new());
    let app = app!(gateway);

    let activated = call!(app, TestRequest::post().uri("/api/events/alarm").insert_header(basic("b", "pb")));
    assert_eq!(activated.status(), StatusCode::OK);

    let subscribed = call!(
        app,
        TestRequest::post()
            .uri("/api/objects/b/events/alarm")
            .insert_header(basic("a", "pa"))
    );
    assert_eq!(subscribed.status(), StatusCode::OK);

    let status = call!(
        app,
        TestRequest::get()
            .uri("/api/objects/b/events/alarm")
            .insert_header(basic("a", "pa"))
    );
    assert_eq!(status.status(), StatusCode::OK);
    let status = body(status).await;
    assert_eq!(status["active"], true);
    assert_eq!(status["subscribers"], 1);

    let published = call!(
        app,
        TestRequest::put()
            .uri("/api/events/alarm")
            .insert_header(basic("b", "pb"))
            .set_payload("{\"level\":3}")
    );
    assert_eq!(published.status(), StatusCode::OK);
    assert_eq!(body(published).await["message"]["subscribers"], 1);
    assert!(eventually(|| gateway.agent.events.lock().len() == 1).await);

    let unsubscribed = call!(
        app,
        TestRequest::delete()
            .uri("/api/objects/b/events/alarm")
            .insert_header(basic("a", "pa"))
    );
    assert_eq!(unsubscribed.status(), StatusCode::OK);

    let deactivated = call!(app, TestRequest::delete().uri("/api/events/alarm").insert_header(basic("b", "pb")));
    assert_eq!(deactivated.status(), StatusCode::OK);

    let missing = call!(app, TestRequest::delete().uri("/api/events/other").insert_header(basic("b", "pb")));
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
