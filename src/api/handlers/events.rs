// src/api/handlers/events.rs
use actix_web::{
    web::{self, Bytes, Data, Path},
    HttpResponse, Scope,
};
use serde_json::json;

use super::objects::body_of;
use crate::{
    api::{auth::Credentials, types::StatusMessage},
    network::CommunicationManager,
    utils::error::Result,
};

/// Channels owned by the authenticated object.
pub fn scope() -> Scope {
    web::scope("/events").service(
        web::resource("/{eid}")
            .route(web::post().to(activate))
            .route(web::put().to(publish))
            .route(web::delete().to(deactivate)),
    )
}

async fn activate(
    manager: Data<CommunicationManager>,
    credentials: Credentials,
    eid: Path<String>,
) -> Result<HttpResponse> {
    manager
        .establish_connection(&credentials.object_id, &credentials.password)
        .await?;
    manager
        .activate_event_channel(&credentials.object_id, &eid)
        .await?;

    Ok(StatusMessage::ok("Event channel activated", json!(eid.into_inner())).into_response())
}

async fn publish(
    manager: Data<CommunicationManager>,
    credentials: Credentials,
    eid: Path<String>,
    body: Bytes,
) -> Result<HttpResponse> {
    manager
        .establish_connection(&credentials.object_id, &credentials.password)
        .await?;
    let sent = manager
        .send_event_to_subscribed_objects(&credentials.object_id, &eid, body_of(&body)?)
        .await?;

    Ok(StatusMessage::ok("Event sent", json!({ "eventId": eid.into_inner(), "subscribers": sent })).into_response())
}

async fn deactivate(
    manager: Data<CommunicationManager>,
    credentials: Credentials,
    eid: Path<String>,
) -> Result<HttpResponse> {
    manager
        .establish_connection(&credentials.object_id, &credentials.password)
        .await?;
    manager
        .deactivate_event_channel(&credentials.object_id, &eid)
        .await?;

    Ok(StatusMessage::ok("Event channel deactivated", json!(eid.into_inner())).into_response())
}
