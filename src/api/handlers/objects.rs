// src/api/handlers/objects.rs
use actix_web::{
    web::{self, Bytes, Data, Path, Query},
    HttpResponse, Scope,
};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

use crate::{
    api::{
        auth::Credentials,
        types::{forward_response, StatusMessage},
    },
    network::{
        message::{ATTR_AID, ATTR_PID},
        CommunicationManager, RequestOperation,
    },
    utils::error::{GatewayError, Result},
};

pub fn scope() -> Scope {
    web::scope("/objects")
        .service(web::resource("").route(web::get().to(roster)))
        .service(web::resource("/login").route(web::get().to(login)))
        .service(web::resource("/logout").route(web::get().to(logout)))
        .service(
            web::resource("/{oid}/properties/{pid}")
                .route(web::get().to(get_property))
                .route(web::put().to(set_property)),
        )
        .service(web::resource("/{oid}/actions/{aid}").route(web::post().to(start_action)))
        .service(
            web::resource("/{oid}/events/{eid}")
                .route(web::get().to(event_channel_status))
                .route(web::post().to(subscribe))
                .route(web::delete().to(unsubscribe)),
        )
}

pub(crate) fn body_of(bytes: &Bytes) -> Result<Option<String>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    String::from_utf8(bytes.to_vec())
        .map(Some)
        .map_err(|_| GatewayError::BadRequest("Body is not valid UTF-8".to_string()))
}

async fn login(manager: Data<CommunicationManager>, credentials: Credentials) -> Result<HttpResponse> {
    manager
        .establish_connection(&credentials.object_id, &credentials.password)
        .await?;

    Ok(StatusMessage::ok("Login successful", json!(credentials.object_id)).into_response())
}

async fn logout(manager: Data<CommunicationManager>, credentials: Credentials) -> Result<HttpResponse> {
    let descriptor = manager
        .descriptor(&credentials.object_id)
        .ok_or_else(|| GatewayError::NotConnected(credentials.object_id.clone()))?;

    if !descriptor.verify_password(&credentials.password) {
        return Err(GatewayError::Unauthorized(credentials.object_id));
    }

    manager.terminate_connection(&credentials.object_id).await;
    info!("Object '{}' logged out", credentials.object_id);

    Ok(StatusMessage::ok("Logout successful", json!(credentials.object_id)).into_response())
}

async fn roster(manager: Data<CommunicationManager>, credentials: Credentials) -> Result<HttpResponse> {
    manager
        .establish_connection(&credentials.object_id, &credentials.password)
        .await?;

    let mut objects: Vec<String> = manager.roster(&credentials.object_id).await?.into_iter().collect();
    objects.sort();

    Ok(StatusMessage::ok("Roster", json!(objects)).into_response())
}

async fn get_property(
    manager: Data<CommunicationManager>,
    credentials: Credentials,
    path: Path<(String, String)>,
    query: Query<HashMap<String, String>>,
) -> Result<HttpResponse> {
    let (oid, pid) = path.into_inner();
    forward(
        &manager,
        &credentials,
        &oid,
        RequestOperation::GetPropertyValue,
        (ATTR_PID, pid),
        query.into_inner(),
        None,
    )
    .await
}

async fn set_property(
    manager: Data<CommunicationManager>,
    credentials: Credentials,
    path: Path<(String, String)>,
    query: Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<HttpResponse> {
    let (oid, pid) = path.into_inner();
    forward(
        &manager,
        &credentials,
        &oid,
        RequestOperation::SetPropertyValue,
        (ATTR_PID, pid),
        query.into_inner(),
        body_of(&body)?,
    )
    .await
}

async fn start_action(
    manager: Data<CommunicationManager>,
    credentials: Credentials,
    path: Path<(String, String)>,
    query: Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<HttpResponse> {
    let (oid, aid) = path.into_inner();
    forward(
        &manager,
        &credentials,
        &oid,
        RequestOperation::StartAction,
        (ATTR_AID, aid),
        query.into_inner(),
        body_of(&body)?,
    )
    .await
}

async fn event_channel_status(
    manager: Data<CommunicationManager>,
    credentials: Credentials,
    path: Path<(String, String)>,
) -> Result<HttpResponse> {
    let (oid, eid) = path.into_inner();
    manager
        .establish_connection(&credentials.object_id, &credentials.password)
        .await?;

    let response = manager
        .event_channel_status(&credentials.object_id, &oid, &eid)
        .await?;
    Ok(forward_response(&response))
}

async fn subscribe(
    manager: Data<CommunicationManager>,
    credentials: Credentials,
    path: Path<(String, String)>,
) -> Result<HttpResponse> {
    let (oid, eid) = path.into_inner();
    manager
        .establish_connection(&credentials.object_id, &credentials.password)
        .await?;

    let response = manager
        .subscribe_to_event_channel(&credentials.object_id, &oid, &eid)
        .await?;
    Ok(forward_response(&response))
}

async fn unsubscribe(
    manager: Data<CommunicationManager>,
    credentials: Credentials,
    path: Path<(String, String)>,
) -> Result<HttpResponse> {
    let (oid, eid) = path.into_inner();
    manager
        .establish_connection(&credentials.object_id, &credentials.password)
        .await?;

    let response = manager
        .unsubscribe_from_event_channel(&credentials.object_id, &oid, &eid)
        .await?;
    Ok(forward_response(&response))
}

async fn forward(
    manager: &CommunicationManager,
    credentials: &Credentials,
    destination: &str,
    operation: RequestOperation,
    (key, value): (&str, String),
    parameters: HashMap<String, String>,
    body: Option<String>,
) -> Result<HttpResponse> {
    manager
        .establish_connection(&credentials.object_id, &credentials.password)
        .await?;

    let response = manager
        .send_request(
            &credentials.object_id,
            destination,
            operation,
            HashMap::from([(key.to_string(), value)]),
            parameters,
            body,
        )
        .await?;

    Ok(forward_response(&response))
}
