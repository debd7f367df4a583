//! JSON HTTP surface. Thin glue over the join protocol, invite manager and
//! reconciler; every route requires a bearer identity.

pub mod auth;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::with_store_timeout;
use crate::state::AppState;
use crate::{household, invite, join, reconcile, AppError};

use auth::Identity;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/household/create", post(create))
        .route("/api/household/generate-code", post(generate_code))
        .route("/api/household/accept-code", post(accept_code))
        .route("/api/household/get", post(get))
        .route("/api/household/members", post(members))
        .route("/api/household/invites", post(invites))
        .with_state(state)
}

fn status_for(err: &AppError) -> StatusCode {
    if err.is_family("VALIDATION") {
        StatusCode::BAD_REQUEST
    } else if err.is_family("AUTH") {
        StatusCode::UNAUTHORIZED
    } else if err.is_family("FORBIDDEN") {
        StatusCode::FORBIDDEN
    } else if err.is_family("NOT_FOUND") {
        StatusCode::NOT_FOUND
    } else if err.is_family("CONFLICT") {
        StatusCode::CONFLICT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn ok(payload: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(payload))
}

fn fail(err: AppError) -> (StatusCode, Json<Value>) {
    let status = status_for(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(target = "larder", event = "request_failed", error = %err);
    } else {
        tracing::warn!(target = "larder", event = "request_rejected", code = %err.code());
    }
    (
        status,
        Json(json!({ "success": false, "error": err.message() })),
    )
}

/// Reject callers that are not members of the household they are acting on.
async fn ensure_member(
    state: &AppState,
    household_id: &str,
    uid: &str,
) -> Result<(), (StatusCode, Json<Value>)> {
    match household::is_member(&state.pool, household_id, uid).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(fail(AppError::new(
            "FORBIDDEN/NOT_MEMBER",
            "Not a member of this household",
        ))),
        Err(err) => Err(fail(err)),
    }
}

#[derive(Deserialize)]
struct CreateBody {
    name: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<CreateBody>,
) -> (StatusCode, Json<Value>) {
    let name = body.name.unwrap_or_default();
    match join::create_household(&state.pool, &name, &identity.uid).await {
        Ok(household) => ok(json!({ "success": true, "id": household.id })),
        Err(err) => fail(err),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HouseholdBody {
    household_id: Option<String>,
}

impl HouseholdBody {
    fn household_id(&self) -> Result<&str, (StatusCode, Json<Value>)> {
        crate::repo::require_field("householdId", self.household_id.as_deref().unwrap_or(""))
            .map_err(fail)
    }
}

async fn generate_code(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<HouseholdBody>,
) -> (StatusCode, Json<Value>) {
    let household_id = match body.household_id() {
        Ok(id) => id.to_string(),
        Err(resp) => return resp,
    };
    if let Err(resp) = ensure_member(&state, &household_id, &identity.uid).await {
        return resp;
    }
    match with_store_timeout(
        "generate_code",
        invite::get_or_create_code(&state.pool, &household_id),
    )
    .await
    {
        Ok(code) => ok(json!({ "success": true, "code": code })),
        Err(err) => fail(err),
    }
}

#[derive(Deserialize)]
struct AcceptBody {
    code: Option<String>,
}

async fn accept_code(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<AcceptBody>,
) -> (StatusCode, Json<Value>) {
    let code = body.code.unwrap_or_default();
    match join::accept_code(&state.pool, &code, &identity.uid).await {
        Ok(household_id) => ok(json!({ "success": true, "householdId": household_id })),
        // Join conflicts are a negotiated outcome, not a transport failure.
        Err(err) if err.is_family("CONFLICT") => {
            ok(json!({ "success": false, "error": err.message() }))
        }
        Err(err) => fail(err),
    }
}

async fn get(
    State(state): State<AppState>,
    _identity: Identity,
    Json(body): Json<HouseholdBody>,
) -> (StatusCode, Json<Value>) {
    let household_id = match body.household_id() {
        Ok(id) => id.to_string(),
        Err(resp) => return resp,
    };
    match with_store_timeout(
        "get_household",
        household::get_household(&state.pool, &household_id),
    )
    .await
    {
        Ok(Some(found)) => ok(json!({ "success": true, "household": found })),
        Ok(None) => fail(
            AppError::new("NOT_FOUND/HOUSEHOLD", "Household not found")
                .with_context("household_id", household_id),
        ),
        Err(err) => fail(err),
    }
}

async fn members(
    State(state): State<AppState>,
    _identity: Identity,
    Json(body): Json<HouseholdBody>,
) -> (StatusCode, Json<Value>) {
    let household_id = match body.household_id() {
        Ok(id) => id.to_string(),
        Err(resp) => return resp,
    };
    match with_store_timeout(
        "get_members",
        reconcile::get_household_members(&state.pool, &household_id),
    )
    .await
    {
        Ok(entries) => ok(json!({ "success": true, "members": entries })),
        Err(err) => fail(err),
    }
}

async fn invites(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<HouseholdBody>,
) -> (StatusCode, Json<Value>) {
    let household_id = match body.household_id() {
        Ok(id) => id.to_string(),
        Err(resp) => return resp,
    };
    if let Err(resp) = ensure_member(&state, &household_id, &identity.uid).await {
        return resp;
    }
    match with_store_timeout(
        "get_invites",
        invite::list_grants(&state.pool, &household_id),
    )
    .await
    {
        Ok(grants) => ok(json!({ "success": true, "invites": grants })),
        Err(err) => fail(err),
    }
}
