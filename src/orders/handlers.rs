use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::OrderResponse,
    services::{RejectReason, SubmitOutcome},
};
use crate::{auth::extractors::AuthUser, state::AppState};

pub fn order_routes() -> Router<AppState> {
    Router::new().route("/api/user/orders", post(submit_order).get(list_orders))
}

/// POST /api/user/orders, body is the bare order number as text.
#[instrument(skip(state, body))]
pub async fn submit_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: String,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.orders.submit(user_id, &body).await {
        Ok(SubmitOutcome::Accepted(_)) => Ok(StatusCode::ACCEPTED),
        Ok(SubmitOutcome::AlreadyAccepted(_)) => Ok(StatusCode::OK),
        Ok(SubmitOutcome::OwnedByOther) => Err((
            StatusCode::CONFLICT,
            "Order number already uploaded by another user".into(),
        )),
        Ok(SubmitOutcome::Rejected(RejectReason::Empty)) => Err((
            StatusCode::BAD_REQUEST,
            "Order number is required".into(),
        )),
        Ok(SubmitOutcome::Rejected(RejectReason::NotDigits | RejectReason::Checksum)) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid order number".into(),
        )),
        Err(_) => Err(internal()),
    }
}

/// GET /api/user/orders, 204 when the user has none.
#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, (StatusCode, String)> {
    let orders = state
        .orders
        .list_for_user(user_id)
        .await
        .map_err(|_| internal())?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let items: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(items).into_response())
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".into(),
    )
}
