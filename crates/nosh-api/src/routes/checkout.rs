//! Checkout snapshot endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::AppState;
use crate::error::ApiError;
use nosh_core::order::{CartLine, PendingOrder};

pub fn router() -> Router<AppState> {
    Router::new().route("/snapshots", post(save_snapshot))
}

#[derive(Deserialize)]
struct SnapshotRequest {
    payment_reference: String,
    user_id: String,
    items: Vec<CartLine>,
    delivery_address: Option<String>,
    special_instructions: Option<String>,
    nosh_points_applied: Option<i64>,
    game_debt_id: Option<String>,
}

/// Record the cart at checkout-intent time. Saving again for the same
/// payment reference replaces the earlier snapshot.
async fn save_snapshot(
    State(state): State<AppState>,
    Json(req): Json<SnapshotRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::BadRequest("snapshot has no items".into()));
    }

    let snapshot = PendingOrder {
        payment_reference: req.payment_reference,
        user_id: req.user_id,
        items: req.items,
        delivery_address: req.delivery_address,
        special_instructions: req.special_instructions,
        nosh_points_applied: req.nosh_points_applied,
        game_debt_id: req.game_debt_id,
        created_at: Utc::now(),
    };
    state.snapshots.save(&snapshot).await?;
    info!(
        payment_reference = %snapshot.payment_reference,
        user_id = %snapshot.user_id,
        items = snapshot.items.len(),
        "checkout snapshot saved"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "payment_reference": snapshot.payment_reference })),
    ))
}
