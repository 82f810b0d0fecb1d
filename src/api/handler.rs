use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::models::*;
use crate::{
    error::{AppError, AppResult},
    marketplace::ListingQuery,
    reconcile::{FetchCoordinator, ListingRecord, Trigger},
};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<FetchCoordinator>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.coordinator.snapshot();
    let ledger_configured = state.coordinator.pipeline().ledger().is_some();

    let status = if !ledger_configured {
        "unconfigured"
    } else if snapshot.error.is_some() {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        ledger_configured,
        published_seq: snapshot.published_seq,
        last_error: snapshot.error,
    })
}

/// GET /marketplace/listings
pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> AppResult<Json<ListingsResponse>> {
    query.validate()?;

    let snapshot = state.coordinator.snapshot();
    let now = Utc::now().timestamp().max(0) as u64;
    let listings = query.apply(&snapshot.listings, now);
    debug!("Serving {} of {} listings", listings.len(), snapshot.listings.len());

    Ok(Json(ListingsResponse {
        listings,
        total: snapshot.listings.len(),
        is_loading: snapshot.is_loading,
        error: snapshot.error,
        published_seq: snapshot.published_seq,
        published_at: snapshot.published_at,
    }))
}

/// GET /marketplace/listings/:id
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> AppResult<Json<ListingRecord>> {
    state
        .coordinator
        .snapshot()
        .listings
        .iter()
        .find(|listing| listing.id() == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("listing {}", id)))
}

/// POST /marketplace/refresh - run a cycle and report its outcome
pub async fn refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    info!("🔄 Manual refresh requested");
    let outcome = state.coordinator.refresh(Trigger::Manual).await;
    Json(RefreshResponse {
        trigger: Trigger::Manual,
        outcome,
    })
}

/// POST /marketplace/invoice-created - creation notification, cycle runs in background
pub async fn invoice_created(State(state): State<AppState>) -> (StatusCode, Json<AcceptedResponse>) {
    info!("🆕 Invoice creation notified");
    state.coordinator.notify_invoice_created();
    (
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted".to_string(),
            trigger: Trigger::InvoiceCreated,
        }),
    )
}
