use axum::{
    routing::get,
    Router,
    extract::{Json, Query, State},
};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tower_http::cors::{CorsLayer, Any};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::api::models::{
    EmergencyContact, FeatureCollection, HospitalRow, NearestHospital, NearestHospitalParams,
    NearestHospitalQuery, NewsResponse, Tip, TipCategory,
};
use crate::news;
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    let static_files = ServeDir::new(&app_state.config.static_dir);

    Router::new()
        .route("/api/hospitals", get(hospitals_handler))
        .route("/api/nearest-hospital", get(nearest_hospital_handler))
        .route("/api/fire-tips", get(fire_tips_handler))
        .route("/api/accident-tips", get(accident_tips_handler))
        .route("/api/flood-tips", get(flood_tips_handler))
        .route("/api/collapse-tips", get(collapse_tips_handler))
        .route("/api/emergency-contacts", get(emergency_contacts_handler))
        .route("/api/disaster-news", get(disaster_news_handler))
        .fallback_service(static_files)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn hospitals_handler(State(state): State<AppState>) -> Result<Json<FeatureCollection>> {
    let rows: Vec<HospitalRow> = bounded(&state, "hospitals", state.datastore.select("hospitals", "id,name,geom"))
        .await
        .map_err(|e| {
            error!(error = %e, "database query error");
            e.with_message("Error fetching hospitals data")
        })?;

    let total = rows.len();
    let features: Vec<_> = rows.into_iter().filter_map(HospitalRow::into_feature).collect();
    if features.len() < total {
        warn!(skipped = total - features.len(), "hospitals without a usable location");
    }

    Ok(Json(FeatureCollection::new(features)))
}

async fn nearest_hospital_handler(
    State(state): State<AppState>,
    Query(query): Query<NearestHospitalQuery>,
) -> Result<Json<NearestHospital>> {
    let params = validate_start(&query)?;

    let found: Vec<NearestHospital> = bounded(&state, "nearest hospital", state.datastore.rpc("nearest_hospital", &params))
        .await
        .map_err(|e| {
            error!(error = %e, "error finding nearest hospital");
            e.with_message("Error finding nearest hospital")
        })?;

    let hospital = found
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("No hospitals found".to_string()))?;

    info!(id = %hospital.id, name = %hospital.name, "nearest hospital");
    Ok(Json(hospital))
}

/// Both coordinates must be present, finite and within WGS84 bounds.
pub fn validate_start(query: &NearestHospitalQuery) -> Result<NearestHospitalParams> {
    let invalid = || AppError::Validation("Invalid start coordinates".to_string());

    let parse = |raw: &Option<String>| -> Result<f64> {
        raw.as_deref()
            .map(str::trim)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or_else(invalid)
    };

    let start_lat = parse(&query.start_lat)?;
    let start_lng = parse(&query.start_lng)?;

    if !(-90.0..=90.0).contains(&start_lat) || !(-180.0..=180.0).contains(&start_lng) {
        return Err(invalid());
    }

    Ok(NearestHospitalParams { start_lat, start_lng })
}

async fn fire_tips_handler(State(state): State<AppState>) -> Result<Json<Vec<Tip>>> {
    tips(&state, TipCategory::Fire).await
}

async fn accident_tips_handler(State(state): State<AppState>) -> Result<Json<Vec<Tip>>> {
    tips(&state, TipCategory::Accident).await
}

async fn flood_tips_handler(State(state): State<AppState>) -> Result<Json<Vec<Tip>>> {
    tips(&state, TipCategory::Flood).await
}

async fn collapse_tips_handler(State(state): State<AppState>) -> Result<Json<Vec<Tip>>> {
    tips(&state, TipCategory::Collapse).await
}

async fn tips(state: &AppState, category: TipCategory) -> Result<Json<Vec<Tip>>> {
    let tips = bounded(state, category.table(), state.datastore.select(category.table(), "tip"))
        .await
        .map_err(|e| {
            error!(category = category.label(), error = %e, "error fetching tips");
            e.with_message("Internal Server Error")
        })?;

    Ok(Json(tips))
}

async fn emergency_contacts_handler(State(state): State<AppState>) -> Result<Json<Vec<EmergencyContact>>> {
    let contacts = bounded(
        &state,
        "emergency contacts",
        state.datastore.select("emergency_contacts", "emergency_type,contact_number,description"),
    )
    .await
    .map_err(|e| {
        error!(error = %e, "error fetching emergency contacts");
        e.with_message("Error fetching emergency contacts")
    })?;

    Ok(Json(contacts))
}

async fn disaster_news_handler(State(state): State<AppState>) -> Result<Json<NewsResponse>> {
    let rotation = bounded(
        &state,
        "disaster news",
        news::rotate_and_classify(&state.news, &state.datastore, Utc::now()),
    )
    .await
    .map_err(|e| {
        error!(error = %e, "error rotating disaster news");
        if matches!(e, AppError::StorageRead(_)) {
            e.with_message("Could not read the file.")
        } else if matches!(e, AppError::Parse(_)) {
            e.with_message("Could not parse the JSON data.")
        } else {
            e
        }
    })?;

    Ok(Json(NewsResponse {
        breaking_news: rotation.breaking,
        all_news: rotation.keep,
    }))
}

/// Applies the overall request timeout to a handler's work.
async fn bounded<T, F>(state: &AppState, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let limit: Duration = state.config.request_timeout;
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(what, ?limit, "request timed out");
            Err(AppError::Timeout(format!("{} request timed out", what)))
        }
    }
}
