use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::time::Instant;

use prosperity_core::{EnhancedIndicatorRecord, EnhancementBatch};

use super::dto::*;
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Unwrap a JSON body, turning axum's rejection into our 400 response
fn json_body<T>(payload: Result<Json<T>, JsonRejection>, route: &str) -> AppResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        println!("[RESPONSE] POST {} -> 400 Bad Request (malformed body)", route);
        tracing::warn!(route = %route, error = %rejection.body_text(), "Malformed request body");
        AppError::InvalidParam(rejection.body_text())
    })
}

fn require<T>(field: Option<T>, name: &str) -> AppResult<T> {
    field.ok_or_else(|| AppError::InvalidParam(format!("{} is required", name)))
}

pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let start = Instant::now();
    println!("[REQUEST] GET /health");
    tracing::info!("Processing health check request");

    let active_sources = state.orchestrator.registry().get_active_sources().await.len();
    let models = state.orchestrator.predictor().get_available_models().len();

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sources,
        models,
    };

    let duration = start.elapsed().as_millis();
    println!("[RESPONSE] GET /health -> 200 OK ({}ms) sources={}", duration, active_sources);
    tracing::info!(
        duration_ms = %duration,
        active_sources = %active_sources,
        "Health check completed"
    );

    Ok(Json(response))
}

pub async fn list_sources(State(state): State<AppState>) -> AppResult<Json<SourcesResponse>> {
    let start = Instant::now();
    println!("[REQUEST] GET /api/v1/sources");
    tracing::info!("Processing list sources request");

    let registry = state.orchestrator.registry();
    let sources = registry.all_sources().await;
    let indicators = registry.mapped_indicators().await;
    let total = sources.len();

    let duration = start.elapsed().as_millis();
    println!("[RESPONSE] GET /api/v1/sources -> 200 OK ({}ms) count={}", duration, total);
    tracing::info!(duration_ms = %duration, source_count = %total, "Sources listed");

    Ok(Json(SourcesResponse {
        sources,
        indicators,
        total,
    }))
}

pub async fn register_source(
    State(state): State<AppState>,
    payload: Result<Json<RegisterSourceRequest>, JsonRejection>,
) -> AppResult<Json<RegisterSourceResponse>> {
    let start = Instant::now();
    println!("[REQUEST] POST /api/v1/sources");
    let request = json_body(payload, "/api/v1/sources")?;
    let source = request.source;
    tracing::info!(source_id = %source.id, source_type = %source.source_type, "Processing register source request");

    if source.id.trim().is_empty() || source.name.trim().is_empty() {
        println!("[RESPONSE] POST /api/v1/sources -> 400 Bad Request (missing id or name)");
        return Err(AppError::InvalidParam("id and name must not be empty".to_string()));
    }
    if !(0.0..=1.0).contains(&source.reliability) {
        println!("[RESPONSE] POST /api/v1/sources -> 400 Bad Request (reliability out of range)");
        return Err(AppError::InvalidParam(format!(
            "reliability must be within [0, 1], got {}",
            source.reliability
        )));
    }

    let registry = state.orchestrator.registry();
    registry.add_data_source(source.clone()).await;
    for indicator in &request.indicators {
        registry.attach_source(indicator, &source.id).await;
    }
    // Cached collections may now be missing this source or still include its old self
    state.cache.invalidate_all();

    let duration = start.elapsed().as_millis();
    println!(
        "[RESPONSE] POST /api/v1/sources -> 200 OK ({}ms) source={} indicators={}",
        duration,
        source.id,
        request.indicators.len()
    );
    tracing::info!(
        source_id = %source.id,
        indicator_count = %request.indicators.len(),
        duration_ms = %duration,
        "Data source registered"
    );

    Ok(Json(RegisterSourceResponse {
        message: format!("Registered data source {}", source.id),
        source,
        indicators: request.indicators,
    }))
}

pub async fn list_models(State(state): State<AppState>) -> AppResult<Json<ModelsResponse>> {
    let start = Instant::now();
    println!("[REQUEST] GET /api/v1/models");

    let models = state.orchestrator.predictor().get_available_models();
    let total = models.len();

    let duration = start.elapsed().as_millis();
    println!("[RESPONSE] GET /api/v1/models -> 200 OK ({}ms) count={}", duration, total);
    tracing::info!(duration_ms = %duration, model_count = %total, "Models listed");

    Ok(Json(ModelsResponse { models, total }))
}

pub async fn enhance(
    State(state): State<AppState>,
    payload: Result<Json<EnhancementRequest>, JsonRejection>,
) -> AppResult<Json<EnhancementResponse>> {
    let start = Instant::now();
    let request = json_body(payload, "/api/v1/data-enhancement")?;
    println!("[REQUEST] POST /api/v1/data-enhancement action={}", request.action);
    tracing::info!(action = %request.action, "Processing data enhancement request");

    let action = EnhancementAction::from_str(&request.action).ok_or_else(|| {
        println!(
            "[RESPONSE] POST /api/v1/data-enhancement -> 400 Bad Request (unknown action {})",
            request.action
        );
        AppError::UnknownAction(request.action.clone())
    })?;

    if request.user_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        println!("[RESPONSE] POST /api/v1/data-enhancement -> 400 Bad Request (blank userId)");
        return Err(AppError::InvalidParam("userId must not be blank".to_string()));
    }

    let response = match action {
        EnhancementAction::Collect => collect(&state, &request).await?,
        EnhancementAction::Harmonize => harmonize(&state, &request)?,
        EnhancementAction::Validate => validate(&state, &request)?,
        EnhancementAction::Predict => predict(&state, &request)?,
        EnhancementAction::Assess => assess(&state, &request).await?,
        EnhancementAction::FillMissing => fill_missing(&state, &request)?,
        EnhancementAction::Normalize => normalize(&state, &request)?,
    };

    if let Some(user_id) = request.user_id.as_deref() {
        save_results(&state, user_id, &response).await?;
    }

    let duration = start.elapsed().as_millis();
    println!(
        "[RESPONSE] POST /api/v1/data-enhancement -> 200 OK ({}ms) action={}",
        duration,
        action.as_str()
    );
    tracing::info!(
        action = %action.as_str(),
        has_record = response.record.is_some(),
        batch_size = response.records.as_ref().map(|r| r.len()).unwrap_or(0),
        duration_ms = %duration,
        "Data enhancement completed"
    );

    Ok(Json(response))
}

async fn collect(state: &AppState, request: &EnhancementRequest) -> AppResult<EnhancementResponse> {
    let indicator = require(request.indicator_name.as_deref(), "indicatorName")?;
    let location = request.city_location;

    // Known values make the outcome caller-specific, so only pure collections are cached.
    // Empty outcomes are not cached; every source may just be briefly down.
    let record = match request.existing_data.as_ref() {
        Some(existing) => {
            state
                .orchestrator
                .get_enhanced_indicator_data(indicator, location, Some(existing))
                .await
        }
        None => match state.cache.get_collected(indicator, location).await {
            Some(cached) => {
                tracing::debug!(indicator = %indicator, "Cache hit for collected indicator");
                Some(cached)
            }
            None => {
                let record = state
                    .orchestrator
                    .get_enhanced_indicator_data(indicator, location, None)
                    .await;
                if let Some(collected) = &record {
                    state.cache.set_collected(indicator, location, collected.clone()).await;
                }
                record
            }
        },
    };

    let message = match &record {
        Some(r) if r.is_ai_predicted => format!("No source data for {}; value predicted from proxies", indicator),
        Some(_) => format!("Collected and harmonized data for {}", indicator),
        None => format!("No data available for {}", indicator),
    };
    Ok(EnhancementResponse::single(EnhancementAction::Collect, message, record))
}

fn harmonize(state: &AppState, request: &EnhancementRequest) -> AppResult<EnhancementResponse> {
    let points = &request.data_points;
    if points.is_empty() {
        return Err(AppError::InvalidParam("dataPoints must not be empty".to_string()));
    }
    if let Some(first) = points.first() {
        if points.iter().any(|p| p.indicator != first.indicator) {
            return Err(AppError::InvalidParam(
                "dataPoints must all belong to one indicator".to_string(),
            ));
        }
    }

    let record = state.orchestrator.harmonizer().harmonize_indicator_data(points);
    let message = match &record {
        Some(r) => format!("Harmonized {} reading(s) for {}", points.len(), r.indicator),
        None => "No usable readings to harmonize".to_string(),
    };
    Ok(EnhancementResponse::single(EnhancementAction::Harmonize, message, record))
}

fn validate(state: &AppState, request: &EnhancementRequest) -> AppResult<EnhancementResponse> {
    let record = require(request.record.clone(), "record")?;
    let cleaned = state.orchestrator.harmonizer().validate_and_clean(record);

    let message = if cleaned.metadata.outlier_detected {
        format!("Validated {}; implausible value flagged", cleaned.indicator)
    } else {
        format!("Validated {}", cleaned.indicator)
    };
    Ok(EnhancementResponse::single(EnhancementAction::Validate, message, Some(cleaned)))
}

fn predict(state: &AppState, request: &EnhancementRequest) -> AppResult<EnhancementResponse> {
    let indicator = require(request.indicator_name.as_deref(), "indicatorName")?;
    let existing = require(request.existing_data.as_ref(), "existingData")?;

    let record = state
        .orchestrator
        .predictor()
        .predict_missing_value(indicator, existing)?;

    let message = match &record {
        Some(r) => format!(
            "Predicted {} from {} proxy indicator(s)",
            indicator,
            r.metadata.proxy_indicators.len()
        ),
        None => format!("Insufficient proxy data to predict {}", indicator),
    };
    Ok(EnhancementResponse::single(EnhancementAction::Predict, message, record))
}

async fn assess(state: &AppState, request: &EnhancementRequest) -> AppResult<EnhancementResponse> {
    if request.indicators.is_empty() {
        return Err(AppError::InvalidParam("indicators must not be empty".to_string()));
    }

    let records = state
        .orchestrator
        .assess_data_quality(&request.indicators, request.city_location)
        .await;
    let message = batch_message("Assessed", &records);
    Ok(EnhancementResponse::batch(EnhancementAction::Assess, message, records))
}

fn fill_missing(state: &AppState, request: &EnhancementRequest) -> AppResult<EnhancementResponse> {
    if request.indicators.is_empty() {
        return Err(AppError::InvalidParam("indicators must not be empty".to_string()));
    }
    let existing = require(request.existing_data.as_ref(), "existingData")?;

    let records = state.orchestrator.fill_missing_data(&request.indicators, existing);
    let message = batch_message("Filled", &records);
    Ok(EnhancementResponse::batch(EnhancementAction::FillMissing, message, records))
}

fn normalize(state: &AppState, request: &EnhancementRequest) -> AppResult<EnhancementResponse> {
    let indicator = require(request.indicator_name.as_deref(), "indicatorName")?;
    let value = require(request.value, "value")?;
    if !value.is_finite() {
        return Err(AppError::InvalidParam("value must be a finite number".to_string()));
    }

    let score = state.orchestrator.harmonizer().normalize_to_standard_scale(
        value,
        indicator,
        request.min_benchmark,
        request.max_benchmark,
    );
    Ok(EnhancementResponse::score(
        EnhancementAction::Normalize,
        format!("Normalized {} to the 0-100 scale", indicator),
        score,
    ))
}

fn batch_message(verb: &str, records: &EnhancementBatch) -> String {
    let produced = records.values().filter(|r| r.is_some()).count();
    format!("{} {} of {} indicator(s)", verb, produced, records.len())
}

/// Hand every produced value to the record store
async fn save_results(state: &AppState, user_id: &str, response: &EnhancementResponse) -> AppResult<()> {
    let batch = response.records.iter().flat_map(|records| records.values().flatten());
    let records: Vec<&EnhancedIndicatorRecord> = response.record.iter().chain(batch).collect();

    let mut saved = 0usize;
    for record in records {
        if let Some(value) = record.value {
            state.store.save(user_id, &record.indicator, value).await?;
            saved += 1;
        }
    }

    tracing::debug!(user_id = %user_id, saved = %saved, "Saved enhanced indicator values");
    Ok(())
}

pub async fn get_user_indicators(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserIndicatorsResponse>> {
    let start = Instant::now();
    println!("[REQUEST] GET /api/v1/user/{}/indicators", user_id);
    tracing::info!(user_id = %user_id, "Processing user indicators request");

    if user_id.trim().is_empty() {
        println!("[RESPONSE] GET /api/v1/user/{}/indicators -> 400 Bad Request (empty user id)", user_id);
        return Err(AppError::InvalidParam("user id must not be empty".to_string()));
    }

    let indicators = state.store.load_latest(&user_id).await?;

    let duration = start.elapsed().as_millis();
    println!(
        "[RESPONSE] GET /api/v1/user/{}/indicators -> 200 OK ({}ms) count={}",
        user_id,
        duration,
        indicators.len()
    );
    tracing::info!(
        user_id = %user_id,
        indicator_count = %indicators.len(),
        duration_ms = %duration,
        "User indicators retrieved"
    );

    Ok(Json(UserIndicatorsResponse {
        user_id,
        indicators,
        retrieved_at: chrono::Utc::now(),
    }))
}
