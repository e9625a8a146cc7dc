//! `POST /predict`.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use tonemeter_core::error::TonemeterError;
use tonemeter_core::model::{validate_text, Label};

use crate::app_state::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PredictIn {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PredictOut {
    pub label: Label,
    pub score: f64,
    pub model: String,
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictIn>, JsonRejection>,
) -> Result<Json<PredictOut>, ApiError> {
    let Json(payload) = payload.map_err(|e| TonemeterError::InvalidBody(e.body_text()))?;
    let text = validate_text(&payload.text)?;

    let classifier = state.classifier();
    let started = Instant::now();
    let pred = classifier.predict(text);
    state.metrics().inference_latency.observe(&[], started.elapsed());

    Ok(Json(PredictOut {
        label: pred.label,
        score: pred.score,
        model: classifier.name().to_string(),
    }))
}
