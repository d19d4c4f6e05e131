//! I define the liveness endpoint.
//!

use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

/// `GET /health/`.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}
