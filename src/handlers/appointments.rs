use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub limit: Option<i64>,
}

// GET /api/appointments
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let appointments = {
        let db = state.db.lock().unwrap();
        queries::list_appointments(&db, limit)?
    };

    Ok(Json(serde_json::json!({ "appointments": appointments })))
}
