// Treatment plan document generation.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use crate::auth::AuthUser;
use crate::models::{AppState, TreatmentPlanRequest};
use crate::treatment::{self, LatexRenderer, PlanRenderer};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/treatment-plan", post(treatment_plan))
        .with_state(state)
}

async fn treatment_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<TreatmentPlanRequest>,
) -> AppResult<Response> {
    let records = state.records.as_ref().ok_or_else(|| {
        AppError::Config("no clinical records database configured".to_string())
    })?;

    let plan = treatment::build_plan(records, &request).await?;
    let rendered = LatexRenderer.render(&plan)?;
    info!(
        patient_id = %request.patient_id,
        reference = %request.reference_number,
        user = %user.user_id,
        "treatment plan generated"
    );

    Ok((
        [
            (header::CONTENT_TYPE, rendered.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", rendered.file_name),
            ),
        ],
        rendered.bytes,
    )
        .into_response())
}
