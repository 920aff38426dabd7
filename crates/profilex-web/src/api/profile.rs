use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use profilex_core::{ExtractedRecord, FailureKind, PipelineError, PipelineStage};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(extract_profile))
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    /// Bare username or full profile URL
    username: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub url: String,
    pub screenshot: Option<String>,
    pub json_path: String,
    pub data: ExtractedRecord,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub kind: FailureKind,
    pub stage: PipelineStage,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractedRecord>,
}

pub struct ApiError(PipelineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::warn!(
            status = status.as_u16(),
            stage = %self.0.stage,
            error = %self.0.source,
            "Profile request failed"
        );

        let body = ErrorResponse {
            success: false,
            kind,
            stage: self.0.stage,
            error: kind.public_message().to_string(),
            data: self.0.record,
        };

        (status, Json(body)).into_response()
    }
}

async fn extract_profile(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let result = state.pipeline.run(&query.username).await.map_err(ApiError)?;

    Ok(Json(ProfileResponse {
        success: true,
        url: result.url,
        screenshot: result
            .screenshot
            .map(|path| path.to_string_lossy().into_owned()),
        json_path: result.sink_location,
        data: result.record,
    }))
}
