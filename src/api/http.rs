use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, warn};

use super::ApiState;
use crate::models::{ScrapeRequest, SubmitPayload, TaskId, TaskStatus};

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "error": message})),
    )
        .into_response()
}

/// 健康检查
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "active_tasks": state.registry.active_tasks(),
    }))
}

/// 提交抓取任务
///
/// 载荷不合法时直接拒绝，不分配任务 ID
pub async fn submit_scrape(
    State(state): State<ApiState>,
    payload: Result<Json<SubmitPayload>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!("拒绝无法解析的提交: {}", rejection);
            return bad_request(rejection.body_text());
        }
    };

    let request = match ScrapeRequest::from_payload(payload, &state.defaults) {
        Ok(request) => request,
        Err(e) => {
            warn!("拒绝不合法的提交: {}", e);
            return bad_request(e.to_string());
        }
    };

    let task_id = state.registry.submit(request);
    Json(json!({ "task_id": task_id })).into_response()
}

/// 查询任务状态
pub async fn scrape_status(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> Response {
    debug!("查询任务状态: {}", task_id);

    let status = match task_id.parse::<TaskId>() {
        Ok(id) => state.registry.status_of(&id),
        Err(_) => TaskStatus::NotFound,
    };

    let code = match status {
        TaskStatus::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    (code, Json(status)).into_response()
}
