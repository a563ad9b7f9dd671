use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{error, web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use phytoscan_shared::{AdviceMode, AnalysisOutcome, AnalysisSubmission, PlantNameSource};
use serde_json::json;
use uuid::Uuid;

use crate::analysis::pipeline::Pipeline;
use crate::intake::{FormValue, RawSubmission, ValidationError, INVALID_FORM_MESSAGE};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared, read-only state for every request.
pub struct AppState {
    pub pipeline: Pipeline,
    pub model_name: String,
    pub plant_name_source: PlantNameSource,
    pub advice_mode: AdviceMode,
    /// Upper bound on a request body; a base64 image is ~4/3 of its raw size.
    pub body_limit: usize,
}

impl AppState {
    pub fn body_limit_for(max_image_bytes: usize) -> usize {
        (max_image_bytes / 3)
            .saturating_mul(4)
            .saturating_add(64 * 1024)
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, body_limit: usize, frontend_dir: Option<String>) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/analyze").route(web::post().to(handle_analyze)))
        .service(
            web::resource("/api/analyze/json")
                .app_data(
                    web::JsonConfig::default()
                        .limit(body_limit)
                        .error_handler(|err, _req| {
                            warn!("Rejected JSON submission: {}", err);
                            let response = HttpResponse::BadRequest()
                                .json(AnalysisOutcome::failed(INVALID_FORM_MESSAGE));
                            error::InternalError::from_response(err, response).into()
                        }),
                )
                .route(web::post().to(handle_analyze_json)),
        );

    if let Some(dir) = frontend_dir {
        cfg.service(Files::new("/", dir).index_file("index.html"));
    }
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "model": state.model_name,
        "plantNameSource": state.plant_name_source,
        "adviceMode": state.advice_mode,
    }))
}

async fn handle_analyze(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let request_id = Uuid::new_v4();

    match read_multipart(payload, state.body_limit).await {
        Ok(raw) => {
            info!("[{}] Multipart analysis request", request_id);
            let outcome = state.pipeline.run(&raw).await;
            respond(request_id, StatusCode::OK, outcome)
        }
        Err(e) => {
            warn!("[{}] Unreadable multipart submission: {}", request_id, e);
            respond(
                request_id,
                StatusCode::BAD_REQUEST,
                AnalysisOutcome::failed(e.user_message()),
            )
        }
    }
}

async fn handle_analyze_json(
    state: web::Data<AppState>,
    submission: web::Json<AnalysisSubmission>,
) -> HttpResponse {
    let request_id = Uuid::new_v4();
    info!("[{}] JSON analysis request", request_id);

    let raw = RawSubmission::from(submission.into_inner());
    let outcome = state.pipeline.run(&raw).await;
    respond(request_id, StatusCode::OK, outcome)
}

fn respond(request_id: Uuid, status: StatusCode, outcome: AnalysisOutcome) -> HttpResponse {
    info!(
        "[{}] Analysis {}",
        request_id,
        if outcome.success { "succeeded" } else { "failed" }
    );
    HttpResponse::build(status)
        .insert_header((REQUEST_ID_HEADER, request_id.to_string()))
        .json(outcome)
}

/// Collects every multipart field. Parts with a filename or an image content
/// type are kept as files, the rest must be UTF-8 text.
async fn read_multipart(mut payload: Multipart, limit: usize) -> Result<RawSubmission, ValidationError> {
    let mut raw = RawSubmission::new();
    let mut total = 0usize;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ValidationError::UnreadableForm(e.to_string()))?
    {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let content_type = field.content_type().map(|mime| mime.essence_str().to_string());
        let is_file = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .is_some()
            || content_type
                .as_deref()
                .is_some_and(|mime| mime.starts_with("image/"));

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| ValidationError::UnreadableForm(e.to_string()))?;
            total += data.len();
            if total > limit {
                return Err(ValidationError::UnreadableForm(format!(
                    "form body exceeds {limit} bytes"
                )));
            }
            bytes.extend_from_slice(&data);
        }

        let value = if is_file {
            FormValue::File {
                content_type,
                bytes,
            }
        } else {
            let text = String::from_utf8(bytes).map_err(|_| {
                ValidationError::UnreadableForm(format!("field `{name}` is not UTF-8 text"))
            })?;
            FormValue::Text(text)
        };
        raw.insert(&name, value);
    }

    Ok(raw)
}
