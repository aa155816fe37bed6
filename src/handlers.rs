use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, ResponseError};
use futures_util::StreamExt;
use log::{error, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::errors::{error_chain, PredictError};
use crate::models::{PredictionResponse, WasteCategory};
use crate::service::ClassificationService;

const IMAGE_FIELD: &str = "image";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/scan").route(web::get().to(scan)))
        .service(web::resource("/predict").route(web::post().to(predict)));
}

pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("../static/index.html"))
}

pub async fn scan() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("../static/scan.html"))
}

pub async fn predict(
    service: web::Data<ClassificationService>,
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    let request_id = Uuid::new_v4();

    match classify_upload(service, &settings, payload).await {
        Ok(category) => {
            info!("[{}] predicted {}", request_id, category.label);
            Ok(HttpResponse::Ok().json(PredictionResponse::from(category)))
        }
        Err(e) => {
            if e.status_code().is_client_error() {
                warn!("[{}] rejected upload: {}", request_id, error_chain(&e));
            } else {
                error!("[{}] prediction failed: {}", request_id, error_chain(&e));
            }
            Err(e)
        }
    }
}

async fn classify_upload(
    service: web::Data<ClassificationService>,
    settings: &Settings,
    payload: Multipart,
) -> Result<&'static WasteCategory, PredictError> {
    let bytes = read_image_field(payload, settings.max_upload_bytes)
        .await?
        .ok_or(PredictError::MissingFile)?;

    // Decoding and inference are CPU-bound; keep them off the worker's event loop.
    let service = service.into_inner();
    let task = web::block(move || service.classify_image(&bytes));

    match actix_rt::time::timeout(settings.inference_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(blocking)) => Err(PredictError::inference(blocking.to_string())),
        Err(_) => Err(PredictError::Timeout(settings.inference_timeout)),
    }
}

/// Collects the body of the `image` file part. Other fields, and plain form
/// values that happen to be named `image`, are skipped.
async fn read_image_field(
    mut payload: Multipart,
    limit: usize,
) -> Result<Option<Vec<u8>>, PredictError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| PredictError::Upload(e.to_string()))?;
        let disposition = field.content_disposition();
        if disposition.get_name() != Some(IMAGE_FIELD) || disposition.get_filename().is_none() {
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| PredictError::Upload(e.to_string()))?;
            if bytes.len() + data.len() > limit {
                return Err(PredictError::Upload(format!("файл больше {} байт", limit)));
            }
            bytes.extend_from_slice(&data);
        }
        return Ok(Some(bytes));
    }
    Ok(None)
}
