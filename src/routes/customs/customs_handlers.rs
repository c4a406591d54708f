use actix_multipart::form::MultipartForm;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};

use super::customs_models::{
    AtrExtractResponse, DocumentUpload, ExtractErrorResponse, HsExtractResponse,
};
use crate::extract::atr::AtrExtractor;
use crate::extract::hs::HsCodeExtractor;
use crate::routes::{login_required, session_user};
use crate::sessions::SessionStore;

fn upload_name(form: &DocumentUpload) -> Option<String> {
    form.file.file_name.clone().filter(|name| !name.is_empty())
}

pub async fn extract_atr(
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    form: MultipartForm<DocumentUpload>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    let filename = match upload_name(&form) {
        Some(filename) => filename,
        None => {
            return HttpResponse::BadRequest().json(ExtractErrorResponse {
                error: "No selected file".into(),
            })
        }
    };
    info!("A.TR extraction requested for {}", filename);

    let bytes = form.file.data.to_vec();
    let worker_filename = filename.clone();
    // OCR can take seconds per page, keep it off the async workers
    let result = web::block(move || {
        let extractor = AtrExtractor::new();
        let raw_text = extractor.extract_text(&bytes, &worker_filename);
        extractor.analyze_content(&raw_text)
    })
    .await;

    match result {
        Ok(data) => HttpResponse::Ok().json(AtrExtractResponse {
            filename,
            atr: data.atr,
            invoice: data.invoice,
        }),
        Err(e) => {
            error!("A.TR extraction failed for {}: {}", filename, e);
            HttpResponse::InternalServerError().json(ExtractErrorResponse {
                error: "A.TR extraction failed".into(),
            })
        }
    }
}

pub async fn extract_hs(
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    form: MultipartForm<DocumentUpload>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    let filename = match upload_name(&form) {
        Some(filename) => filename,
        None => {
            return HttpResponse::BadRequest().json(ExtractErrorResponse {
                error: "No selected file".into(),
            })
        }
    };
    info!("HS extraction requested for {}", filename);

    let bytes = form.file.data.to_vec();
    let worker_filename = filename.clone();
    let result =
        web::block(move || HsCodeExtractor::new().process_upload(&bytes, &worker_filename)).await;

    match result {
        Ok(Ok(results)) => {
            info!("HS extraction of {} yielded {} records", filename, results.len());
            HttpResponse::Ok().json(HsExtractResponse { results })
        }
        Ok(Err(e)) => {
            error!("HS extraction failed for {}: {}", filename, e);
            HttpResponse::InternalServerError().json(ExtractErrorResponse {
                error: e.to_string(),
            })
        }
        Err(e) => {
            error!("HS extraction worker failed for {}: {}", filename, e);
            HttpResponse::InternalServerError().json(ExtractErrorResponse {
                error: "HS extraction failed".into(),
            })
        }
    }
}
