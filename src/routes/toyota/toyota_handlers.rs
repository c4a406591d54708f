use actix_multipart::form::MultipartForm;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Local;
use log::{error, info};

use super::toyota_models::{
    DamageReportForm, DizRequest, DizResponse, DownloadableFile, DvhProcessForm,
    DvhProcessResponse, TrainForm,
};
use crate::extract::damage::DamageProcessor;
use crate::extract::dvh::{DvhGroup, DvhProcessor};
use crate::extract::train::TrainProcessor;
use crate::routes::customs::customs_models::ExtractErrorResponse;
use crate::routes::{login_required, session_user};
use crate::sessions::SessionStore;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub async fn damage_report(
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    form: MultipartForm<DamageReportForm>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    let form = form.into_inner();
    let manifest_text = String::from_utf8_lossy(&form.manifest.data).to_string();
    let pdf_text = form.pdf_text.0;
    let vin_order: Option<Vec<String>> = form.vin_order_text.and_then(|t| {
        let list: Vec<String> = t
            .0
            .lines()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        (!list.is_empty()).then_some(list)
    });
    let manual_damages = form.manual_damages_text.map(|t| t.0).unwrap_or_default();
    info!("Damage report requested, reorder: {}", vin_order.is_some());

    let result = web::block(move || {
        let processor = DamageProcessor::new();
        let parsed = processor.process_raw_text(&pdf_text);
        let (mut rows, damage_idx) =
            processor.process_manifest_reorder(&manifest_text, &parsed, vin_order.as_deref());
        if !manual_damages.is_empty() {
            processor.inject_manual_damages(&mut rows, &manual_damages);
        }
        processor.export_excel(&rows, damage_idx)
    })
    .await;

    match result {
        Ok(Ok(bytes)) => HttpResponse::Ok()
            .content_type(XLSX_MIME)
            .insert_header((
                "Content-Disposition",
                "attachment; filename=\"Toyota_Damage_Report.xlsx\"",
            ))
            .body(bytes),
        Ok(Err(e)) => {
            error!("Damage report generation failed: {}", e);
            HttpResponse::InternalServerError().json(ExtractErrorResponse {
                error: e.to_string(),
            })
        }
        Err(e) => {
            error!("Damage report worker failed: {}", e);
            HttpResponse::InternalServerError().json(ExtractErrorResponse {
                error: "Damage report generation failed".into(),
            })
        }
    }
}

pub async fn dvh_process(
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    form: MultipartForm<DvhProcessForm>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    let form = form.into_inner();
    let vessel = form
        .vessel
        .map(|t| t.0)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let eta = form.eta.map(|t| t.0).unwrap_or_default();
    let master = form.master.data.to_vec();
    let ua = form.ua.map(|b| b.data.to_vec());
    info!("DVH split requested for vessel {}", vessel);

    let worker_vessel = vessel.clone();
    let result = web::block(move || {
        let processor = DvhProcessor::new();
        let manifest = processor.process_manifest(&master, &worker_vessel, &eta, ua.as_deref())?;

        let date = Local::now().format("%Y%m%d").to_string();
        let mut results = Vec::new();
        for (rows, group) in [
            (&manifest.pl, DvhGroup::Pl),
            (&manifest.cz, DvhGroup::Cz),
            (&manifest.ua, DvhGroup::Ua),
        ] {
            if let Some(bytes) = processor.export_excel_bytes(rows, group)? {
                results.push(DownloadableFile {
                    name: format!("{} - {} - {}.xlsx", date, worker_vessel, group.key()),
                    url: format!("data:{};base64,{}", XLSX_MIME, STANDARD.encode(&bytes)),
                });
            }
        }
        Ok::<_, crate::extract::ExtractError>(results)
    })
    .await;

    match result {
        Ok(Ok(results)) => HttpResponse::Ok().json(DvhProcessResponse { results }),
        Ok(Err(e)) => {
            error!("DVH split failed for vessel {}: {}", vessel, e);
            HttpResponse::BadRequest().json(ExtractErrorResponse {
                error: e.to_string(),
            })
        }
        Err(e) => {
            error!("DVH worker failed for vessel {}: {}", vessel, e);
            HttpResponse::InternalServerError().json(ExtractErrorResponse {
                error: "DVH processing failed".into(),
            })
        }
    }
}

pub async fn dvh_diz(
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<DizRequest>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    let files = DvhProcessor::new().process_diz_txt(&body.content);
    info!("DIZ split produced {} group files", files.len());
    HttpResponse::Ok().json(DizResponse { files })
}

pub async fn process_train(
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    form: MultipartForm<TrainForm>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    let form = form.into_inner();
    let is_t1 = form.is_t1.as_ref().map(|t| t.0 == "on").unwrap_or(false);
    let shot = form.odstrel.data.to_vec();
    let plan = form.plan.data.to_vec();
    info!("Train processing requested, T1: {}", is_t1);

    let result = web::block(move || {
        let processor = TrainProcessor::new();
        let rows = processor.process_phase_1(&shot, &plan, is_t1)?;
        Ok::<_, crate::extract::ExtractError>(processor.process_phase_2(&rows))
    })
    .await;

    match result {
        Ok(Ok(report)) => HttpResponse::Ok().json(report),
        Ok(Err(e)) => {
            error!("Train processing failed: {}", e);
            HttpResponse::BadRequest().json(ExtractErrorResponse {
                error: e.to_string(),
            })
        }
        Err(e) => {
            error!("Train worker failed: {}", e);
            HttpResponse::InternalServerError().json(ExtractErrorResponse {
                error: "Train processing failed".into(),
            })
        }
    }
}
