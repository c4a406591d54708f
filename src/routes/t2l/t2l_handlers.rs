use std::collections::HashMap;

use actix_multipart::form::MultipartForm;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};

use super::t2l_models::T2lForm;
use crate::extract::att_lista::{AttListaBuilder, Brand};
use crate::routes::customs::customs_models::ExtractErrorResponse;
use crate::routes::{login_required, session_user};
use crate::sessions::SessionStore;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn lines_of(text: Option<&str>) -> Vec<String> {
    text.unwrap_or_default()
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Toyota manual HS overrides arrive as `VIN:HS` lines.
fn manual_hs_map(text: Option<&str>) -> HashMap<String, String> {
    lines_of(text)
        .iter()
        .filter_map(|line| {
            line.split_once(':')
                .map(|(vin, hs)| (vin.trim().to_string(), hs.trim().to_string()))
        })
        .collect()
}

async fn generate(
    brand: Brand,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    form: MultipartForm<T2lForm>,
) -> HttpResponse {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    let form = form.into_inner();
    let swb_no = form.swb.0.clone();
    if swb_no.trim().is_empty() {
        return HttpResponse::BadRequest().json(ExtractErrorResponse {
            error: "Missing required fields".into(),
        });
    }

    let csv_text = String::from_utf8_lossy(&form.csv.data).to_string();
    let vin_list = lines_of(form.chassis.as_ref().map(|t| t.0.as_str()));
    let diz_list = lines_of(form.diz.as_ref().map(|t| t.0.as_str()));
    let manual_hs = manual_hs_map(form.manual_hs.as_ref().map(|t| t.0.as_str()));
    let vin_count = vin_list.len();
    info!("Generating {:?} attached list for {} chassis", brand, vin_count);

    let result = web::block(move || {
        let builder = AttListaBuilder::new();
        let pack =
            builder.load_and_process(brand, &csv_text, &vin_list, &diz_list, &swb_no, &manual_hs)?;
        builder.export_to_excel(&pack)
    })
    .await;

    match result {
        Ok(Ok(bytes)) => {
            let filename = match brand {
                Brand::Volkswagen => format!("ATT.LISTA {}X .xlsx", vin_count),
                Brand::Toyota => format!("ATT.LISTA {}X (TOYOTA).xlsx", vin_count),
            };
            HttpResponse::Ok()
                .content_type(XLSX_MIME)
                .insert_header((
                    "Content-Disposition",
                    format!("attachment; filename=\"{}\"", filename),
                ))
                .body(bytes)
        }
        Ok(Err(e)) => {
            error!("Attached list generation failed: {}", e);
            HttpResponse::BadRequest().json(ExtractErrorResponse {
                error: e.to_string(),
            })
        }
        Err(e) => {
            error!("Attached list worker failed: {}", e);
            HttpResponse::InternalServerError().json(ExtractErrorResponse {
                error: "Attached list generation failed".into(),
            })
        }
    }
}

pub async fn generate_vw_t2l(
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    form: MultipartForm<T2lForm>,
) -> impl Responder {
    generate(Brand::Volkswagen, sessions, req, form).await
}

pub async fn generate_toyota_t2l(
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    form: MultipartForm<T2lForm>,
) -> impl Responder {
    generate(Brand::Toyota, sessions, req, form).await
}
