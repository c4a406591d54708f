use actix_multipart::form::{bytes::Bytes, text::Text, MultipartForm};
use serde::{Deserialize, Serialize};

use crate::extract::dvh::DizGroupFile;

#[derive(MultipartForm)]
pub struct DamageReportForm {
    #[multipart(limit = "50MB")]
    pub manifest: Bytes,
    pub pdf_text: Text<String>,
    pub vin_order_text: Option<Text<String>>,
    pub manual_damages_text: Option<Text<String>>,
}

#[derive(MultipartForm)]
pub struct DvhProcessForm {
    #[multipart(limit = "50MB")]
    pub master: Bytes,
    #[multipart(limit = "50MB")]
    pub ua: Option<Bytes>,
    pub vessel: Option<Text<String>>,
    pub eta: Option<Text<String>>,
}

#[derive(MultipartForm)]
pub struct TrainForm {
    #[multipart(limit = "50MB")]
    pub odstrel: Bytes,
    #[multipart(limit = "50MB")]
    pub plan: Bytes,
    #[multipart(rename = "isT1")]
    pub is_t1: Option<Text<String>>,
}

#[derive(Deserialize)]
pub struct DizRequest {
    #[serde(default)]
    pub content: String,
}

/// One generated workbook, delivered inline as a base64 data URI.
#[derive(Serialize)]
pub struct DownloadableFile {
    pub name: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct DvhProcessResponse {
    pub results: Vec<DownloadableFile>,
}

#[derive(Serialize)]
pub struct DizResponse {
    pub files: Vec<DizGroupFile>,
}
