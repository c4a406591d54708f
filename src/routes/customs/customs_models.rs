use actix_multipart::form::{bytes::Bytes, MultipartForm};
use serde::Serialize;

use crate::extract::hs::HsRecord;

/// Single-file upload shared by the A.TR and HS extractors.
#[derive(MultipartForm)]
pub struct DocumentUpload {
    #[multipart(limit = "50MB")]
    pub file: Bytes,
}

#[derive(Serialize)]
pub struct AtrExtractResponse {
    pub filename: String,
    pub atr: String,
    pub invoice: String,
}

#[derive(Serialize)]
pub struct HsExtractResponse {
    pub results: Vec<HsRecord>,
}

#[derive(Serialize)]
pub struct ExtractErrorResponse {
    pub error: String,
}
