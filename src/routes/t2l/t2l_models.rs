use actix_multipart::form::{bytes::Bytes, text::Text, MultipartForm};

/// Attached-list generation form: stock CSV plus the operator's pasted
/// lists. `manual_hs` carries Toyota `VIN:HS` overrides, one per line.
#[derive(MultipartForm)]
pub struct T2lForm {
    #[multipart(limit = "50MB")]
    pub csv: Bytes,
    pub swb: Text<String>,
    pub chassis: Option<Text<String>>,
    pub diz: Option<Text<String>>,
    pub manual_hs: Option<Text<String>>,
}
