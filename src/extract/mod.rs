// src/extract/mod.rs
//
// Document-conversion pipelines. Each submodule is an independent,
// request-scoped tool: bytes in, structured records or a workbook out.

pub mod atr;
pub mod att_lista;
pub mod damage;
pub mod dvh;
pub mod hs;
pub mod train;

use std::fmt;

/// Error raised by any of the extraction pipelines.
#[derive(Debug)]
pub struct ExtractError(pub String);

impl ExtractError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        ExtractError(msg.into())
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ExtractError {}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        ExtractError(format!("io error: {}", e))
    }
}

impl From<calamine::Error> for ExtractError {
    fn from(e: calamine::Error) -> Self {
        ExtractError(format!("spreadsheet error: {}", e))
    }
}

impl From<zip::result::ZipError> for ExtractError {
    fn from(e: zip::result::ZipError) -> Self {
        ExtractError(format!("zip error: {}", e))
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExtractError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ExtractError(format!("xlsx error: {}", e))
    }
}

/// A 17-character block counts as a VIN only if it mixes letters and
/// digits, which rules out dates, weights and pure serials.
pub(crate) fn is_plausible_vin(candidate: &str) -> bool {
    candidate.chars().any(|c| c.is_ascii_digit())
        && candidate.chars().any(|c| c.is_ascii_alphabetic())
}
