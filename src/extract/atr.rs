use std::fs;
use std::path::PathBuf;
use std::process::Command;

use log::{info, warn};
use regex::Regex;
use serde::Serialize;

use super::ExtractError;

pub const NOT_FOUND: &str = "Ni najdeno";

const ATR_PREFIX: char = 'N';
const ATR_LEN: usize = 7;
const INV_MAX: usize = 6;

/// Minimum non-whitespace characters before embedded PDF text is trusted;
/// below this the document is treated as scanned and sent through OCR.
const MIN_TEXT_CHARS: usize = 30;

#[derive(Debug, Clone, Serialize)]
pub struct AtrResult {
    pub atr: String,
    pub invoice: String,
}

/// Extracts the A.TR certificate number and invoice number from scanned
/// Turkish customs documents.
///
/// Text comes either from the PDF's embedded layer or from the external
/// `tesseract` binary (scanned PDFs are rasterized with `pdftoppm` first).
/// The numbers are then recovered with a fixed OCR-confusion substitution
/// table and two anchored regexes, plus a hardcoded exclusion list of
/// known-bad fallback matches.
pub struct AtrExtractor {
    atr_re: Regex,
    atr_noise_re: Regex,
    inv_re: Regex,
    inv_fallback_re: Regex,
    ws_re: Regex,
}

impl AtrExtractor {
    pub fn new() -> Self {
        let inv_keywords = "INVOICE|INV|FATURA|BILL|FACTUUR|RECHNUNG|FAKTURA";
        AtrExtractor {
            atr_re: Regex::new(&format!(
                r"{}\s*([0-9SZODBIL\s]{{{},{}}})",
                ATR_PREFIX,
                ATR_LEN,
                ATR_LEN + 5
            ))
            .unwrap(),
            atr_noise_re: Regex::new(r"(?:NO|N0|NR|NUMBER)[:.]").unwrap(),
            inv_re: Regex::new(&format!(
                r"(?:{})\s*(?:NO|N0|NUMBER|NUM|NR)?[:.]?\s*([0-9SZODBIL]{{4,{}}})",
                inv_keywords, INV_MAX
            ))
            .unwrap(),
            inv_fallback_re: Regex::new(&format!(
                r"(?:^|[^0-9])([0-9SZODBIL]{{4,{}}})(?:[^0-9]|$)",
                INV_MAX
            ))
            .unwrap(),
            ws_re: Regex::new(r"\s+").unwrap(),
        }
    }

    /// Repairs the usual OCR digit confusions (S→5, Z→2, O→0, ...).
    fn repair_numbers(&self, text: &str) -> String {
        text.chars()
            .map(|c| match c {
                'S' => '5',
                'Z' => '2',
                'O' | 'D' => '0',
                'B' => '8',
                'I' | 'l' | 'L' => '1',
                other => other,
            })
            .collect()
    }

    /// Pulls uppercase text out of an uploaded PDF or image.
    ///
    /// OCR failures are downgraded to an empty string so the analysis step
    /// can still answer with "not found" instead of a hard error.
    pub fn extract_text(&self, bytes: &[u8], filename: &str) -> String {
        let text = if filename.to_lowercase().ends_with(".pdf") {
            if looks_like_scanned(bytes) {
                info!("A.TR PDF looks scanned, running OCR");
                self.ocr_pdf(bytes).unwrap_or_default()
            } else {
                match pdf_extract::extract_text_from_mem(bytes) {
                    Ok(text)
                        if text.chars().filter(|c| !c.is_whitespace()).count()
                            >= MIN_TEXT_CHARS =>
                    {
                        info!("A.TR document has an embedded text layer");
                        text
                    }
                    Ok(_) => {
                        info!("Embedded text too short, running OCR");
                        self.ocr_pdf(bytes).unwrap_or_default()
                    }
                    Err(e) => {
                        warn!("PDF text extraction failed ({}), trying OCR", e);
                        self.ocr_pdf(bytes).unwrap_or_default()
                    }
                }
            }
        } else {
            self.ocr_image(bytes, filename).unwrap_or_default()
        };
        text.to_uppercase()
    }

    fn scratch_path(&self, suffix: &str) -> PathBuf {
        std::env::temp_dir().join(format!("atr-{}{}", uuid::Uuid::new_v4(), suffix))
    }

    /// Rasterize with `pdftoppm`, then OCR every page with `tesseract`.
    fn ocr_pdf(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let pdf_path = self.scratch_path(".pdf");
        let page_prefix = self.scratch_path("-page");
        fs::write(&pdf_path, bytes)?;

        let rasterized = Command::new("pdftoppm")
            .arg("-png")
            .arg(&pdf_path)
            .arg(&page_prefix)
            .status();
        fs::remove_file(&pdf_path).ok();
        match rasterized {
            Ok(status) if status.success() => {}
            Ok(status) => {
                return Err(ExtractError::new(format!("pdftoppm exited with {}", status)))
            }
            Err(e) => return Err(ExtractError::new(format!("pdftoppm not available: {}", e))),
        }

        let parent = page_prefix.parent().unwrap_or(&page_prefix).to_path_buf();
        let stem = page_prefix
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut pages: Vec<PathBuf> = fs::read_dir(&parent)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(&stem))
                    .unwrap_or(false)
            })
            .collect();
        pages.sort();

        let mut text = String::new();
        for page in &pages {
            match self.run_tesseract(page) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push(' ');
                }
                Err(e) => warn!("OCR failed for page {:?}: {}", page, e),
            }
            fs::remove_file(page).ok();
        }
        Ok(text)
    }

    fn ocr_image(&self, bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
        let suffix = std::path::Path::new(filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".png".to_string());
        let image_path = self.scratch_path(&suffix);
        fs::write(&image_path, bytes)?;
        let result = self.run_tesseract(&image_path);
        fs::remove_file(&image_path).ok();
        result
    }

    fn run_tesseract(&self, path: &PathBuf) -> Result<String, ExtractError> {
        let output = Command::new("tesseract")
            .arg(path)
            .arg("stdout")
            .output()
            .map_err(|e| ExtractError::new(format!("tesseract not available: {}", e)))?;
        if !output.status.success() {
            return Err(ExtractError::new(format!(
                "tesseract exited with {}",
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Regex pass over the OCR text for the A.TR and invoice numbers.
    pub fn analyze_content(&self, raw_text: &str) -> AtrResult {
        let text = self.ws_re.replace_all(raw_text, " ").to_string();
        let mut result = AtrResult {
            atr: NOT_FOUND.to_string(),
            invoice: NOT_FOUND.to_string(),
        };

        // A.TR: "N" + 7 digits, after stripping "NO:"/"NR." style labels
        // that would otherwise shadow the real prefix.
        let text_atr_clean = self.atr_noise_re.replace_all(&text, " ");
        if let Some(m) = self.atr_re.find(&text_atr_clean) {
            let compact: String = m.as_str().chars().filter(|c| !c.is_whitespace()).collect();
            let digits: String = compact.chars().skip(1).take(ATR_LEN).collect();
            result.atr = format!("{}{}", ATR_PREFIX, self.repair_numbers(&digits));
        }

        // Invoice: keyword-anchored first, positional fallback second.
        if let Some(caps) = self.inv_re.captures(&text) {
            let compact: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
            result.invoice = self.repair_numbers(&compact);
        } else if let Some(candidate) = self.fallback_invoice(&text) {
            result.invoice = candidate;
        }

        result
    }

    fn fallback_invoice(&self, text: &str) -> Option<String> {
        for caps in self.inv_fallback_re.captures_iter(text) {
            let cleaned: String = caps[1]
                .chars()
                .filter(|c| c.is_ascii_digit() || "SZODBIL".contains(*c))
                .collect();
            let num = self.repair_numbers(&cleaned);
            // Known-bad matches: years, round thousands and recurring form
            // numbers seen on the template itself.
            if num.len() == 4 && (num.starts_with("202") || num == "1000") {
                continue;
            }
            if num == "34885" || num == "73232" || num == "0363" {
                continue;
            }
            return Some(num);
        }
        None
    }
}

impl Default for AtrExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural check for image-only PDFs: pages whose resources carry
/// XObject images but no fonts cannot have a text layer. If most pages
/// look like that, skip the text-layer attempt entirely.
fn looks_like_scanned(bytes: &[u8]) -> bool {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(d) => d,
        Err(_) => return false,
    };
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let resource_dict = |page_dict: &lopdf::Dictionary, key: &[u8]| -> bool {
        page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .and_then(|res| res.get(key).ok())
            .and_then(|v| doc.dereference(v).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .is_some_and(|d| !d.is_empty())
    };

    let mut image_only = 0usize;
    for object_id in pages.values() {
        let Ok(page_dict) = doc.get_object(*object_id).and_then(|o| o.as_dict()) else {
            continue;
        };
        if resource_dict(page_dict, b"XObject") && !resource_dict(page_dict, b"Font") {
            image_only += 1;
        }
    }
    image_only as f64 / pages.len() as f64 >= 0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_atr_with_ocr_confusions() {
        let extractor = AtrExtractor::new();
        let result = extractor.analyze_content("A.TR CERTIFICATE N O12 3S 67 MOVEMENT");
        assert_eq!(result.atr, "N0123567");
    }

    #[test]
    fn strips_number_labels_before_atr_match() {
        let extractor = AtrExtractor::new();
        // Without stripping, "NO:" would be read as the N prefix
        let result = extractor.analyze_content("A.TR NO: N1234567 ISTANBUL");
        assert_eq!(result.atr, "N1234567");
    }

    #[test]
    fn keyword_anchored_invoice_wins() {
        let extractor = AtrExtractor::new();
        let result = extractor.analyze_content("FATURA NO: 9I23S4 TOTAL 2024");
        assert_eq!(result.invoice, "912354");
    }

    #[test]
    fn fallback_skips_known_bad_candidates() {
        let extractor = AtrExtractor::new();
        // 2024 (year), 1000 and 34885 are all excluded; 55123 is the answer
        let result = extractor.analyze_content("REF 2024 AMT 1000 FORM 34885 DOC 55123 X");
        assert_eq!(result.invoice, "55123");
    }

    #[test]
    fn missing_numbers_report_not_found() {
        let extractor = AtrExtractor::new();
        let result = extractor.analyze_content("NO USABLE CONTENT HERE");
        assert_eq!(result.atr, NOT_FOUND);
        assert_eq!(result.invoice, NOT_FOUND);
    }
}
