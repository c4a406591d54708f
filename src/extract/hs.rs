use std::collections::HashSet;
use std::io::{Cursor, Read};

use calamine::{open_workbook_auto_from_rs, Reader};
use log::warn;
use regex::Regex;
use serde::Serialize;

use super::ExtractError;

/// One VIN/HS-code pair pulled out of a packing-list workbook.
#[derive(Debug, Clone, Serialize)]
pub struct HsRecord {
    pub vin: String,
    pub hs: String,
    pub file: String,
    pub packing: String,
}

/// VIN + HS-code extractor for packing-list exports.
///
/// Accepts a single Excel file or a ZIP of them. The header row is not at a
/// fixed position across ERP exports, so it is sniffed: the first cell in
/// the first 20 rows containing `VIN` or `FAHRGESTELL` marks the VIN
/// column, with the HS code assumed one column to the right. Exports with
/// no recognizable header fall back to columns C/D with data from row 12.
pub struct HsCodeExtractor {
    seen_vins: HashSet<String>,
    records: Vec<HsRecord>,
    pack_re: Regex,
}

const HEADER_SCAN_ROWS: usize = 20;
const FALLBACK_VIN_COL: usize = 2;
const FALLBACK_HS_COL: usize = 3;
const FALLBACK_START_ROW: usize = 11;

impl HsCodeExtractor {
    pub fn new() -> Self {
        HsCodeExtractor {
            seen_vins: HashSet::new(),
            records: Vec::new(),
            pack_re: Regex::new(r"(?i)pack_(\d+)").unwrap(),
        }
    }

    /// Entry point: dispatches on the upload's extension (ZIP vs Excel)
    /// and returns every unique VIN found across all contained sheets.
    pub fn process_upload(
        mut self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<Vec<HsRecord>, ExtractError> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".zip") {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
            for i in 0..archive.len() {
                let mut entry = archive.by_index(i)?;
                let name = entry.name().to_string();
                let entry_lower = name.to_lowercase();
                if name.starts_with("__MACOSX") || name.ends_with('/') {
                    continue;
                }
                if entry_lower.ends_with(".xlsx") || entry_lower.ends_with(".xls") {
                    let mut content = Vec::new();
                    entry.read_to_end(&mut content)?;
                    self.process_workbook(&content, &name);
                }
            }
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            self.process_workbook(bytes, filename);
        } else {
            return Err(ExtractError::new("Unsupported file type, expected ZIP or Excel"));
        }
        Ok(self.records)
    }

    /// Per-workbook extraction. Errors are logged and skipped so one broken
    /// file inside a ZIP does not sink the whole batch.
    fn process_workbook(&mut self, bytes: &[u8], filename: &str) {
        if let Err(e) = self.try_process_workbook(bytes, filename) {
            warn!("Skipping workbook {}: {}", filename, e);
        }
    }

    fn try_process_workbook(&mut self, bytes: &[u8], filename: &str) -> Result<(), ExtractError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ExtractError::new("workbook has no sheets"))??;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|r| r.iter().map(|c| c.to_string().trim().to_string()).collect())
            .collect();

        // Header sniffing
        let mut vin_idx = None;
        let mut hs_idx = 0;
        let mut start_row = 0;
        'scan: for (r, row) in rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let upper = cell.to_uppercase();
                if upper.contains("VIN") || upper.contains("FAHRGESTELL") {
                    vin_idx = Some(c);
                    hs_idx = c + 1;
                    start_row = r + 1;
                    break 'scan;
                }
            }
        }
        let vin_idx = match vin_idx {
            Some(idx) => idx,
            None => {
                hs_idx = FALLBACK_HS_COL;
                start_row = FALLBACK_START_ROW;
                FALLBACK_VIN_COL
            }
        };

        let packing = self
            .pack_re
            .captures(filename)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| "-".to_string());

        for row in rows.iter().skip(start_row) {
            let vin = match row.get(vin_idx) {
                Some(v) => v.trim().to_string(),
                None => continue,
            };
            if vin.chars().count() > 10 && !self.seen_vins.contains(&vin) {
                let hs = row.get(hs_idx).map(|h| h.trim().to_string()).unwrap_or_default();
                self.seen_vins.insert(vin.clone());
                self.records.push(HsRecord {
                    vin,
                    hs,
                    file: filename.to_string(),
                    packing: packing.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for HsCodeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn sheet_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                worksheet.write(r as u32, c as u16, *cell).unwrap();
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn finds_header_and_dedupes() {
        let bytes = sheet_bytes(&[
            &["Packing list", ""],
            &["VIN", "HS-CODE"],
            &["WVWZZZ1JZXW000001", "870321"],
            &["WVWZZZ1JZXW000001", "870321"],
            &["WVWZZZ1JZXW000002", "870322"],
            &["short", "999999"],
        ]);
        let records = HsCodeExtractor::new()
            .process_upload(&bytes, "pack_17.xlsx")
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].vin, "WVWZZZ1JZXW000001");
        assert_eq!(records[0].hs, "870321");
        assert_eq!(records[0].packing, "17");
    }

    #[test]
    fn header_in_any_of_first_rows() {
        let bytes = sheet_bytes(&[
            &[""],
            &[""],
            &["", "Fahrgestellnummer", "HS"],
            &["", "WAUZZZ8V0FA000003", "870324"],
        ]);
        let records = HsCodeExtractor::new()
            .process_upload(&bytes, "export.xlsx")
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hs, "870324");
        assert_eq!(records[0].packing, "-");
    }

    #[test]
    fn fallback_layout_when_no_header() {
        // No VIN/FAHRGESTELL cell anywhere: data expected at C/D from row 12
        let mut rows: Vec<Vec<String>> = vec![vec![String::new(); 4]; 11];
        rows.push(vec![
            String::new(),
            String::new(),
            "JTDKB20U903000004".to_string(),
            "870390".to_string(),
        ]);
        let borrowed: Vec<Vec<&str>> = rows
            .iter()
            .map(|r| r.iter().map(|s| s.as_str()).collect())
            .collect();
        let slices: Vec<&[&str]> = borrowed.iter().map(|r| r.as_slice()).collect();
        let bytes = sheet_bytes(&slices);
        let records = HsCodeExtractor::new()
            .process_upload(&bytes, "raw.xlsx")
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vin, "JTDKB20U903000004");
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(HsCodeExtractor::new()
            .process_upload(b"whatever", "notes.txt")
            .is_err());
    }
}
