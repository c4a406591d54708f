use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use log::warn;
use regex::Regex;
use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use serde::Serialize;

use super::ExtractError;

/// Destination groups the vessel manifest is split into. PL and CZ share
/// a column set; UA additionally carries customs value and tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvhGroup {
    Pl,
    Cz,
    Ua,
}

impl DvhGroup {
    pub fn key(&self) -> &'static str {
        match self {
            DvhGroup::Pl => "PL",
            DvhGroup::Cz => "CZ",
            DvhGroup::Ua => "UA",
        }
    }

    fn columns(&self) -> &'static [&'static str] {
        match self {
            DvhGroup::Pl | DvhGroup::Cz => &[
                "NO.", "VIN", "VESSEL", "DESTINATION", "VCP", "MODEL", "WEIGHT", "MOT", "LF",
                "DATE", "MRN", "DIZ", "DAMAGE",
            ],
            DvhGroup::Ua => &[
                "NO.", "VIN", "VESSEL", "DESTINATION", "VCP", "MODEL", "WEIGHT", "MOT", "LF",
                "DATE", "MRN", "DIZ", "VALUE", "TARIFF", "DAMAGE",
            ],
        }
    }
}

/// One standardized manifest row. Field names follow the column headers
/// the downstream sheets use.
#[derive(Debug, Clone, Serialize)]
pub struct DvhRow {
    #[serde(rename = "NO.")]
    pub no: usize,
    #[serde(rename = "VIN")]
    pub vin: String,
    #[serde(rename = "VESSEL")]
    pub vessel: String,
    #[serde(rename = "DESTINATION")]
    pub destination: String,
    #[serde(rename = "VCP")]
    pub vcp: String,
    #[serde(rename = "MODEL")]
    pub model: String,
    #[serde(rename = "WEIGHT")]
    pub weight: f64,
    #[serde(rename = "MOT")]
    pub mot: String,
    #[serde(rename = "LF")]
    pub lf: String,
    #[serde(rename = "DATE")]
    pub date: String,
    #[serde(rename = "MRN")]
    pub mrn: String,
    #[serde(rename = "DIZ")]
    pub diz: String,
    #[serde(rename = "VALUE")]
    pub value: String,
    #[serde(rename = "TARIFF")]
    pub tariff: String,
    #[serde(rename = "DAMAGE")]
    pub damage: String,
}

/// Manifest split by destination group.
#[derive(Debug, Clone, Serialize)]
pub struct DvhManifest {
    #[serde(rename = "PL")]
    pub pl: Vec<DvhRow>,
    #[serde(rename = "CZ")]
    pub cz: Vec<DvhRow>,
    #[serde(rename = "UA")]
    pub ua: Vec<DvhRow>,
    pub vessel: String,
    pub eta: String,
}

/// One per-group DIZ announcement file ready for download.
#[derive(Debug, Clone, Serialize)]
pub struct DizGroupFile {
    pub group: String,
    pub count: usize,
    pub total_weight: u64,
    pub filename: String,
    pub content: String,
}

/// Splits a Toyota vessel master workbook into the PL/CZ/UA forwarding
/// groups.
///
/// Sheet layout is fixed by the shipping agent: sheet 0 is the Austrian
/// traffic (goes into the CZ group as ATVIE), sheet 1 mixes Poland and
/// Czechia (told apart by the MZ/KL destination code), sheet 2 and the
/// optional extra file are Ukraine. Column positions vary per sailing, so
/// columns are found by keyword.
pub struct DvhProcessor {
    diz_weight_re: Regex,
}

impl DvhProcessor {
    pub fn new() -> Self {
        DvhProcessor {
            diz_weight_re: Regex::new(r"(\d{5})CB").unwrap(),
        }
    }

    pub fn process_manifest(
        &self,
        master_bytes: &[u8],
        vessel_name: &str,
        eta: &str,
        ua_bytes: Option<&[u8]>,
    ) -> Result<DvhManifest, ExtractError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(master_bytes.to_vec()))
            .map_err(|e| ExtractError::new(format!("Cannot read master file: {}", e)))?;

        let mut pl = Vec::new();
        let mut cz = Vec::new();
        let mut ua = Vec::new();

        if let Some(Ok(range)) = workbook.worksheet_range_at(0) {
            for row in Self::map_sheet(&range, vessel_name, Some("ATVIE")) {
                cz.push(row);
            }
        }
        if let Some(Ok(range)) = workbook.worksheet_range_at(1) {
            for row in Self::map_sheet(&range, vessel_name, None) {
                match row.destination.as_str() {
                    "PLWAW" => pl.push(row),
                    "CZPRG" => cz.push(row),
                    _ => {}
                }
            }
        }
        if let Some(Ok(range)) = workbook.worksheet_range_at(2) {
            for row in Self::map_sheet(&range, vessel_name, Some("UAIEV")) {
                ua.push(row);
            }
        }

        if let Some(bytes) = ua_bytes {
            match open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())) {
                Ok(mut ua_wb) => {
                    if let Some(Ok(range)) = ua_wb.worksheet_range_at(0) {
                        for row in Self::map_sheet(&range, vessel_name, Some("UAIEV")) {
                            ua.push(row);
                        }
                    }
                }
                Err(e) => warn!("Cannot read UA file: {}", e),
            }
        }

        for group in [&mut pl, &mut cz, &mut ua] {
            for (i, row) in group.iter_mut().enumerate() {
                row.no = i + 1;
            }
        }

        Ok(DvhManifest {
            pl,
            cz,
            ua,
            vessel: vessel_name.to_string(),
            eta: eta.to_string(),
        })
    }

    fn map_sheet(
        range: &Range<Data>,
        vessel_name: &str,
        dest_override: Option<&str>,
    ) -> Vec<DvhRow> {
        let mut rows = Vec::new();
        let mut iter = range.rows();
        let headers: Vec<String> = match iter.next() {
            Some(h) => h.iter().map(|c| c.to_string().trim().to_uppercase()).collect(),
            None => return rows,
        };

        let find = |keywords: &[&str]| -> Option<usize> {
            keywords
                .iter()
                .find_map(|kw| headers.iter().position(|h| h.contains(kw)))
        };
        let vin_col = find(&["PVVIN", "VIN"]);
        let model_col = find(&["PVMODN", "MODEL"]);
        let weight_col = find(&["PVWGHT", "WEIGHT"]);
        let tariff_col = find(&["PVTRCD", "TARIFF"]);
        let dest_col = find(&["DESTINATION"]);

        for raw in iter {
            let cell = |col: Option<usize>| -> String {
                col.and_then(|c| raw.get(c))
                    .map(|v| v.to_string().trim().to_string())
                    .unwrap_or_default()
            };

            let vin = cell(vin_col);
            if vin.is_empty() {
                continue;
            }

            let weight = cell(weight_col).replace(',', ".").parse::<f64>().unwrap_or(0.0);

            // "999999" renders as "9999 99" on the forwarding sheets
            let mut tariff = cell(tariff_col);
            if tariff.len() >= 6 && tariff.is_ascii() && !tariff.contains(' ') {
                tariff = format!("{} {}", &tariff[..4], &tariff[4..6]);
            }

            let destination = match dest_override {
                Some(d) => d.to_string(),
                None => match cell(dest_col).to_uppercase().as_str() {
                    "MZ" => "PLWAW".to_string(),
                    "KL" => "CZPRG".to_string(),
                    other => other.to_string(),
                },
            };

            rows.push(DvhRow {
                no: 0,
                vin,
                vessel: vessel_name.to_string(),
                destination,
                vcp: String::new(),
                model: cell(model_col),
                weight,
                mot: String::new(),
                lf: String::new(),
                date: String::new(),
                mrn: String::new(),
                diz: String::new(),
                value: String::new(),
                tariff,
                damage: String::new(),
            });
        }
        rows
    }

    /// Renders one group's forwarding sheet. Returns `None` for an empty
    /// group so the caller can skip the download.
    pub fn export_excel_bytes(
        &self,
        rows: &[DvhRow],
        group: DvhGroup,
    ) -> Result<Option<Vec<u8>>, ExtractError> {
        if rows.is_empty() {
            return Ok(None);
        }
        let columns = group.columns();

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet().set_name("Sheet1")?;
        let header_fmt = Format::new()
            .set_bold()
            .set_font_name("Calibri")
            .set_font_size(11)
            .set_background_color(0x00FF_FF00)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let cell_fmt = Format::new()
            .set_font_name("Calibri")
            .set_font_size(11)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);

        let text_of = |row: &DvhRow, column: &str| -> String {
            match column {
                "NO." => row.no.to_string(),
                "VIN" => row.vin.clone(),
                "VESSEL" => row.vessel.clone(),
                "DESTINATION" => row.destination.clone(),
                "VCP" => row.vcp.clone(),
                "MODEL" => row.model.clone(),
                "WEIGHT" => row.weight.to_string(),
                "MOT" => row.mot.clone(),
                "LF" => row.lf.clone(),
                "DATE" => row.date.clone(),
                "MRN" => row.mrn.clone(),
                "DIZ" => row.diz.clone(),
                "VALUE" => row.value.clone(),
                "TARIFF" => row.tariff.clone(),
                "DAMAGE" => row.damage.clone(),
                _ => String::new(),
            }
        };

        for (c, column) in columns.iter().enumerate() {
            let c = c as u16;
            worksheet.write_with_format(0, c, *column, &header_fmt)?;

            let mut max_len = column.chars().count();
            for (r, row) in rows.iter().enumerate() {
                let r = (r + 1) as u32;
                match *column {
                    "NO." => worksheet.write_number_with_format(r, c, row.no as f64, &cell_fmt)?,
                    "WEIGHT" => {
                        worksheet.write_number_with_format(r, c, row.weight, &cell_fmt)?
                    }
                    _ => worksheet.write_with_format(r, c, text_of(row, column), &cell_fmt)?,
                };
                max_len = max_len.max(text_of(row, column).chars().count());
            }
            worksheet.set_column_width(c, (max_len + 2) as f64)?;
        }

        Ok(Some(workbook.save_to_buffer()?))
    }

    /// Splits a DIZ announcement text file into per-group downloads,
    /// summing the 5-digit weights in front of the "CB" marker.
    pub fn process_diz_txt(&self, txt_content: &str) -> Vec<DizGroupFile> {
        let mut groups: Vec<(&str, Vec<String>, u64)> = vec![
            ("PLWAW", Vec::new(), 0),
            ("CZPRG", Vec::new(), 0),
            ("UAIEV", Vec::new(), 0),
        ];

        for line in txt_content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let idx = if line.contains("PLWAW") || line.contains("PLAWA") {
                Some(0)
            } else if line.contains("ATVIE") || line.contains("CZPRG") {
                Some(1)
            } else if line.contains("UAIEV") {
                Some(2)
            } else {
                None
            };
            if let Some(idx) = idx {
                let weight = self
                    .diz_weight_re
                    .captures(line)
                    .and_then(|c| c[1].parse::<u64>().ok())
                    .unwrap_or(0);
                groups[idx].1.push(line.to_string());
                groups[idx].2 += weight;
            }
        }

        groups
            .into_iter()
            .filter(|(_, lines, _)| !lines.is_empty())
            .map(|(key, lines, weight)| DizGroupFile {
                group: key.to_string(),
                count: lines.len(),
                total_weight: weight,
                filename: format!("{}_{}x.txt", key, lines.len()),
                content: lines.join("\n"),
            })
            .collect()
    }
}

impl Default for DvhProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn master_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();

        let at = workbook.add_worksheet().set_name("AT").unwrap();
        for (c, h) in ["PVVIN", "PVMODN", "PVWGHT", "PVTRCD"].iter().enumerate() {
            at.write(0, c as u16, *h).unwrap();
        }
        at.write(1, 0, "JTDKB20U903000001").unwrap();
        at.write(1, 1, "COROLLA").unwrap();
        at.write(1, 2, "1300,5").unwrap();
        at.write(1, 3, "870321").unwrap();

        let plcz = workbook.add_worksheet().set_name("PLCZ").unwrap();
        for (c, h) in ["VIN", "MODEL", "WEIGHT", "DESTINATION"].iter().enumerate() {
            plcz.write(0, c as u16, *h).unwrap();
        }
        plcz.write(1, 0, "JTDKB20U903000002").unwrap();
        plcz.write(1, 1, "YARIS").unwrap();
        plcz.write(1, 2, 1100).unwrap();
        plcz.write(1, 3, "MZ").unwrap();
        plcz.write(2, 0, "JTDKB20U903000003").unwrap();
        plcz.write(2, 1, "RAV4").unwrap();
        plcz.write(2, 2, 1700).unwrap();
        plcz.write(2, 3, "KL").unwrap();
        // blank VIN rows are skipped
        plcz.write(3, 1, "GHOST").unwrap();

        let ua = workbook.add_worksheet().set_name("UA").unwrap();
        for (c, h) in ["PVVIN", "PVMODN", "PVWGHT", "PVTRCD"].iter().enumerate() {
            ua.write(0, c as u16, *h).unwrap();
        }
        ua.write(1, 0, "JTDKB20U903000004").unwrap();
        ua.write(1, 1, "CAMRY").unwrap();
        ua.write(1, 2, 1500).unwrap();
        ua.write(1, 3, "999999").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn splits_sheets_into_groups() {
        let processor = DvhProcessor::new();
        let manifest = processor
            .process_manifest(&master_workbook(), "MV TEST", "2026-09-01", None)
            .unwrap();

        assert_eq!(manifest.cz.len(), 2); // ATVIE + KL
        assert_eq!(manifest.cz[0].destination, "ATVIE");
        assert_eq!(manifest.cz[1].destination, "CZPRG");
        assert_eq!(manifest.pl.len(), 1);
        assert_eq!(manifest.pl[0].destination, "PLWAW");
        assert_eq!(manifest.ua.len(), 1);
        assert_eq!(manifest.ua[0].tariff, "9999 99");
        assert_eq!(manifest.cz[0].weight, 1300.5);
        assert_eq!(manifest.vessel, "MV TEST");
    }

    #[test]
    fn rows_are_numbered_per_group() {
        let processor = DvhProcessor::new();
        let manifest = processor
            .process_manifest(&master_workbook(), "MV TEST", "", None)
            .unwrap();
        assert_eq!(manifest.cz[0].no, 1);
        assert_eq!(manifest.cz[1].no, 2);
        assert_eq!(manifest.pl[0].no, 1);
    }

    #[test]
    fn export_skips_empty_group_and_writes_nonempty() {
        let processor = DvhProcessor::new();
        let manifest = processor
            .process_manifest(&master_workbook(), "MV TEST", "", None)
            .unwrap();
        assert!(processor.export_excel_bytes(&[], DvhGroup::Pl).unwrap().is_none());
        let bytes = processor
            .export_excel_bytes(&manifest.ua, DvhGroup::Ua)
            .unwrap()
            .unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn diz_split_groups_and_weights() {
        let processor = DvhProcessor::new();
        let txt = "\
DIZ 0001 PLWAW 12345CB\n\
DIZ 0002 PLAWA 11111CB\n\
DIZ 0003 ATVIE 10000CB\n\
DIZ 0004 UAIEV no weight here\n\
unrelated line\n";
        let files = processor.process_diz_txt(txt);

        assert_eq!(files.len(), 3);
        let pl = files.iter().find(|f| f.group == "PLWAW").unwrap();
        assert_eq!(pl.count, 2);
        assert_eq!(pl.total_weight, 12345 + 11111);
        assert_eq!(pl.filename, "PLWAW_2x.txt");
        let cz = files.iter().find(|f| f.group == "CZPRG").unwrap();
        assert_eq!(cz.total_weight, 10000);
        let ua = files.iter().find(|f| f.group == "UAIEV").unwrap();
        assert_eq!(ua.total_weight, 0);
    }
}
