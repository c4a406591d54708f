use std::collections::{HashMap, HashSet};

use regex::Regex;
use rust_xlsxwriter::{Color, Format, Workbook};

use super::{is_plausible_vin, ExtractError};

/// Lines from warehouse/customs paperwork that carry no damage content.
/// Matching is substring, case-insensitive.
const GARBAGE_HEADERS: &[&str] = &[
    "Skladišče", "Pozicija", "Naročnik", "Kontejner", "Ladja", "B/L", "Int. št.",
    "Količina", "Teža", "Volumen", "Pakiranje", "Pripombe", "PS prihoda", "Tip dok",
    "Datum", "Vhodni carinski", "Blago", "Markacija", "Tehtanje", "SPREJET", "PAGE", "RO-RO",
    "Izdelano", "Predano", "Sprejeto", "Zaključeno", "Podpisali", "Ura", "Stran:",
    "NO.", "VESSEL", "DESTINATION", "VCP", "MODEL", "WEIGHT", "MOT", "LF", "DATE", "MRN",
    "DIZ", "DAMAGE", "PO LUŠKIH",
];

/// Boilerplate damage phrases printed on the report template itself.
const FORBIDDEN_STRINGS: &[&str] = &[
    "90 - FRAME 10 - STAINED OR SOILED 05 - OVER 30 CM IN LENGTH/DIAMETER",
    "90 - FRAME 30 - FLUID SPILLAGE, EXTERIOR (OIL SPILLAGE, BIRD DROP, OTH.) 05 - OVER 30 CM IN LENGTH/DIAMETER",
    "90 - FRAME 30 - FLUID SPILLAGE, EXTERIOR",
    "BI",
];

/// Column where damages land when the manifest header gives no hint
/// (column M).
const DEFAULT_DAMAGE_COL: usize = 12;

/// One manifest line with the damages matched to it by VIN.
#[derive(Debug, Clone)]
pub struct ManifestRow {
    pub cells: Vec<String>,
    pub damages: Vec<String>,
}

/// Reconciles OCR text of Toyota damage reports with a vessel manifest.
///
/// The OCR side is parsed into `{VIN: [damage lines]}` using
/// continuation-line heuristics tuned to the port's report template; the
/// manifest side is delimiter-sniffed text whose rows are keyed by the
/// VIN found anywhere in the row.
pub struct DamageProcessor {
    ws_re: Regex,
    page_re: Regex,
    amount_re: Regex,
    table_row_re: Regex,
    dim_re: Regex,
    dim_text_re: Regex,
    zp_vin_re: Regex,
    vin_re: Regex,
    vin_any_re: Regex,
    vin_label_re: Regex,
    zp_mode_re: Regex,
    zp_prefix_re: Regex,
    colon_prefix_re: Regex,
    disclaimer_re: Regex,
    code_start_re: Regex,
    trailing_time_re: Regex,
}

impl DamageProcessor {
    pub fn new() -> Self {
        DamageProcessor {
            ws_re: Regex::new(r"\s+").unwrap(),
            page_re: Regex::new(r"PAGE\s+\d+").unwrap(),
            amount_re: Regex::new(r"^\d{1,3}(\.\d{3})*,\d{2}$").unwrap(),
            table_row_re: Regex::new(r"^\s*\d+[.,]?\s+[A-Z0-9]{17}").unwrap(),
            dim_re: Regex::new(r"(?i)^(0[0-6])\s*-\s*(?:cm|mm|missing|manjka|fehlt|up to|over|nad|do|-)").unwrap(),
            dim_text_re: Regex::new(r"(?i)^(?:up to|over|nad|do)\b").unwrap(),
            zp_vin_re: Regex::new(r"(?i)ZP\s*:?\s*([A-Z0-9]{17})\b").unwrap(),
            vin_re: Regex::new(r"(?i)\b([A-Z0-9]{17})\b").unwrap(),
            vin_any_re: Regex::new(r"[A-Z0-9]{17}").unwrap(),
            vin_label_re: Regex::new(r"^VIN:|^Št\. VIN").unwrap(),
            zp_mode_re: Regex::new(r"(?i)ZP\s*:?").unwrap(),
            zp_prefix_re: Regex::new(r"(?i)^ZP\s*:?\s*").unwrap(),
            colon_prefix_re: Regex::new(r"^:\s*").unwrap(),
            disclaimer_re: Regex::new(r"(?i)ZA SKRITE NAPAKE LUKA NE ODGOVARJA\.?").unwrap(),
            code_start_re: Regex::new(r"^\d{2}[\s-]").unwrap(),
            trailing_time_re: Regex::new(r"\s+\d+:?$").unwrap(),
        }
    }

    fn clean_string(&self, text: &str) -> String {
        self.ws_re.replace_all(text, " ").trim().to_string()
    }

    fn is_garbage(&self, line: &str) -> bool {
        if line.chars().count() < 2 {
            return true;
        }
        if line.trim() == "BI" {
            return true;
        }
        let lower = line.to_lowercase();
        if GARBAGE_HEADERS.iter().any(|h| lower.contains(&h.to_lowercase())) {
            return true;
        }
        if self.page_re.is_match(line) {
            return true;
        }
        self.amount_re.is_match(line.trim())
    }

    fn is_table_row(&self, line: &str) -> bool {
        self.table_row_re.is_match(line)
    }

    /// Continuation line carrying only a dimension/extent, e.g.
    /// "05 - over 30 cm". Lines naming a part are new damages, not
    /// continuations, even when they start with a dimension code.
    fn is_dimension_line(&self, line: &str) -> bool {
        const CONFLICT_WORDS: &[&str] = &[
            "antenna", "battery", "bumper", "vrata", "door", "odbijač", "baterija",
            "antena", "fender", "blatnik",
        ];
        let lower = line.to_lowercase();
        let has_conflict = CONFLICT_WORDS.iter().any(|w| lower.contains(w));
        if self.dim_re.is_match(line) && !has_conflict {
            return true;
        }
        self.dim_text_re.is_match(line)
    }

    /// In ZP mode ("skrite napake", hidden damages) only VINs behind a ZP
    /// marker count; bare 17-char blocks are table noise.
    fn extract_vin(&self, line: &str, require_zp: bool) -> Option<String> {
        let clean = line.trim();
        if let Some(caps) = self.zp_vin_re.captures(clean) {
            return Some(caps[1].to_string());
        }
        if !require_zp {
            if let Some(caps) = self.vin_re.captures(clean) {
                let v = caps[1].to_string();
                if is_plausible_vin(&v) {
                    return Some(v);
                }
            }
        }
        None
    }

    /// Parse raw OCR text into per-VIN damage lists.
    pub fn process_raw_text(&self, raw_text: &str) -> HashMap<String, Vec<String>> {
        let has_zp = self.zp_mode_re.is_match(raw_text);
        let mut collected: Vec<(String, Vec<String>)> = Vec::new();
        let mut current_vin: Option<usize> = None;

        for line in raw_text.lines() {
            let trimmed = self.disclaimer_re.replace_all(line, "").trim().to_string();

            if self.vin_label_re.is_match(&trimmed)
                || self.is_table_row(&trimmed)
                || self.is_garbage(&trimmed)
            {
                current_vin = None;
                if self.is_garbage(&trimmed) {
                    continue;
                }
            }

            let vin = self.extract_vin(&trimmed, has_zp);

            if has_zp && vin.is_none() && self.vin_any_re.is_match(&trimmed) {
                current_vin = None;
                continue;
            }

            if let Some(vin) = vin {
                if self.is_table_row(&trimmed) {
                    current_vin = None;
                    continue;
                }

                let idx = match collected.iter().position(|(v, _)| *v == vin) {
                    Some(idx) => idx,
                    None => {
                        collected.push((vin.clone(), Vec::new()));
                        collected.len() - 1
                    }
                };
                current_vin = Some(idx);

                // Strip the VIN and its markers so only the damage remains
                let mut damage_part = self.zp_prefix_re.replace(&trimmed, "").to_string();
                damage_part = damage_part.replace(&vin, "").trim().to_string();
                damage_part = self.colon_prefix_re.replace(&damage_part, "").to_string();
                if !damage_part.is_empty() {
                    collected[idx].1.push(damage_part);
                }
            } else if let Some(idx) = current_vin {
                if !trimmed.is_empty() {
                    collected[idx].1.push(trimmed);
                }
            }
        }

        let mut results = HashMap::new();
        for (vin, raw_lines) in collected {
            let merged = self.merge_damage_lines(&raw_lines);
            let cleaned = self.scrub_damages(&merged);
            if !cleaned.is_empty() {
                results.insert(vin, cleaned);
            }
        }
        results
    }

    /// Joins continuation lines into single damage entries: a trailing
    /// hyphen, a dimension-only line, or a line without a leading 2-digit
    /// code all continue the previous damage.
    fn merge_damage_lines(&self, raw_lines: &[String]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut current = String::new();

        for (i, raw) in raw_lines.iter().enumerate() {
            let line = self.clean_string(&raw.replace("O:", "").replace("PT", ""));
            if i == 0 {
                current = line;
                continue;
            }
            let prev_ends_hyphen = current.trim_end().ends_with('-');
            let starts_with_code = self.code_start_re.is_match(&line);
            let looks_like_dim = self.is_dimension_line(&line);

            if prev_ends_hyphen || looks_like_dim || !starts_with_code {
                current.push(' ');
                current.push_str(&line);
            } else {
                merged.push(current);
                current = line;
            }
        }
        if !current.is_empty() {
            merged.push(current);
        }
        merged
    }

    fn scrub_damages(&self, merged: &[String]) -> Vec<String> {
        let mut cleaned = Vec::new();
        for damage in merged {
            let mut d = damage.clone();
            for forbidden in FORBIDDEN_STRINGS {
                d = d.replace(forbidden, "").trim().to_string();
            }
            d = self.clean_string(&d);
            d = self.trailing_time_re.replace(&d, "").to_string();
            if d.chars().count() > 1 {
                cleaned.push(d);
            }
        }
        cleaned
    }

    /// Merge damages onto a pasted manifest, optionally reordering rows to
    /// a user-supplied VIN sequence. Returns the rows plus the column
    /// index where damages start.
    pub fn process_manifest_reorder(
        &self,
        manifest_text: &str,
        parsed_data: &HashMap<String, Vec<String>>,
        vin_order_list: Option<&[String]>,
    ) -> (Vec<ManifestRow>, usize) {
        let lines: Vec<&str> = manifest_text.lines().collect();

        let mut delimiter = '\t';
        for line in lines.iter().take(5) {
            if line.contains('\t') {
                delimiter = '\t';
                break;
            }
            if line.contains(',') {
                delimiter = ',';
                break;
            }
            if line.contains(';') {
                delimiter = ';';
                break;
            }
        }

        let mut damage_start_idx = DEFAULT_DAMAGE_COL;
        if let Some(first) = lines.first() {
            for (idx, cell) in first.split(delimiter).enumerate() {
                let upper = cell.to_uppercase();
                if upper.contains("DAMAGE") || upper.contains("POŠKODBE") {
                    damage_start_idx = idx;
                    break;
                }
            }
        }

        let mut output_rows: Vec<ManifestRow> = Vec::new();
        let mut rows_by_vin: Vec<(String, ManifestRow)> = Vec::new();

        for line in &lines {
            let clean_line = line.trim();
            if clean_line.is_empty() {
                continue;
            }
            let cells: Vec<String> =
                clean_line.split(delimiter).map(|c| c.trim().to_string()).collect();

            let found_vin = cells.iter().find_map(|cell| {
                self.vin_re.captures(cell).and_then(|caps| {
                    let v = caps[1].to_string();
                    is_plausible_vin(&v).then_some(v)
                })
            });

            let mut row = ManifestRow {
                cells,
                damages: Vec::new(),
            };

            if let Some(vin) = &found_vin {
                let upper = vin.to_uppercase();
                row.damages = parsed_data
                    .get(vin)
                    .or_else(|| parsed_data.get(&upper))
                    .cloned()
                    .unwrap_or_default();
                match rows_by_vin.iter_mut().find(|(v, _)| *v == upper) {
                    Some(entry) => entry.1 = row.clone(),
                    None => rows_by_vin.push((upper, row.clone())),
                }
            }

            if found_vin.is_none() || vin_order_list.is_none() {
                output_rows.push(row);
            }
        }

        if let Some(order) = vin_order_list {
            let mut ordered: Vec<ManifestRow> = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();

            // Requested VINs first, in the caller's order
            for requested in order {
                let requested = requested.trim().to_uppercase();
                if requested.is_empty() {
                    continue;
                }
                if let Some((_, row)) = rows_by_vin.iter().find(|(v, _)| *v == requested) {
                    ordered.push(row.clone());
                    seen.insert(requested);
                }
            }
            // Manifest VINs missing from the list go to the bottom
            for (vin, row) in &rows_by_vin {
                if !seen.contains(vin) {
                    ordered.push(row.clone());
                }
            }
            // Keep the header row on top
            if let Some(first) = output_rows.first() {
                let has_vin = first.cells.iter().any(|c| {
                    self.vin_re
                        .captures(c)
                        .map(|caps| is_plausible_vin(&caps[1]))
                        .unwrap_or(false)
                });
                if !has_vin {
                    ordered.insert(0, first.clone());
                }
            }
            return (ordered, damage_start_idx);
        }

        (output_rows, damage_start_idx)
    }

    /// Parses `VIN: damage` lines and appends them to the matching rows.
    pub fn inject_manual_damages(&self, output_rows: &mut [ManifestRow], manual_text: &str) {
        let mut manual_map: HashMap<String, Vec<String>> = HashMap::new();
        for line in manual_text.lines() {
            if let Some((vin, dmg)) = line.split_once(':') {
                let vin = vin.trim().to_uppercase();
                let dmg = dmg.trim().to_string();
                if !vin.is_empty() && !dmg.is_empty() {
                    manual_map.entry(vin).or_default().push(dmg);
                }
            }
        }
        if manual_map.is_empty() {
            return;
        }

        for row in output_rows.iter_mut() {
            let found_vin = row.cells.iter().find_map(|cell| {
                self.vin_re
                    .captures(cell)
                    .map(|caps| caps[1].to_uppercase())
            });
            if let Some(vin) = found_vin {
                if let Some(extra) = manual_map.get(&vin) {
                    row.damages.extend(extra.iter().cloned());
                }
            }
        }
    }

    /// Renders the reconciled manifest; damages are written in bold red
    /// starting at the damage column.
    pub fn export_excel(
        &self,
        output_rows: &[ManifestRow],
        damage_start_idx: usize,
    ) -> Result<Vec<u8>, ExtractError> {
        let mut max_cols = 0usize;
        for row in output_rows {
            let needed = row.cells.len().max(damage_start_idx + row.damages.len());
            max_cols = max_cols.max(needed);
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet().set_name("Final")?;
        let red = Format::new().set_bold().set_font_color(Color::RGB(0x00C0_0000));

        for (r_idx, row) in output_rows.iter().enumerate() {
            let mut cells = row.cells.clone();
            cells.resize(max_cols, String::new());
            for (i, dmg) in row.damages.iter().enumerate() {
                let target = damage_start_idx + i;
                if target < cells.len() {
                    cells[target] = dmg.clone();
                } else {
                    cells.push(dmg.clone());
                }
            }

            let damage_range = damage_start_idx..damage_start_idx + row.damages.len();
            for (c_idx, value) in cells.iter().enumerate() {
                if damage_range.contains(&c_idx) && !value.is_empty() {
                    worksheet.write_with_format(r_idx as u32, c_idx as u16, value, &red)?;
                } else {
                    worksheet.write(r_idx as u32, c_idx as u16, value)?;
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}

impl Default for DamageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIN_A: &str = "JTDKB20U903012345";
    const VIN_B: &str = "WAUZZZ8V0FA067890";

    #[test]
    fn parses_damages_and_merges_continuations() {
        let text = format!(
            "Skladišče: Koper\n\
             {} 90 - SCRATCHED HOOD -\n\
             up to 30 cm\n\
             {}: 10 - STAINED SEAT\n\
             05 - over 30 cm\n",
            VIN_A, VIN_B
        );
        let processor = DamageProcessor::new();
        let parsed = processor.process_raw_text(&text);

        assert_eq!(parsed[VIN_A], vec!["90 - SCRATCHED HOOD - up to 30 cm"]);
        assert_eq!(parsed[VIN_B], vec!["10 - STAINED SEAT 05 - over 30 cm"]);
    }

    #[test]
    fn separate_codes_become_separate_damages() {
        let text = format!(
            "{} 90 - SCRATCHED HOOD\n\
             30 - DENTED DOOR\n",
            VIN_A
        );
        let processor = DamageProcessor::new();
        let parsed = processor.process_raw_text(&text);
        assert_eq!(
            parsed[VIN_A],
            vec!["90 - SCRATCHED HOOD".to_string(), "30 - DENTED DOOR".to_string()]
        );
    }

    #[test]
    fn zp_mode_ignores_plain_table_vins() {
        let text = format!(
            "ZP: {} 30 - HIDDEN SCRATCH\n\
             1 {} COROLLA 1500\n",
            VIN_A, VIN_B
        );
        let processor = DamageProcessor::new();
        let parsed = processor.process_raw_text(&text);
        assert!(parsed.contains_key(VIN_A));
        assert!(!parsed.contains_key(VIN_B));
    }

    #[test]
    fn forbidden_template_strings_are_scrubbed() {
        let text = format!("{} 90 - FRAME 30 - FLUID SPILLAGE, EXTERIOR\n", VIN_A);
        let processor = DamageProcessor::new();
        let parsed = processor.process_raw_text(&text);
        // The whole damage was template boilerplate, so the VIN drops out
        assert!(!parsed.contains_key(VIN_A));
    }

    #[test]
    fn manifest_merge_keeps_order_without_reorder_list() {
        let manifest = format!(
            "NO.\tVIN\tMODEL\tDAMAGE\n1\t{}\tCOROLLA\n2\t{}\tYARIS\n",
            VIN_A, VIN_B
        );
        let mut parsed = HashMap::new();
        parsed.insert(VIN_A.to_string(), vec!["90 - SCRATCH".to_string()]);

        let processor = DamageProcessor::new();
        let (rows, dmg_idx) = processor.process_manifest_reorder(&manifest, &parsed, None);

        assert_eq!(dmg_idx, 3);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].damages, vec!["90 - SCRATCH"]);
        assert!(rows[2].damages.is_empty());
    }

    #[test]
    fn reorder_follows_vin_list_and_keeps_header() {
        let manifest = format!(
            "NO.\tVIN\tMODEL\tDAMAGE\n1\t{}\tCOROLLA\n2\t{}\tYARIS\n",
            VIN_A, VIN_B
        );
        let parsed = HashMap::new();
        let order = vec![VIN_B.to_string(), VIN_A.to_string()];

        let processor = DamageProcessor::new();
        let (rows, _) = processor.process_manifest_reorder(&manifest, &parsed, Some(&order));

        assert_eq!(rows.len(), 3);
        assert!(rows[0].cells[1].contains("VIN")); // header preserved
        assert!(rows[1].cells.iter().any(|c| c.contains(VIN_B)));
        assert!(rows[2].cells.iter().any(|c| c.contains(VIN_A)));
    }

    #[test]
    fn manual_damages_append_to_matching_rows() {
        let manifest = format!("1\t{}\tCOROLLA\n", VIN_A);
        let parsed = HashMap::new();
        let processor = DamageProcessor::new();
        let (mut rows, _) = processor.process_manifest_reorder(&manifest, &parsed, None);

        processor.inject_manual_damages(&mut rows, &format!("{}: WHEEL SCUFF", VIN_A));
        assert_eq!(rows[0].damages, vec!["WHEEL SCUFF"]);
    }

    #[test]
    fn export_produces_workbook() {
        let processor = DamageProcessor::new();
        let rows = vec![ManifestRow {
            cells: vec!["1".to_string(), VIN_A.to_string()],
            damages: vec!["90 - SCRATCH".to_string()],
        }];
        let bytes = processor.export_excel(&rows, 12).unwrap();
        assert!(!bytes.is_empty());
    }
}
