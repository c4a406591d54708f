use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Reader};
use chrono::Local;
use serde::Serialize;

use super::ExtractError;

/// Column aliases seen across Luka Koper shot lists, rail plans and NCTS
/// exports. Header detection uses exact VIN-alias matches; per-column
/// lookup is contains-based in alias priority order.
const VIN_ALIASES: &[&str] = &["VIN", "VEHICLEUSEVIN", "SASIJA"];
const MOT_ALIASES: &[&str] = &[
    "MOT",
    "VAGON",
    "OZNAKA_PS",
    "VEHICLEUSELOADINGMEANSOFTRANSPORTNUMBER",
    "ACTUALMEANSOFTRANSPORT",
];
const WEIGHT_ALIASES: &[&str] = &["WEIGHT", "TEZA", "NETO", "WGT", "MASS"];
const DEST_ALIASES: &[&str] = &["DESTINATION", "DEST", "VEHICLEUSEDESTINATIONCODE", "CILJ"];
const MODEL_ALIASES: &[&str] = &["MODEL", "VEHICLEUSEMODELCODE"];
const MRN_ALIASES: &[&str] = &["MRN", "MRN_TEZA"];
const VESSEL_ALIASES: &[&str] = &["VESSEL", "LADJA"];
const VALUE_ALIASES: &[&str] = &["VALUE", "VREDNOST", "AMOUNT", "PRICE"];

const HEADER_SCAN_ROWS: usize = 10;
const MIN_VIN_LEN: usize = 5;

/// One vehicle of the outgoing train, shot list joined with the plan.
#[derive(Debug, Clone, Serialize)]
pub struct TrainRow {
    #[serde(rename = "NO.")]
    pub no: usize,
    #[serde(rename = "VIN")]
    pub vin: String,
    #[serde(rename = "VESSEL")]
    pub vessel: String,
    #[serde(rename = "DESTINATION")]
    pub destination: String,
    #[serde(rename = "MODEL")]
    pub model: String,
    #[serde(rename = "WEIGHT")]
    pub weight: String,
    #[serde(rename = "MOT")]
    pub mot: String,
    #[serde(rename = "LF")]
    pub lf: String,
    #[serde(rename = "MRN")]
    pub mrn: String,
    #[serde(rename = "DATE")]
    pub date: String,
    #[serde(rename = "VALUE", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(rename = "DAMAGE")]
    pub damage: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WagonStat {
    #[serde(rename = "MOT")]
    pub mot: String,
    #[serde(rename = "WEIGHT")]
    pub weight: f64,
    #[serde(rename = "LF")]
    pub lf: String,
    #[serde(rename = "VIN")]
    pub vehicles: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainStats {
    pub total_weight: f64,
    pub total_cars: usize,
    pub total_value: f64,
    pub wagons_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub wagons: Vec<WagonStat>,
    pub stats: TrainStats,
    pub report_text: String,
}

/// Joins the Luka Koper shot list against the rail plan and aggregates
/// per-wagon loading statistics.
pub struct TrainProcessor;

/// One sheet with the header row located and split off.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn from_xlsx(bytes: &[u8]) -> Result<Table, ExtractError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ExtractError::new("workbook has no sheets"))??;
        let all: Vec<Vec<String>> = range
            .rows()
            .map(|r| r.iter().map(|c| c.to_string().trim().to_string()).collect())
            .collect();

        // The header row is wherever an exact VIN alias shows up, not
        // necessarily on top.
        let header_idx = all
            .iter()
            .take(HEADER_SCAN_ROWS)
            .position(|row| {
                row.iter()
                    .any(|cell| VIN_ALIASES.contains(&cell.to_uppercase().as_str()))
            })
            .unwrap_or(0);

        let headers = all
            .get(header_idx)
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|h| h.to_uppercase())
            .collect();
        Ok(Table {
            headers,
            rows: all.into_iter().skip(header_idx + 1).collect(),
        })
    }

    fn find_col(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.headers.iter().position(|h| h.contains(alias)))
    }

    fn cell(&self, row: &[String], aliases: &[&str]) -> String {
        self.find_col(aliases)
            .and_then(|c| row.get(c))
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

impl TrainProcessor {
    pub fn new() -> Self {
        TrainProcessor
    }

    /// Phase 1: left join of shot list (master) and plan on VIN, plan
    /// values taking priority where both files carry a column.
    pub fn process_phase_1(
        &self,
        shot_bytes: &[u8],
        plan_bytes: &[u8],
        is_t1: bool,
    ) -> Result<Vec<TrainRow>, ExtractError> {
        let shot = Table::from_xlsx(shot_bytes)?;
        let plan = Table::from_xlsx(plan_bytes)?;

        let shot_vin = shot
            .find_col(VIN_ALIASES)
            .ok_or_else(|| ExtractError::new("VIN column not found in the shot list"))?;
        let plan_vin = plan
            .find_col(VIN_ALIASES)
            .ok_or_else(|| ExtractError::new("VIN column not found in the plan"))?;

        let plan_by_vin: std::collections::HashMap<String, &Vec<String>> = plan
            .rows
            .iter()
            .rev() // first occurrence wins
            .map(|row| (row.get(plan_vin).cloned().unwrap_or_default(), row))
            .collect();

        let empty: Vec<String> = Vec::new();
        let today = Local::now().format("%d.%m.%Y").to_string();
        let mut out = Vec::new();

        for row in &shot.rows {
            let vin = row.get(shot_vin).cloned().unwrap_or_default();
            if vin.chars().count() < MIN_VIN_LEN {
                continue;
            }
            let plan_row = plan_by_vin.get(&vin).copied().unwrap_or(&empty);

            let get = |aliases: &[&str]| -> String {
                let from_plan = plan.cell(plan_row, aliases);
                if !from_plan.is_empty() {
                    return from_plan;
                }
                shot.cell(row, aliases)
            };

            let wagon = get(MOT_ALIASES);
            // Wagon series fixes the loading factor
            let lf = if wagon.contains("429") {
                "10"
            } else if wagon.contains("437") {
                "13"
            } else {
                ""
            };

            let value = is_t1.then(|| {
                get(VALUE_ALIASES)
                    .replace(',', ".")
                    .parse::<f64>()
                    .unwrap_or(0.0)
            });

            out.push(TrainRow {
                no: out.len() + 1,
                vin,
                vessel: get(VESSEL_ALIASES),
                destination: get(DEST_ALIASES),
                model: get(MODEL_ALIASES),
                weight: get(WEIGHT_ALIASES),
                mot: wagon,
                lf: lf.to_string(),
                mrn: get(MRN_ALIASES),
                date: today.clone(),
                value,
                damage: String::new(),
            });
        }
        Ok(out)
    }

    /// Phase 2: per-wagon stats sorted by wagon id plus the report text
    /// for the rail operator.
    pub fn process_phase_2(&self, rows: &[TrainRow]) -> TrainReport {
        let mut wagons: Vec<WagonStat> = Vec::new();
        let mut total_weight = 0.0;
        let mut total_value = 0.0;

        for row in rows {
            let weight = row.weight.replace(',', ".").parse::<f64>().unwrap_or(0.0);
            total_weight += weight;
            total_value += row.value.unwrap_or(0.0);

            match wagons.iter_mut().find(|w| w.mot == row.mot) {
                Some(wagon) => {
                    wagon.weight += weight;
                    wagon.vehicles += 1;
                }
                None => wagons.push(WagonStat {
                    mot: row.mot.clone(),
                    weight,
                    lf: row.lf.clone(),
                    vehicles: 1,
                }),
            }
        }
        wagons.sort_by(|a, b| a.mot.cmp(&b.mot));

        let report_text = format!(
            "{} Wagen mit Toyota Fahrzeuge\nSkupaj/zusammen - {} vozil, teza {} kg",
            wagons.len(),
            rows.len(),
            format_weight(total_weight)
        );

        TrainReport {
            stats: TrainStats {
                total_weight,
                total_cars: rows.len(),
                total_value,
                wagons_count: wagons.len(),
            },
            wagons,
            report_text,
        }
    }
}

impl Default for TrainProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{}", weight as i64)
    } else {
        weight.to_string()
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

    fn shot_list() -> Vec<u8> {
        sheet_bytes(&[
            &["SASIJA", "VAGON", "TEZA"],
            &["JTDKB20U903000001", "429 001", "1300"],
            &["JTDKB20U903000002", "429 001", "1100"],
            &["JTDKB20U903000003", "437 777", "1700"],
            &["x", "junk", "0"],
        ])
    }

    fn plan() -> Vec<u8> {
        // Header buried below a title row
        sheet_bytes(&[
            &["TOYOTA PLAN KW35", "", "", ""],
            &["VIN", "MODEL", "DESTINATION", "VREDNOST"],
            &["JTDKB20U903000001", "COROLLA", "PLWAW", "15000,50"],
            &["JTDKB20U903000003", "RAV4", "CZPRG", "21000"],
        ])
    }

    #[test]
    fn joins_plan_onto_shot_list() {
        let processor = TrainProcessor::new();
        let rows = processor.process_phase_1(&shot_list(), &plan(), false).unwrap();

        assert_eq!(rows.len(), 3); // short VIN skipped
        assert_eq!(rows[0].model, "COROLLA");
        assert_eq!(rows[0].destination, "PLWAW");
        assert_eq!(rows[0].weight, "1300");
        assert_eq!(rows[1].model, ""); // not in plan
        assert_eq!(rows[2].destination, "CZPRG");
        assert_eq!(rows[0].no, 1);
        assert_eq!(rows[2].no, 3);
    }

    #[test]
    fn wagon_series_sets_loading_factor() {
        let processor = TrainProcessor::new();
        let rows = processor.process_phase_1(&shot_list(), &plan(), false).unwrap();
        assert_eq!(rows[0].lf, "10");
        assert_eq!(rows[2].lf, "13");
    }

    #[test]
    fn t1_mode_parses_values() {
        let processor = TrainProcessor::new();
        let rows = processor.process_phase_1(&shot_list(), &plan(), true).unwrap();
        assert_eq!(rows[0].value, Some(15000.5));
        assert_eq!(rows[1].value, Some(0.0));
        let report = processor.process_phase_2(&rows);
        assert_eq!(report.stats.total_value, 15000.5 + 21000.0);
    }

    #[test]
    fn wagon_stats_sort_by_wagon_id() {
        let shot = sheet_bytes(&[
            &["SASIJA", "VAGON", "TEZA"],
            &["JTDKB20U903000003", "437 777", "1700"],
            &["JTDKB20U903000001", "429 001", "1300"],
        ]);
        let processor = TrainProcessor::new();
        let rows = processor.process_phase_1(&shot, &plan(), false).unwrap();
        let report = processor.process_phase_2(&rows);

        assert_eq!(report.wagons[0].mot, "429 001");
        assert_eq!(report.wagons[1].mot, "437 777");
    }

    #[test]
    fn phase_2_groups_by_wagon() {
        let processor = TrainProcessor::new();
        let rows = processor.process_phase_1(&shot_list(), &plan(), false).unwrap();
        let report = processor.process_phase_2(&rows);

        assert_eq!(report.wagons.len(), 2);
        assert_eq!(report.wagons[0].mot, "429 001");
        assert_eq!(report.wagons[0].vehicles, 2);
        assert_eq!(report.wagons[0].weight, 2400.0);
        assert_eq!(report.wagons[0].lf, "10");
        assert_eq!(report.stats.total_cars, 3);
        assert_eq!(report.stats.total_weight, 4100.0);
        assert_eq!(
            report.report_text,
            "2 Wagen mit Toyota Fahrzeuge\nSkupaj/zusammen - 3 vozil, teza 4100 kg"
        );
    }
}
