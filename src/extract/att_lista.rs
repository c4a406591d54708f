use std::collections::{BTreeMap, HashMap, HashSet};

use log::warn;
use regex::Regex;
use rust_xlsxwriter::{Format, FormatAlign, Workbook};

use super::ExtractError;

/// Port codes used by the stock exports, mapped to the destination names
/// the customs office expects on the attached list.
const DESTINATIONS: &[(&str, &str)] = &[
    ("EGYAG", "ALEXANDRIA (EGIPT)"),
    ("AZEMQ", "AZERBAIJAN"),
    ("CYPEY", "LIMASSOL (CIPER)"),
    ("GEODB", "GEORGIA"),
    ("CYPXP", "LIMASSOL (CIPER)"),
    ("CYPEZ", "NORTH CYPRUS"),
    ("GRCGR", "PIRAEUS (GRČIJA)"),
    ("GRCDP", "PIRAEUS (GRČIJA)"),
    ("ILASH", "HAIFA"),
    ("ILHFA", "HAIFA"),
    ("ILPAL", "PALESTINA (HAIFA)"),
    ("LBNLJ", "BEIRUT"),
    ("MTSGW", "LA VALLETTA (MALTA)"),
    ("TNTUN", "LA GOULLETE (TUNISIJA)"),
    ("TREYP", "EFESAN (TURČIJA)"),
    ("LIMA", "LIMASSOL (CIPER)"),
    ("PIRE", "PIRAEUS (GRČIJA)"),
];

const CHUNK_SIZE: usize = 99;
const MAX_SHEET_NAME: usize = 31;

/// The two stock-export layouts this tool understands. They differ in the
/// chassis/invoice/description column names and in where the HS code
/// comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brand {
    Volkswagen,
    Toyota,
}

impl Brand {
    fn all_sheet_name(&self) -> &'static str {
        match self {
            Brand::Volkswagen => "ALL VW",
            Brand::Toyota => "ALL TOYOTA",
        }
    }
}

/// One vehicle on the attached list.
#[derive(Debug, Clone)]
pub struct AttRow {
    pub vin: String,
    pub invoice: String,
    pub description: String,
    pub weight: i64,
    pub destination: String,
    pub hs_code: String,
}

#[derive(Debug, Clone)]
pub struct GoodItem {
    pub hs_code: String,
    pub count: usize,
    pub total_weight: i64,
}

#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub index: usize,
    pub diz_full: String,
}

/// Everything needed to render one attached-list workbook.
#[derive(Debug, Clone)]
pub struct AttListaPack {
    pub brand: Brand,
    pub rows: Vec<AttRow>,
    pub good_items: Vec<GoodItem>,
    pub documents: Vec<DocumentRow>,
    pub swb_no: String,
    pub main_dest: String,
}

/// Builds the T2L attached list for a sea waybill from a brand stock
/// export plus the operator's chassis and DIZ lists.
pub struct AttListaBuilder {
    destinations: HashMap<&'static str, &'static str>,
    paren_re: Regex,
    non_alnum_re: Regex,
}

impl AttListaBuilder {
    pub fn new() -> Self {
        AttListaBuilder {
            destinations: DESTINATIONS.iter().copied().collect(),
            paren_re: Regex::new(r"\s*\(.*?\)\s*").unwrap(),
            non_alnum_re: Regex::new(r"[^a-zA-Z0-9]").unwrap(),
        }
    }

    /// "ALEXANDRIA (EGIPT)" becomes "ALEXANDRIA".
    fn clean_destination(&self, name: &str) -> String {
        self.paren_re.replace_all(name, "").trim().to_string()
    }

    /// Strips the HS code to alphanumerics and truncates fully numeric
    /// codes to the 6-digit tariff heading.
    fn clean_hs_code(&self, code: &str, default: &str) -> String {
        let code = code.trim();
        if code.is_empty() {
            return default.to_string();
        }
        let clean = self.non_alnum_re.replace_all(code, "").to_string();
        if clean.len() >= 6 && clean.chars().all(|c| c.is_ascii_digit()) {
            clean[..6].to_string()
        } else {
            clean
        }
    }

    /// Joins the stock CSV against the operator's chassis list and shapes
    /// the rows, good-item summary and document rows for the workbook.
    pub fn load_and_process(
        &self,
        brand: Brand,
        csv_text: &str,
        chassis_list: &[String],
        diz_list: &[String],
        swb_no: &str,
        manual_hs_codes: &HashMap<String, String>,
    ) -> Result<AttListaPack, ExtractError> {
        let mut lines = csv_text.lines();
        let header_line = lines
            .next()
            .ok_or_else(|| ExtractError::new("Stock file is empty"))?;
        // VW exports use semicolons, some come comma-separated
        let delimiter = if header_line.contains(';') { ';' } else { ',' };

        let headers: Vec<String> = header_line
            .split(delimiter)
            .map(|c| c.trim().to_uppercase())
            .collect();

        let mut chassis_col = None;
        let mut dest_col = None;
        let mut invoice_col = None;
        let mut desc_col = None;
        let mut weight_col = None;
        let mut hs_col = None;
        for (i, h) in headers.iter().enumerate() {
            match brand {
                Brand::Volkswagen => {
                    if h.contains("CHASSIS") && chassis_col.is_none() {
                        chassis_col = Some(i);
                    } else if h.contains("DESTINATION") && dest_col.is_none() {
                        dest_col = Some(i);
                    } else if h.contains("INVOICE") && invoice_col.is_none() {
                        invoice_col = Some(i);
                    } else if h.contains("DESCRIPTION")
                        && !h.contains("DAMAGE")
                        && desc_col.is_none()
                    {
                        desc_col = Some(i);
                    } else if h.contains("WEIGHT") && weight_col.is_none() {
                        weight_col = Some(i);
                    } else if (h.contains("HS-CODE") || h.contains("HS CODE")) && hs_col.is_none() {
                        hs_col = Some(i);
                    }
                }
                Brand::Toyota => {
                    if h.contains("VIN") && chassis_col.is_none() {
                        chassis_col = Some(i);
                    } else if h.contains("DESTINATION") && dest_col.is_none() {
                        dest_col = Some(i);
                    } else if h.contains("DVH") && invoice_col.is_none() {
                        // Toyota stock lists carry the DVH number as invoice
                        invoice_col = Some(i);
                    } else if h.contains("MODEL") && desc_col.is_none() {
                        desc_col = Some(i);
                    } else if h.contains("WEIGHT") && weight_col.is_none() {
                        weight_col = Some(i);
                    }
                }
            }
        }
        let chassis_col = chassis_col
            .ok_or_else(|| ExtractError::new("Stock file has no CHASSIS/VIN column"))?;

        let wanted: HashSet<String> = chassis_list
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        let mut rows = Vec::new();
        let mut found: HashSet<String> = HashSet::new();
        for line in lines {
            let cells: Vec<&str> = line.split(delimiter).map(|c| c.trim()).collect();
            let vin = match cells.get(chassis_col) {
                Some(v) if wanted.contains(*v) => v.to_string(),
                _ => continue,
            };
            found.insert(vin.clone());

            let get = |col: Option<usize>| -> String {
                col.and_then(|c| cells.get(c)).map(|v| v.to_string()).unwrap_or_default()
            };

            let raw_dest = get(dest_col);
            let mapped = self
                .destinations
                .get(raw_dest.as_str())
                .map(|d| d.to_string())
                .unwrap_or(raw_dest);
            let destination = self.clean_destination(&mapped);

            let weight = get(weight_col)
                .replace(',', ".")
                .parse::<f64>()
                .map(|w| w as i64)
                .unwrap_or(0);

            let hs_code = match brand {
                Brand::Volkswagen => self.clean_hs_code(&get(hs_col), "UNKNOWN"),
                // Manual entry wins, brand name otherwise
                Brand::Toyota => manual_hs_codes
                    .get(&vin)
                    .map(|hs| self.clean_hs_code(hs, "TOYOTA"))
                    .unwrap_or_else(|| "TOYOTA".to_string()),
            };

            rows.push(AttRow {
                vin,
                invoice: get(invoice_col),
                description: get(desc_col),
                weight,
                destination,
                hs_code,
            });
        }

        for missing in wanted.difference(&found) {
            warn!("Chassis {} not found in the stock file", missing);
        }
        if rows.is_empty() {
            return Err(ExtractError::new("No vehicles matched the stock file"));
        }

        let mut grouped: BTreeMap<String, (usize, i64)> = BTreeMap::new();
        for row in &rows {
            let entry = grouped.entry(row.hs_code.clone()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += row.weight;
        }
        let good_items = grouped
            .into_iter()
            .map(|(hs_code, (count, total_weight))| GoodItem {
                hs_code,
                count,
                total_weight,
            })
            .collect();

        let clean_diz: Vec<String> = diz_list
            .iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        let documents = (0..clean_diz.len().max(1))
            .map(|i| DocumentRow {
                index: i + 1,
                diz_full: clean_diz
                    .get(i)
                    .map(|d| format!("DIZ {}", d))
                    .unwrap_or_default(),
            })
            .collect();

        let main_dest = rows
            .first()
            .map(|r| r.destination.clone())
            .unwrap_or_else(|| "EXPORT".to_string());

        Ok(AttListaPack {
            brand,
            rows,
            good_items,
            documents,
            swb_no: swb_no.to_string(),
            main_dest,
        })
    }

    /// Renders the workbook: the full list, one sheet per HS chunk of at
    /// most 99 vehicles, and the good-items/packaging/documents summaries.
    pub fn export_to_excel(&self, pack: &AttListaPack) -> Result<Vec<u8>, ExtractError> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let header = Format::new()
            .set_bold()
            .set_background_color(0x00CC_FFCC)
            .set_border(rust_xlsxwriter::FormatBorder::Thin)
            .set_align(FormatAlign::Center);

        // Full list
        let ws_all = workbook.add_worksheet().set_name(pack.brand.all_sheet_name())?;
        ws_all.write_with_format(
            1,
            1,
            format!("ATTACHED LIST SWB NO.: {}", pack.swb_no),
            &bold,
        )?;
        ws_all.write_with_format(1, 2, "T2L", &header)?;

        let headers = [
            "", "VINS:", "Invoices nos.:", "DESCRIPTION", "WEIGHT", "DESTINATION", "HS CODE",
        ];
        for (c, h) in headers.iter().enumerate() {
            ws_all.write_with_format(2, c as u16, *h, &bold)?;
        }

        let mut total_weight = 0i64;
        for (i, row) in pack.rows.iter().enumerate() {
            let r = (i + 3) as u32;
            total_weight += row.weight;
            ws_all.write(r, 0, (i + 1) as u32)?;
            ws_all.write(r, 1, &row.vin)?;
            ws_all.write(r, 2, &row.invoice)?;
            ws_all.write(r, 3, &row.description)?;
            ws_all.write(r, 4, row.weight as f64)?;
            ws_all.write(r, 5, &row.destination)?;
            ws_all.write(r, 6, &row.hs_code)?;
        }
        ws_all.write_with_format((pack.rows.len() + 3) as u32, 4, total_weight as f64, &bold)?;
        ws_all.set_column_width(0, 5)?;
        for col in 1..=6u16 {
            ws_all.set_column_width(col, 20)?;
        }

        // One sheet per HS chunk
        let mut hs_codes: Vec<String> = pack
            .good_items
            .iter()
            .map(|g| g.hs_code.clone())
            .collect();
        hs_codes.sort();
        let mut sheet_names: HashMap<String, usize> = HashMap::new();

        for hs in &hs_codes {
            let vehicles: Vec<&AttRow> =
                pack.rows.iter().filter(|r| &r.hs_code == hs).collect();
            for chunk in vehicles.chunks(CHUNK_SIZE) {
                let base_name = format!("{}x {}", chunk.len(), hs);
                let counter = sheet_names.entry(base_name.clone()).or_insert(0);
                *counter += 1;
                let sheet_name = if *counter > 1 {
                    format!("{} ({})", base_name, counter)
                } else {
                    base_name
                };
                let sheet_name: String = sheet_name.chars().take(MAX_SHEET_NAME).collect();

                let ws = workbook.add_worksheet().set_name(&sheet_name)?;
                let sub_headers =
                    ["CHASSIS", "INVOICE", "DESCRIPTION", "WEIGHT", "DESTINATION", "HS CODE"];
                for (c, h) in sub_headers.iter().enumerate() {
                    ws.write_with_format(0, c as u16, *h, &bold)?;
                }
                let mut chunk_weight = 0i64;
                for (i, row) in chunk.iter().enumerate() {
                    let r = (i + 1) as u32;
                    chunk_weight += row.weight;
                    ws.write(r, 0, &row.vin)?;
                    ws.write(r, 1, &row.invoice)?;
                    ws.write(r, 2, &row.description)?;
                    ws.write(r, 3, row.weight as f64)?;
                    ws.write(r, 4, &row.destination)?;
                    ws.write(r, 5, &row.hs_code)?;
                }
                ws.write_with_format((chunk.len() + 1) as u32, 3, chunk_weight as f64, &bold)?;
                for col in 0..=5u16 {
                    ws.set_column_width(col, 20)?;
                }
            }
        }

        // Summary tabs
        let ws_goods = workbook.add_worksheet().set_name("Good Items")?;
        for (c, h) in ["HS CODE", "COUNT", "TOTAL WEIGHT", "DESCRIPTION"].iter().enumerate() {
            ws_goods.write_with_format(0, c as u16, *h, &bold)?;
        }
        for (i, item) in pack.good_items.iter().enumerate() {
            let r = (i + 1) as u32;
            ws_goods.write(r, 0, &item.hs_code)?;
            ws_goods.write(r, 1, item.count as u32)?;
            ws_goods.write(r, 2, item.total_weight as f64)?;
            ws_goods.write(r, 3, "NEW VEHICLES")?;
        }

        let ws_pack = workbook.add_worksheet().set_name("Packaging")?;
        for (c, h) in ["NO.", "VIN", "TYPE", "QTY"].iter().enumerate() {
            ws_pack.write_with_format(0, c as u16, *h, &bold)?;
        }
        for (i, row) in pack.rows.iter().enumerate() {
            let r = (i + 1) as u32;
            ws_pack.write(r, 0, (i + 1) as u32)?;
            ws_pack.write(r, 1, &row.vin)?;
            ws_pack.write(r, 2, "VN - Vehicle")?;
            ws_pack.write(r, 3, 1u32)?;
        }

        let ws_docs = workbook.add_worksheet().set_name("Documents")?;
        for (c, h) in ["NO.", "TYPE", "REFERENCE"].iter().enumerate() {
            ws_docs.write_with_format(0, c as u16, *h, &bold)?;
        }
        for doc in &pack.documents {
            let r = doc.index as u32;
            ws_docs.write(r, 0, doc.index as u32)?;
            ws_docs.write(r, 1, "Supporting Document")?;
            ws_docs.write(r, 2, &doc.diz_full)?;
        }

        Ok(workbook.save_to_buffer()?)
    }
}

impl Default for AttListaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VW_CSV: &str = "\
CHASSIS NO;DESTINATION;INVOICE;DESCRIPTION;WEIGHT;HS-CODE
WVWZZZ1JZXW000001;EGYAG;INV001;GOLF;1450,00;8703.21.10
WVWZZZ1JZXW000002;GRCGR;INV002;PASSAT;1520;87032110
WVWZZZ1JZXW000003;EGYAG;INV003;TIGUAN;1600;";

    const TOYOTA_CSV: &str = "\
VIN;DESTINATION;DVH NO;MODEL;WEIGHT
JTDKB20U903000001;ILHFA;DVH100;COROLLA;1300
JTDKB20U903000002;ILHFA;DVH101;YARIS;1100";

    fn chassis(vins: &[&str]) -> Vec<String> {
        vins.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn vw_rows_map_destination_and_truncate_hs() {
        let builder = AttListaBuilder::new();
        let pack = builder
            .load_and_process(
                Brand::Volkswagen,
                VW_CSV,
                &chassis(&["WVWZZZ1JZXW000001", "WVWZZZ1JZXW000002"]),
                &[],
                "SWB-1",
                &HashMap::new(),
            )
            .unwrap();

        assert_eq!(pack.rows.len(), 2);
        assert_eq!(pack.rows[0].destination, "ALEXANDRIA");
        assert_eq!(pack.rows[0].hs_code, "870321");
        assert_eq!(pack.rows[1].destination, "PIRAEUS");
        assert_eq!(pack.rows[1].weight, 1520);
        assert_eq!(pack.main_dest, "ALEXANDRIA");
    }

    #[test]
    fn vw_missing_hs_code_defaults_to_unknown() {
        let builder = AttListaBuilder::new();
        let pack = builder
            .load_and_process(
                Brand::Volkswagen,
                VW_CSV,
                &chassis(&["WVWZZZ1JZXW000003"]),
                &[],
                "SWB-1",
                &HashMap::new(),
            )
            .unwrap();
        assert_eq!(pack.rows[0].hs_code, "UNKNOWN");
    }

    #[test]
    fn toyota_uses_dvh_as_invoice_and_manual_hs() {
        let builder = AttListaBuilder::new();
        let mut manual = HashMap::new();
        manual.insert("JTDKB20U903000001".to_string(), "8703.22.90".to_string());

        let pack = builder
            .load_and_process(
                Brand::Toyota,
                TOYOTA_CSV,
                &chassis(&["JTDKB20U903000001", "JTDKB20U903000002"]),
                &["123456".to_string()],
                "SWB-2",
                &manual,
            )
            .unwrap();

        assert_eq!(pack.rows[0].invoice, "DVH100");
        assert_eq!(pack.rows[0].description, "COROLLA");
        assert_eq!(pack.rows[0].hs_code, "870322");
        assert_eq!(pack.rows[1].hs_code, "TOYOTA");
        assert_eq!(pack.documents.len(), 1);
        assert_eq!(pack.documents[0].diz_full, "DIZ 123456");
    }

    #[test]
    fn good_items_group_by_hs_code() {
        let builder = AttListaBuilder::new();
        let pack = builder
            .load_and_process(
                Brand::Volkswagen,
                VW_CSV,
                &chassis(&[
                    "WVWZZZ1JZXW000001",
                    "WVWZZZ1JZXW000002",
                    "WVWZZZ1JZXW000003",
                ]),
                &[],
                "SWB-1",
                &HashMap::new(),
            )
            .unwrap();
        assert_eq!(pack.good_items.len(), 2);
        let heading = pack.good_items.iter().find(|g| g.hs_code == "870321").unwrap();
        assert_eq!(heading.count, 2);
        assert_eq!(heading.total_weight, 1450 + 1520);
    }

    #[test]
    fn no_matching_vehicles_is_an_error() {
        let builder = AttListaBuilder::new();
        let result = builder.load_and_process(
            Brand::Volkswagen,
            VW_CSV,
            &chassis(&["NOPE"]),
            &[],
            "SWB-1",
            &HashMap::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn documents_always_have_at_least_one_row() {
        let builder = AttListaBuilder::new();
        let pack = builder
            .load_and_process(
                Brand::Volkswagen,
                VW_CSV,
                &chassis(&["WVWZZZ1JZXW000001"]),
                &[],
                "SWB-1",
                &HashMap::new(),
            )
            .unwrap();
        assert_eq!(pack.documents.len(), 1);
        assert_eq!(pack.documents[0].diz_full, "");
    }

    #[test]
    fn export_writes_all_sheets() {
        let builder = AttListaBuilder::new();
        let pack = builder
            .load_and_process(
                Brand::Toyota,
                TOYOTA_CSV,
                &chassis(&["JTDKB20U903000001"]),
                &[],
                "SWB-2",
                &HashMap::new(),
            )
            .unwrap();
        let bytes = builder.export_to_excel(&pack).unwrap();
        assert!(!bytes.is_empty());
    }
}
