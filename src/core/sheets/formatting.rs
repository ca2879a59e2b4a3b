// =============================================================================
// SHEETS FORMATTING REQUESTS
// =============================================================================
//
// Builders for Sheets API `batchUpdate` request objects. Nothing here is
// sent anywhere; the orchestrator groups these into `FormatGroup`s and
// submits each group as its own call so one rejected request (for example a
// banding that overlaps an existing one) only loses that group.
//
// All row/column indices are zero-based with an exclusive end, as the
// Sheets API expects in a GridRange.

use serde_json::{json, Value};

use super::cell_format::{hyperlink_formula, is_link};
use super::dashboard::DashboardLayout;
use super::sheet_data_builder::PAYMENT_PROOF_HEADER;
use super::sheet_models::{SheetData, SheetTab, DATA_START_ROW, HEADER_ROW, TITLE_ROW};

const TITLE_ROW_INDEX: usize = TITLE_ROW - 1;
const HEADER_ROW_INDEX: usize = HEADER_ROW - 1;
const DATA_ROW_INDEX: usize = DATA_START_ROW - 1;

/// One batchUpdate call worth of requests.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatGroup {
    pub name: &'static str,
    pub requests: Vec<Value>,
}

fn color(red: f64, green: f64, blue: f64) -> Value {
    json!({"red": red, "green": green, "blue": blue})
}

fn header_background() -> Value {
    color(0.26, 0.52, 0.96)
}

fn band_light() -> Value {
    color(1.0, 1.0, 1.0)
}

fn band_tinted() -> Value {
    color(0.91, 0.94, 0.99)
}

fn link_blue() -> Value {
    color(0.07, 0.33, 0.8)
}

fn grid_range(sheet_id: i64, rows: (usize, usize), columns: (usize, usize)) -> Value {
    json!({
        "sheetId": sheet_id,
        "startRowIndex": rows.0,
        "endRowIndex": rows.1,
        "startColumnIndex": columns.0,
        "endColumnIndex": columns.1,
    })
}

pub fn add_sheet(tab: SheetTab) -> Value {
    json!({
        "addSheet": {
            "properties": {
                "sheetId": tab.preferred_sheet_id(),
                "title": tab.title(),
            }
        }
    })
}

pub fn freeze_rows(sheet_id: i64, rows: usize) -> Value {
    json!({
        "updateSheetProperties": {
            "properties": {
                "sheetId": sheet_id,
                "gridProperties": {"frozenRowCount": rows},
            },
            "fields": "gridProperties.frozenRowCount",
        }
    })
}

pub fn merge_title(sheet_id: i64, columns: usize) -> Value {
    json!({
        "mergeCells": {
            "range": grid_range(sheet_id, (TITLE_ROW_INDEX, TITLE_ROW_INDEX + 1), (0, columns)),
            "mergeType": "MERGE_ALL",
        }
    })
}

pub fn title_style(sheet_id: i64, columns: usize) -> Value {
    json!({
        "repeatCell": {
            "range": grid_range(sheet_id, (TITLE_ROW_INDEX, TITLE_ROW_INDEX + 1), (0, columns)),
            "cell": {
                "userEnteredFormat": {
                    "horizontalAlignment": "CENTER",
                    "textFormat": {"bold": true, "fontSize": 14},
                }
            },
            "fields": "userEnteredFormat(horizontalAlignment,textFormat)",
        }
    })
}

/// Bold white text on the header colour for one row.
pub fn heading_style(sheet_id: i64, row_index: usize, columns: usize) -> Value {
    json!({
        "repeatCell": {
            "range": grid_range(sheet_id, (row_index, row_index + 1), (0, columns)),
            "cell": {
                "userEnteredFormat": {
                    "backgroundColor": header_background(),
                    "horizontalAlignment": "CENTER",
                    "textFormat": {
                        "bold": true,
                        "foregroundColor": color(1.0, 1.0, 1.0),
                    },
                }
            },
            "fields": "userEnteredFormat(backgroundColor,horizontalAlignment,textFormat)",
        }
    })
}

/// Alternating row colours from the header row through the last data row.
pub fn add_banding(sheet_id: i64, data_rows: usize, columns: usize) -> Value {
    json!({
        "addBanding": {
            "bandedRange": {
                "range": grid_range(
                    sheet_id,
                    (HEADER_ROW_INDEX, DATA_ROW_INDEX + data_rows),
                    (0, columns),
                ),
                "rowProperties": {
                    "headerColor": header_background(),
                    "firstBandColor": band_light(),
                    "secondBandColor": band_tinted(),
                },
            }
        }
    })
}

pub fn delete_banding(banded_range_id: i64) -> Value {
    json!({"deleteBanding": {"bandedRangeId": banded_range_id}})
}

pub fn column_width(sheet_id: i64, column: usize, pixels: u32) -> Value {
    json!({
        "updateDimensionProperties": {
            "range": {
                "sheetId": sheet_id,
                "dimension": "COLUMNS",
                "startIndex": column,
                "endIndex": column + 1,
            },
            "properties": {"pixelSize": pixels},
            "fields": "pixelSize",
        }
    })
}

/// Replaces a plain URL cell with a clickable, underlined link.
pub fn link_cell(sheet_id: i64, row_index: usize, column_index: usize, url: &str) -> Value {
    json!({
        "updateCells": {
            "start": {
                "sheetId": sheet_id,
                "rowIndex": row_index,
                "columnIndex": column_index,
            },
            "rows": [{
                "values": [{
                    "userEnteredValue": {"formulaValue": hyperlink_formula(url, "View Proof")},
                    "userEnteredFormat": {
                        "textFormat": {"underline": true, "foregroundColor": link_blue()},
                    },
                }]
            }],
            "fields": "userEnteredValue,userEnteredFormat.textFormat",
        }
    })
}

/// Column width by header. Wide for free text, narrow for counters.
pub fn suggested_width(header: &str) -> u32 {
    match header {
        "S.No" | "Team #" => 60,
        "Email" => 240,
        "Name" | "Team Name" | "Notes" => 200,
        "Registration Date" | "Attendance Time" => 180,
        "Year" | "Role" => 90,
        _ => 140,
    }
}

fn column_widths(sheet_id: i64, data: &SheetData) -> Vec<Value> {
    data.headers
        .iter()
        .enumerate()
        .map(|(column, header)| column_width(sheet_id, column, suggested_width(header)))
        .collect()
}

fn payment_links(sheet_id: i64, data: &SheetData) -> Vec<Value> {
    let Some(column) = data.column_index(PAYMENT_PROOF_HEADER) else {
        return Vec::new();
    };

    data.rows
        .iter()
        .enumerate()
        .filter_map(|(offset, row)| {
            row.get(column)
                .filter(|cell| is_link(cell))
                .map(|url| link_cell(sheet_id, DATA_ROW_INDEX + offset, column, url))
        })
        .collect()
}

/// Groups that only depend on the data region. Used on create and refresh.
fn data_region_groups(sheet_id: i64, data: &SheetData, stale_bandings: &[i64]) -> Vec<FormatGroup> {
    let mut banding: Vec<Value> = stale_bandings.iter().map(|id| delete_banding(*id)).collect();
    banding.push(add_banding(sheet_id, data.row_count(), data.column_count()));

    let mut groups = vec![
        FormatGroup {
            name: "banding",
            requests: banding,
        },
        FormatGroup {
            name: "column_widths",
            requests: column_widths(sheet_id, data),
        },
    ];

    let links = payment_links(sheet_id, data);
    if !links.is_empty() {
        groups.push(FormatGroup {
            name: "payment_links",
            requests: links,
        });
    }
    groups
}

/// Styles the header row. Also used when an update rewrites the headers.
pub fn header_format(sheet_id: i64, data: &SheetData) -> FormatGroup {
    FormatGroup {
        name: "header",
        requests: vec![heading_style(sheet_id, HEADER_ROW_INDEX, data.column_count().max(1))],
    }
}

/// Full formatting for a freshly written title/header/rows tab.
pub fn tabular_format(sheet_id: i64, data: &SheetData) -> Vec<FormatGroup> {
    let columns = data.column_count().max(1);

    let mut title = Vec::new();
    if columns > 1 {
        title.push(merge_title(sheet_id, columns));
    }
    title.push(title_style(sheet_id, columns));

    let mut groups = vec![
        FormatGroup {
            name: "freeze_header",
            requests: vec![freeze_rows(sheet_id, HEADER_ROW)],
        },
        FormatGroup {
            name: "title",
            requests: title,
        },
        header_format(sheet_id, data),
    ];
    groups.extend(data_region_groups(sheet_id, data, &[]));
    groups
}

/// Re-applies data-region formatting after the rows were rewritten. Old
/// bandings are removed first because Sheets rejects overlapping ones.
pub fn refresh_tabular_format(
    sheet_id: i64,
    data: &SheetData,
    stale_bandings: &[i64],
) -> Vec<FormatGroup> {
    data_region_groups(sheet_id, data, stale_bandings)
}

/// Unmerges everything and drops cell formats on a whole tab, so a tab whose
/// rows moved can be styled from scratch.
pub fn reset_format(sheet_id: i64) -> FormatGroup {
    FormatGroup {
        name: "reset",
        requests: vec![
            json!({"unmergeCells": {"range": {"sheetId": sheet_id}}}),
            json!({
                "repeatCell": {
                    "range": {"sheetId": sheet_id},
                    "cell": {"userEnteredFormat": {}},
                    "fields": "userEnteredFormat",
                }
            }),
        ],
    }
}

pub fn dashboard_format(sheet_id: i64, layout: &DashboardLayout) -> Vec<FormatGroup> {
    let sections = layout
        .section_rows
        .iter()
        .map(|row| heading_style(sheet_id, *row, 2))
        .collect();

    vec![
        FormatGroup {
            name: "title",
            requests: vec![merge_title(sheet_id, 2), title_style(sheet_id, 2)],
        },
        FormatGroup {
            name: "sections",
            requests: sections,
        },
        FormatGroup {
            name: "column_widths",
            requests: vec![column_width(sheet_id, 0, 240), column_width(sheet_id, 1, 120)],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(headers: &[&str], rows: Vec<Vec<&str>>) -> SheetData {
        SheetData {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        }
    }

    fn group<'a>(groups: &'a [FormatGroup], name: &str) -> Option<&'a FormatGroup> {
        groups.iter().find(|g| g.name == name)
    }

    #[test]
    fn test_banding_covers_header_and_data_rows() {
        let request = add_banding(7, 5, 3);
        let range = &request["addBanding"]["bandedRange"]["range"];

        assert_eq!(range["sheetId"], 7);
        assert_eq!(range["startRowIndex"], 2);
        assert_eq!(range["endRowIndex"], 8);
        assert_eq!(range["endColumnIndex"], 3);
    }

    #[test]
    fn test_tabular_format_groups() {
        let sheet = data(&["S.No", "Name"], vec![vec!["1", "Asha"]]);
        let groups = tabular_format(0, &sheet);
        let names: Vec<_> = groups.iter().map(|g| g.name).collect();

        assert_eq!(
            names,
            vec!["freeze_header", "title", "header", "banding", "column_widths"]
        );
        let freeze = &group(&groups, "freeze_header").unwrap().requests[0];
        assert_eq!(
            freeze["updateSheetProperties"]["properties"]["gridProperties"]["frozenRowCount"],
            3
        );
        assert_eq!(group(&groups, "column_widths").unwrap().requests.len(), 2);
    }

    #[test]
    fn test_payment_links_only_for_urls() {
        let sheet = data(
            &["S.No", "Payment Proof", "Notes"],
            vec![
                vec!["1", "https://cdn.example.com/a.png", ""],
                vec!["2", "N/A", ""],
                vec!["3", "http://cdn.example.com/b.png", ""],
            ],
        );
        let groups = tabular_format(0, &sheet);
        let links = &group(&groups, "payment_links").unwrap().requests;

        assert_eq!(links.len(), 2);
        let start = &links[1]["updateCells"]["start"];
        assert_eq!(start["rowIndex"], 5);
        assert_eq!(start["columnIndex"], 1);
        let formula = links[0]["updateCells"]["rows"][0]["values"][0]["userEnteredValue"]
            ["formulaValue"]
            .as_str()
            .unwrap();
        assert!(formula.starts_with("=HYPERLINK(\"https://cdn.example.com/a.png\""));
    }

    #[test]
    fn test_refresh_deletes_stale_bandings_first() {
        let sheet = data(&["S.No"], vec![vec!["1"], vec!["2"]]);
        let groups = refresh_tabular_format(4, &sheet, &[11, 12]);
        let banding = &group(&groups, "banding").unwrap().requests;

        assert_eq!(banding.len(), 3);
        assert_eq!(banding[0]["deleteBanding"]["bandedRangeId"], 11);
        assert_eq!(banding[1]["deleteBanding"]["bandedRangeId"], 12);
        assert_eq!(banding[2]["addBanding"]["bandedRange"]["range"]["endRowIndex"], 5);
        assert!(group(&groups, "title").is_none());
    }

    #[test]
    fn test_single_column_title_is_not_merged() {
        let sheet = data(&["Only"], vec![]);
        let groups = tabular_format(0, &sheet);
        let title = &group(&groups, "title").unwrap().requests;

        assert_eq!(title.len(), 1);
        assert!(title[0].get("repeatCell").is_some());
    }

    #[test]
    fn test_dashboard_sections_are_styled() {
        let layout = DashboardLayout {
            rows: vec![],
            section_rows: vec![3, 10],
        };
        let groups = dashboard_format(2, &layout);
        let sections = &group(&groups, "sections").unwrap().requests;

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1]["repeatCell"]["range"]["startRowIndex"], 10);
    }
}
