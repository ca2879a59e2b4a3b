// =============================================================================
// GOOGLE SHEETS CLIENT
// =============================================================================
//
// `SpreadsheetClient` over the Sheets v4 and Drive v3 REST APIs.
//
// Values are always written with `valueInputOption=RAW`, so a registrant who
// types `=IMPORTXML(...)` into a form field gets that text in the cell, not a
// formula. Formulas the service wants (payment proof links) are sent as
// `updateCells` requests during formatting instead.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use super::service_account::ServiceAccountAuth;
use crate::core::sheets::sheet_models::{FileMetadata, SpreadsheetLayout, TabLayout};
use crate::core::sheets::{ShareRole, SheetTab, SheetsApiError, SpreadsheetClient};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3/files";

const LAYOUT_FIELDS: &str =
    "properties.title,sheets(properties(sheetId,title),bandedRanges(bandedRangeId))";

pub struct GoogleSheetsClient {
    client: Client,
    auth: ServiceAccountAuth,
    sheets_base: String,
    drive_base: String,
}

impl GoogleSheetsClient {
    pub fn new(auth: ServiceAccountAuth) -> Self {
        Self {
            client: Client::new(),
            auth,
            sheets_base: SHEETS_BASE_URL.to_string(),
            drive_base: DRIVE_BASE_URL.to_string(),
        }
    }

    /// Builds `base/segment/...`, percent-encoding each segment. Ranges such
    /// as `'Team Members'!A1` contain characters that need it.
    fn endpoint(base: &str, segments: &[&str]) -> Result<Url, SheetsApiError> {
        let mut url = Url::parse(base).map_err(|e| SheetsApiError::Network(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsApiError::Network(format!("{base} cannot be a base URL")))?
            .extend(segments);
        Ok(url)
    }

    fn sheets_url(&self, segments: &[&str]) -> Result<Url, SheetsApiError> {
        Self::endpoint(&self.sheets_base, segments)
    }

    fn drive_url(&self, segments: &[&str]) -> Result<Url, SheetsApiError> {
        Self::endpoint(&self.drive_base, segments)
    }

    /// Attaches a bearer token, sends, and turns non-2xx replies into errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response, SheetsApiError> {
        let token = self.auth.get_access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SheetsApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "Google API request failed");
        Err(SheetsApiError::from_status(status.as_u16(), &body))
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SheetsApiError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| SheetsApiError::Decode(e.to_string()))
    }
}

fn create_body(title: &str, tabs: &[SheetTab]) -> Value {
    let sheets: Vec<Value> = tabs
        .iter()
        .enumerate()
        .map(|(index, tab)| {
            json!({
                "properties": {
                    "sheetId": tab.preferred_sheet_id(),
                    "title": tab.title(),
                    "index": index,
                }
            })
        })
        .collect();

    json!({
        "properties": {"title": title},
        "sheets": sheets,
    })
}

// =============================================================================
// API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiSpreadsheet {
    #[serde(default)]
    properties: ApiSpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<ApiSheet>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSheet {
    properties: ApiSheetProperties,
    #[serde(default)]
    banded_ranges: Vec<ApiBandedRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSheetProperties {
    // Google omits sheetId for the zero id.
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBandedRange {
    banded_range_id: i64,
}

impl From<ApiSpreadsheet> for SpreadsheetLayout {
    fn from(api: ApiSpreadsheet) -> Self {
        SpreadsheetLayout {
            title: api.properties.title,
            tabs: api
                .sheets
                .into_iter()
                .map(|sheet| TabLayout {
                    title: sheet.properties.title,
                    sheet_id: sheet.properties.sheet_id,
                    banded_range_ids: sheet
                        .banded_ranges
                        .into_iter()
                        .map(|b| b.banded_range_id)
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl ApiValueRange {
    fn into_rows(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFile {
    #[serde(default)]
    name: String,
    created_time: Option<String>,
    modified_time: Option<String>,
}

#[async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    async fn create_spreadsheet(
        &self,
        title: &str,
        tabs: &[SheetTab],
    ) -> Result<String, SheetsApiError> {
        let url = self.sheets_url(&[])?;
        let created: CreatedSpreadsheet = self
            .send_json(self.client.post(url).json(&create_body(title, tabs)))
            .await?;
        Ok(created.spreadsheet_id)
    }

    async fn get_layout(&self, spreadsheet_id: &str) -> Result<SpreadsheetLayout, SheetsApiError> {
        let url = self.sheets_url(&[spreadsheet_id])?;
        let api: ApiSpreadsheet = self
            .send_json(self.client.get(url).query(&[("fields", LAYOUT_FIELDS)]))
            .await?;
        Ok(api.into())
    }

    async fn write_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsApiError> {
        let url = self.sheets_url(&[spreadsheet_id, "values", range])?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        self.send(
            self.client
                .put(url)
                .query(&[("valueInputOption", "RAW")])
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn read_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsApiError> {
        let url = self.sheets_url(&[spreadsheet_id, "values", range])?;
        let api: ApiValueRange = self
            .send_json(self.client.get(url).query(&[("majorDimension", "ROWS")]))
            .await?;
        Ok(api.into_rows())
    }

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SheetsApiError> {
        let action = format!("{range}:clear");
        let url = self.sheets_url(&[spreadsheet_id, "values", action.as_str()])?;
        self.send(self.client.post(url).json(&json!({}))).await?;
        Ok(())
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: &[Value],
    ) -> Result<(), SheetsApiError> {
        let action = format!("{spreadsheet_id}:batchUpdate");
        let url = self.sheets_url(&[action.as_str()])?;
        self.send(self.client.post(url).json(&json!({"requests": requests})))
            .await?;
        Ok(())
    }

    async fn share_with_anyone(
        &self,
        spreadsheet_id: &str,
        role: ShareRole,
    ) -> Result<(), SheetsApiError> {
        let url = self.drive_url(&[spreadsheet_id, "permissions"])?;
        let body = json!({"type": "anyone", "role": role.as_str()});
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn file_metadata(&self, spreadsheet_id: &str) -> Result<FileMetadata, SheetsApiError> {
        let url = self.drive_url(&[spreadsheet_id])?;
        let file: ApiFile = self
            .send_json(
                self.client
                    .get(url)
                    .query(&[("fields", "name,createdTime,modifiedTime")]),
            )
            .await?;
        Ok(FileMetadata {
            title: file.name,
            created_time: file.created_time,
            modified_time: file.modified_time,
        })
    }

    async fn delete_file(&self, spreadsheet_id: &str) -> Result<(), SheetsApiError> {
        let url = self.drive_url(&[spreadsheet_id])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn verify_credentials(&self) -> Result<(), SheetsApiError> {
        self.auth.get_access_token().await.map(|_| ())
    }
}
