use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::sheet_models::{FileMetadata, ShareRole, SheetTab, SpreadsheetLayout};

/// Failures reported by the remote spreadsheet/drive services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetsApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("Upstream unreachable: {0}")]
    Network(String),
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("Unexpected upstream response: {0}")]
    Decode(String),
}

impl SheetsApiError {
    /// Classifies a non-success HTTP status from a Google API.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = body.trim().to_string();
        let lowered = body.to_ascii_lowercase();
        match status {
            401 => SheetsApiError::Auth(message),
            // Google reports per-user quota exhaustion as 403 with a reason.
            403 if lowered.contains("ratelimitexceeded")
                || lowered.contains("rate_limit_exceeded") =>
            {
                SheetsApiError::RateLimited(message)
            }
            403 => SheetsApiError::PermissionDenied(message),
            404 => SheetsApiError::NotFound(message),
            429 => SheetsApiError::RateLimited(message),
            _ => SheetsApiError::Upstream { status, message },
        }
    }
}

/// The remote operations the sheets service needs.
///
/// Implemented by the Google client in `infra`, and by in-memory fakes in tests.
#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    /// Creates a spreadsheet with the given tabs and returns its id.
    async fn create_spreadsheet(
        &self,
        title: &str,
        tabs: &[SheetTab],
    ) -> Result<String, SheetsApiError>;

    async fn get_layout(&self, spreadsheet_id: &str) -> Result<SpreadsheetLayout, SheetsApiError>;

    /// Writes rows starting at the top-left cell of `range`.
    async fn write_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsApiError>;

    /// Reads the displayed cell values of `range`. Trailing empty cells and
    /// rows are not returned.
    async fn read_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsApiError>;

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SheetsApiError>;

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: &[Value],
    ) -> Result<(), SheetsApiError>;

    /// Grants `role` to anyone holding the link.
    async fn share_with_anyone(
        &self,
        spreadsheet_id: &str,
        role: ShareRole,
    ) -> Result<(), SheetsApiError>;

    async fn file_metadata(&self, spreadsheet_id: &str) -> Result<FileMetadata, SheetsApiError>;

    async fn delete_file(&self, spreadsheet_id: &str) -> Result<(), SheetsApiError>;

    /// Confirms the configured credentials can obtain an access token.
    async fn verify_credentials(&self) -> Result<(), SheetsApiError>;
}
