pub mod cell_format;
pub mod dashboard;
pub mod formatting;
pub mod sheet_data_builder;
pub mod sheet_models;
pub mod sheets_client;
pub mod sheets_service;
pub mod team_roster;

pub use sheet_models::{ShareRole, SheetTab, SheetsConfig};
pub use sheets_client::{SheetsApiError, SpreadsheetClient};
pub use sheets_service::{SheetsError, SheetsService};
