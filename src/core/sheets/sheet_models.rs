use chrono_tz::Tz;
use serde::Serialize;
use std::str::FromStr;

/// Placeholder for optional data the registration did not provide.
pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder for cells that could not be produced.
pub const ERROR_CELL: &str = "ERROR";

// Registration-style tabs share one layout:
// row 1 title, row 2 "generated on", row 3 headers, row 4+ data.
pub const TITLE_ROW: usize = 1;
pub const HEADER_ROW: usize = 3;
pub const DATA_START_ROW: usize = 4;

/// Header/row grid for one tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Every row has exactly one cell per header.
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.headers.len())
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Lays the data out as title, subtitle, headers and rows, matching
    /// `TITLE_ROW`, `HEADER_ROW` and `DATA_START_ROW`.
    pub fn to_grid(&self, title: &str, subtitle: &str) -> Vec<Vec<String>> {
        let mut grid = Vec::with_capacity(self.rows.len() + 3);
        grid.push(vec![title.to_string()]);
        grid.push(vec![subtitle.to_string()]);
        grid.push(self.headers.clone());
        grid.extend(self.rows.iter().cloned());
        grid
    }
}

/// What to do with custom field definitions that are missing a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidFieldPolicy {
    /// Discard every invalid definition.
    #[default]
    Drop,
    /// Keep definitions that have an id but no label, under a generated label.
    Placeholder,
}

impl FromStr for InvalidFieldPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "placeholder" => Ok(Self::Placeholder),
            other => Err(format!("unknown invalid field policy '{other}'")),
        }
    }
}

/// Permission granted to "anyone with the link".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareRole {
    Reader,
    Commenter,
    #[default]
    Writer,
}

impl ShareRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ShareRole::Reader => "reader",
            ShareRole::Commenter => "commenter",
            ShareRole::Writer => "writer",
        }
    }
}

impl FromStr for ShareRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reader" | "viewer" => Ok(Self::Reader),
            "commenter" => Ok(Self::Commenter),
            "writer" | "editor" => Ok(Self::Writer),
            other => Err(format!("unknown share role '{other}'")),
        }
    }
}

/// Runtime knobs for sheet generation. Built once in `main`.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// Allow creating a spreadsheet with zero registrations (scaffolding).
    pub allow_empty: bool,
    pub share_role: ShareRole,
    /// Zone used to display registration and attendance timestamps.
    pub time_zone: Tz,
    pub currency_symbol: String,
    pub invalid_field_policy: InvalidFieldPolicy,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            allow_empty: false,
            share_role: ShareRole::Writer,
            time_zone: chrono_tz::Asia::Kolkata,
            currency_symbol: "₹".to_string(),
            invalid_field_policy: InvalidFieldPolicy::Drop,
        }
    }
}

impl SheetsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `SHEETS_*` settings through `lookup`. Unparseable values are
    /// logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            allow_empty: parse_setting(&lookup, "SHEETS_ALLOW_EMPTY", defaults.allow_empty),
            share_role: parse_setting(&lookup, "SHEETS_SHARE_ROLE", defaults.share_role),
            time_zone: parse_setting(&lookup, "SHEETS_TIME_ZONE", defaults.time_zone),
            currency_symbol: lookup("SHEETS_CURRENCY_SYMBOL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.currency_symbol),
            invalid_field_policy: parse_setting(
                &lookup,
                "SHEETS_INVALID_FIELD_POLICY",
                defaults.invalid_field_policy,
            ),
        }
    }
}

fn parse_setting<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, "Ignoring invalid setting, using {:?}", default);
                default
            }
        },
        _ => default,
    }
}

/// The tabs a generated spreadsheet can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetTab {
    Registrations,
    TeamMembers,
    Dashboard,
}

impl SheetTab {
    pub fn title(self) -> &'static str {
        match self {
            SheetTab::Registrations => "Registrations",
            SheetTab::TeamMembers => "Team Members",
            SheetTab::Dashboard => "Dashboard",
        }
    }

    /// Sheet id requested when the tab is created by us.
    pub fn preferred_sheet_id(self) -> i64 {
        match self {
            SheetTab::Registrations => 0,
            SheetTab::TeamMembers => 1,
            SheetTab::Dashboard => 2,
        }
    }

    /// A1 reference to a single cell (or open-ended range) on this tab.
    pub fn range(self, cells: &str) -> String {
        format!("'{}'!{}", self.title(), cells)
    }
}

/// The bits of an existing spreadsheet the update path needs to know about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpreadsheetLayout {
    pub title: String,
    pub tabs: Vec<TabLayout>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabLayout {
    pub title: String,
    pub sheet_id: i64,
    pub banded_range_ids: Vec<i64>,
}

impl SpreadsheetLayout {
    pub fn tab(&self, tab: SheetTab) -> Option<&TabLayout> {
        self.tabs.iter().find(|t| t.title == tab.title())
    }
}

/// Drive metadata for a spreadsheet file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub title: String,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

/// Result of one orchestration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSheet {
    pub spreadsheet_id: String,
    pub shareable_link: String,
    pub title: String,
    pub row_count: usize,
    pub steps: Vec<StepOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedSheet {
    pub spreadsheet_id: String,
    pub shareable_link: String,
    pub row_count: usize,
    pub steps: Vec<StepOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInfo {
    pub title: String,
    pub shareable_link: String,
    pub created_time: Option<String>,
    pub last_modified: Option<String>,
}

/// Deterministic link for a spreadsheet id.
pub fn shareable_link(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{spreadsheet_id}/edit")
}
