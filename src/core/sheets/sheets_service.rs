// =============================================================================
// SHEETS SERVICE
// =============================================================================
//
// Sequences the remote calls that turn an event's registrations into a
// formatted spreadsheet.
//
// Failure policy:
// - input validation, the dry run and the creation call are fatal
// - everything after creation (populating tabs, formatting, sharing) is a
//   separate step whose failure is logged and recorded as a `StepOutcome`
//
// The caller always gets the spreadsheet link back once creation succeeded,
// together with the list of steps that did not.

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::dashboard::summarize;
use super::formatting::{
    add_sheet, dashboard_format, header_format, refresh_tabular_format, reset_format,
    tabular_format, FormatGroup,
};
use super::sheet_data_builder::SheetDataBuilder;
use super::sheet_models::{
    shareable_link, CreatedSheet, SheetData, SheetInfo, SheetTab, SheetsConfig, StepOutcome,
    TabLayout, UpdatedSheet, DATA_START_ROW, HEADER_ROW,
};
use super::sheets_client::{SheetsApiError, SpreadsheetClient};
use super::team_roster::{build_team_roster, is_team_registration};
use crate::core::registrations::registration_models::ParsedBatch;
use crate::core::registrations::{
    validate_custom_fields, EventDescriptor, Registration, ValidationIssue,
};

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Validation failed with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),
    #[error(transparent)]
    Api(#[from] SheetsApiError),
}

impl SheetsError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        SheetsError::Validation(vec![ValidationIssue::new(field, message)])
    }
}

/// Accumulates step outcomes. Failures are logged, never propagated.
#[derive(Default)]
struct StepLog {
    outcomes: Vec<StepOutcome>,
}

impl StepLog {
    /// Records the result and reports whether the step succeeded.
    fn record(&mut self, step: String, result: Result<(), SheetsApiError>) -> bool {
        let succeeded = result.is_ok();
        match result {
            Ok(()) => {
                debug!(step = %step, "Sheet step succeeded");
                self.outcomes.push(StepOutcome {
                    step,
                    succeeded: true,
                    error: None,
                });
            }
            Err(e) => {
                warn!(step = %step, error = %e, "Sheet step failed, continuing");
                self.outcomes.push(StepOutcome {
                    step,
                    succeeded: false,
                    error: Some(e.to_string()),
                });
            }
        }
        succeeded
    }
}

/// A validated request, borrowed from the caller's payload.
struct Submission<'a> {
    event: &'a EventDescriptor,
    event_title: &'a str,
    registrations: &'a [Value],
}

pub struct SheetsService<C: SpreadsheetClient> {
    client: C,
    builder: SheetDataBuilder,
    config: SheetsConfig,
}

impl<C: SpreadsheetClient> SheetsService<C> {
    pub fn new(client: C, config: SheetsConfig) -> Self {
        Self {
            builder: SheetDataBuilder::new(&config),
            client,
            config,
        }
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    /// Tabs to create: Registrations and Dashboard always, Team Members when
    /// there is team data or the event allows teams.
    pub fn plan_tabs(event: &EventDescriptor, registrations: &[Registration]) -> Vec<SheetTab> {
        let wants_teams = event.participation_mode.allows_teams()
            || registrations.iter().any(is_team_registration);

        let mut tabs = vec![SheetTab::Registrations];
        if wants_teams {
            tabs.push(SheetTab::TeamMembers);
        }
        tabs.push(SheetTab::Dashboard);
        tabs
    }

    fn check_submission<'a>(
        &self,
        event: Option<&'a EventDescriptor>,
        registrations: &'a Value,
    ) -> Result<Submission<'a>, SheetsError> {
        let mut issues = Vec::new();

        let event_title = match event {
            None => {
                issues.push(ValidationIssue::new("eventData", "Event data is required"));
                None
            }
            Some(event) => {
                let title = event.title();
                if title.is_none() {
                    issues.push(ValidationIssue::new(
                        "eventData.title",
                        "Event title is required",
                    ));
                }
                issues.extend(validate_custom_fields(&event.custom_field_defs));
                title
            }
        };

        let items = match registrations.as_array() {
            None => {
                issues.push(ValidationIssue::new(
                    "registrations",
                    "Registrations must be a list",
                ));
                None
            }
            Some(items) if items.is_empty() && !self.config.allow_empty => {
                issues.push(ValidationIssue::new(
                    "registrations",
                    "At least one registration is required",
                ));
                None
            }
            Some(items) => Some(items.as_slice()),
        };

        match (event, event_title, items) {
            (Some(event), Some(event_title), Some(registrations)) if issues.is_empty() => {
                Ok(Submission {
                    event,
                    event_title,
                    registrations,
                })
            }
            _ => Err(SheetsError::Validation(issues)),
        }
    }

    /// Builds the registrations grid before anything remote happens.
    fn dry_run(&self, submission: &Submission<'_>) -> Result<SheetData, SheetsError> {
        let sheet = self
            .builder
            .prepare(submission.event, submission.registrations);
        if !sheet.is_rectangular() {
            return Err(SheetsError::invalid(
                "registrations",
                "Registrations could not be arranged into a sheet",
            ));
        }
        Ok(sheet)
    }

    fn generated_label(&self) -> String {
        format!(
            "Generated on {}",
            Utc::now()
                .with_timezone(&self.config.time_zone)
                .format("%d %b %Y, %I:%M %p")
        )
    }

    fn parse_registrations(submission: &Submission<'_>) -> ParsedBatch {
        let batch = Registration::parse_batch(submission.registrations);
        if batch.malformed > 0 {
            warn!(
                malformed = batch.malformed,
                total = submission.registrations.len(),
                "Some registrations could not be read and are written as error rows"
            );
        }
        batch
    }

    async fn apply_format(
        &self,
        spreadsheet_id: &str,
        tab: SheetTab,
        groups: Vec<FormatGroup>,
        steps: &mut StepLog,
    ) {
        for group in groups {
            if group.requests.is_empty() {
                continue;
            }
            let result = self
                .client
                .batch_update(spreadsheet_id, &group.requests)
                .await;
            steps.record(format!("format:{}:{}", tab.title(), group.name), result);
        }
    }

    /// Clears a whole tab and writes `rows` from A1.
    async fn rewrite_tab(
        &self,
        spreadsheet_id: &str,
        tab: SheetTab,
        rows: &[Vec<String>],
        steps: &mut StepLog,
    ) -> bool {
        let cleared = self
            .client
            .clear_values(spreadsheet_id, &tab.range("A1:ZZ"))
            .await;
        steps.record(format!("clear:{}", tab.title()), cleared);

        let written = self
            .client
            .write_values(spreadsheet_id, &tab.range("A1"), rows)
            .await;
        steps.record(format!("populate:{}", tab.title()), written)
    }

    /// Returns the tab's layout, adding the tab first when the spreadsheet
    /// predates it. The flag is true for a freshly added tab.
    async fn ensure_tab(
        &self,
        spreadsheet_id: &str,
        existing: Option<&TabLayout>,
        tab: SheetTab,
        steps: &mut StepLog,
    ) -> Option<(TabLayout, bool)> {
        if let Some(layout) = existing {
            return Some((layout.clone(), false));
        }

        let result = self
            .client
            .batch_update(spreadsheet_id, &[add_sheet(tab)])
            .await;
        steps
            .record(format!("add_tab:{}", tab.title()), result)
            .then(|| {
                (
                    TabLayout {
                        title: tab.title().to_string(),
                        sheet_id: tab.preferred_sheet_id(),
                        banded_range_ids: Vec::new(),
                    },
                    true,
                )
            })
    }

    /// Compares the Registrations header row with the one the current data
    /// needs. An unreadable header row counts as stale.
    async fn header_is_stale(
        &self,
        spreadsheet_id: &str,
        sheet: &SheetData,
        steps: &mut StepLog,
    ) -> bool {
        let range = SheetTab::Registrations.range(&format!("A{HEADER_ROW}:ZZ{HEADER_ROW}"));
        match self.client.read_values(spreadsheet_id, &range).await {
            Ok(rows) => rows.first() != Some(&sheet.headers),
            Err(e) => {
                steps.record("read:Registrations:header".to_string(), Err(e));
                true
            }
        }
    }

    /// Replaces the header row only. The title row stays as it is.
    async fn rewrite_header(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        sheet: &SheetData,
        steps: &mut StepLog,
    ) {
        let row = SheetTab::Registrations.range(&format!("A{HEADER_ROW}:ZZ{HEADER_ROW}"));
        let cleared = self.client.clear_values(spreadsheet_id, &row).await;
        steps.record("clear:Registrations:header".to_string(), cleared);

        let written = self
            .client
            .write_values(
                spreadsheet_id,
                &SheetTab::Registrations.range(&format!("A{HEADER_ROW}")),
                std::slice::from_ref(&sheet.headers),
            )
            .await;
        if steps.record("populate:Registrations:header".to_string(), written) {
            info!(
                spreadsheet_id = %spreadsheet_id,
                columns = sheet.headers.len(),
                "Registrations columns changed, header row rewritten"
            );
            self.apply_format(
                spreadsheet_id,
                SheetTab::Registrations,
                vec![header_format(sheet_id, sheet)],
                steps,
            )
            .await;
        }
    }

    /// Creates, populates, formats and shares a new spreadsheet.
    pub async fn create_event_sheet(
        &self,
        event: Option<&EventDescriptor>,
        registrations: &Value,
    ) -> Result<CreatedSheet, SheetsError> {
        let submission = self.check_submission(event, registrations)?;
        let sheet = self.dry_run(&submission)?;

        let batch = Self::parse_registrations(&submission);
        let parsed = &batch.registrations;
        let tabs = Self::plan_tabs(submission.event, parsed);
        let title = format!("{} - Registrations", submission.event_title);

        let spreadsheet_id = self.client.create_spreadsheet(&title, &tabs).await?;
        info!(
            spreadsheet_id = %spreadsheet_id,
            rows = sheet.row_count(),
            tabs = tabs.len(),
            "Created event spreadsheet"
        );

        let mut steps = StepLog::default();
        let generated = self.generated_label();

        // Populate
        let grid = sheet.to_grid(&title, &generated);
        let result = self
            .client
            .write_values(&spreadsheet_id, &SheetTab::Registrations.range("A1"), &grid)
            .await;
        steps.record("populate:Registrations".to_string(), result);

        let roster = tabs.contains(&SheetTab::TeamMembers).then(|| {
            let roster = build_team_roster(parsed);
            let grid = roster.to_grid(
                &format!("{} - Team Members", submission.event_title),
                &generated,
            );
            (roster, grid)
        });
        if let Some((_, grid)) = &roster {
            let result = self
                .client
                .write_values(&spreadsheet_id, &SheetTab::TeamMembers.range("A1"), grid)
                .await;
            steps.record("populate:Team Members".to_string(), result);
        }

        let dashboard =
            summarize(parsed, batch.malformed).to_layout(submission.event_title, &generated);
        let result = self
            .client
            .write_values(&spreadsheet_id, &SheetTab::Dashboard.range("A1"), &dashboard.rows)
            .await;
        steps.record("populate:Dashboard".to_string(), result);

        // Format
        self.apply_format(
            &spreadsheet_id,
            SheetTab::Registrations,
            tabular_format(SheetTab::Registrations.preferred_sheet_id(), &sheet),
            &mut steps,
        )
        .await;
        if let Some((roster, _)) = &roster {
            self.apply_format(
                &spreadsheet_id,
                SheetTab::TeamMembers,
                tabular_format(SheetTab::TeamMembers.preferred_sheet_id(), roster),
                &mut steps,
            )
            .await;
        }
        self.apply_format(
            &spreadsheet_id,
            SheetTab::Dashboard,
            dashboard_format(SheetTab::Dashboard.preferred_sheet_id(), &dashboard),
            &mut steps,
        )
        .await;

        // Share
        let result = self
            .client
            .share_with_anyone(&spreadsheet_id, self.config.share_role)
            .await;
        steps.record("share".to_string(), result);

        Ok(CreatedSheet {
            shareable_link: shareable_link(&spreadsheet_id),
            spreadsheet_id,
            title,
            row_count: sheet.row_count(),
            steps: steps.outcomes,
        })
    }

    /// Replaces the data rows of an existing spreadsheet and refreshes the
    /// dependent tabs. The title row is left untouched; the header row is
    /// rewritten only when the columns changed.
    pub async fn update_event_sheet(
        &self,
        spreadsheet_id: &str,
        event: Option<&EventDescriptor>,
        registrations: &Value,
    ) -> Result<UpdatedSheet, SheetsError> {
        let spreadsheet_id = require_id(spreadsheet_id)?;
        let submission = self.check_submission(event, registrations)?;
        let sheet = self.dry_run(&submission)?;

        let layout = self.client.get_layout(spreadsheet_id).await?;
        let registrations_tab = layout.tab(SheetTab::Registrations).ok_or_else(|| {
            SheetsApiError::NotFound(format!(
                "spreadsheet {spreadsheet_id} has no '{}' tab",
                SheetTab::Registrations.title()
            ))
        })?;

        let mut steps = StepLog::default();
        let generated = self.generated_label();

        // Data region only: row DATA_START_ROW downwards.
        let result = self
            .client
            .clear_values(
                spreadsheet_id,
                &SheetTab::Registrations.range(&format!("A{DATA_START_ROW}:ZZ")),
            )
            .await;
        steps.record("clear:Registrations".to_string(), result);

        if !sheet.rows.is_empty() {
            let result = self
                .client
                .write_values(
                    spreadsheet_id,
                    &SheetTab::Registrations.range(&format!("A{DATA_START_ROW}")),
                    &sheet.rows,
                )
                .await;
            steps.record("populate:Registrations".to_string(), result);
        }

        if self.header_is_stale(spreadsheet_id, &sheet, &mut steps).await {
            self.rewrite_header(spreadsheet_id, registrations_tab.sheet_id, &sheet, &mut steps)
                .await;
        }

        self.apply_format(
            spreadsheet_id,
            SheetTab::Registrations,
            refresh_tabular_format(
                registrations_tab.sheet_id,
                &sheet,
                &registrations_tab.banded_range_ids,
            ),
            &mut steps,
        )
        .await;

        let batch = Self::parse_registrations(&submission);
        let parsed = &batch.registrations;

        // A roster tab that already exists is always rewritten, even when no
        // teams are left, so it never lists people who dropped out.
        let existing = layout.tab(SheetTab::TeamMembers);
        let wants_roster =
            Self::plan_tabs(submission.event, parsed).contains(&SheetTab::TeamMembers);
        if wants_roster || existing.is_some() {
            if let Some((tab, added)) = self
                .ensure_tab(spreadsheet_id, existing, SheetTab::TeamMembers, &mut steps)
                .await
            {
                let roster = build_team_roster(parsed);
                let grid = roster.to_grid(
                    &format!("{} - Team Members", submission.event_title),
                    &generated,
                );
                if self
                    .rewrite_tab(spreadsheet_id, SheetTab::TeamMembers, &grid, &mut steps)
                    .await
                {
                    let groups = if added {
                        tabular_format(tab.sheet_id, &roster)
                    } else {
                        refresh_tabular_format(tab.sheet_id, &roster, &tab.banded_range_ids)
                    };
                    self.apply_format(spreadsheet_id, SheetTab::TeamMembers, groups, &mut steps)
                        .await;
                }
            }
        }

        let existing = layout.tab(SheetTab::Dashboard);
        if let Some((tab, _)) = self
            .ensure_tab(spreadsheet_id, existing, SheetTab::Dashboard, &mut steps)
            .await
        {
            let dashboard =
                summarize(parsed, batch.malformed).to_layout(submission.event_title, &generated);
            if self
                .rewrite_tab(spreadsheet_id, SheetTab::Dashboard, &dashboard.rows, &mut steps)
                .await
            {
                let mut groups = vec![reset_format(tab.sheet_id)];
                groups.extend(dashboard_format(tab.sheet_id, &dashboard));
                self.apply_format(spreadsheet_id, SheetTab::Dashboard, groups, &mut steps)
                    .await;
            }
        }

        info!(
            spreadsheet_id = %spreadsheet_id,
            rows = sheet.row_count(),
            failed_steps = steps.outcomes.iter().filter(|s| !s.succeeded).count(),
            "Updated event spreadsheet"
        );

        Ok(UpdatedSheet {
            spreadsheet_id: spreadsheet_id.to_string(),
            shareable_link: shareable_link(spreadsheet_id),
            row_count: sheet.row_count(),
            steps: steps.outcomes,
        })
    }

    pub async fn get_sheet_info(&self, spreadsheet_id: &str) -> Result<SheetInfo, SheetsError> {
        let spreadsheet_id = require_id(spreadsheet_id)?;
        let metadata = self.client.file_metadata(spreadsheet_id).await?;

        Ok(SheetInfo {
            title: metadata.title,
            shareable_link: shareable_link(spreadsheet_id),
            created_time: metadata.created_time,
            last_modified: metadata.modified_time,
        })
    }

    pub async fn delete_sheet(&self, spreadsheet_id: &str) -> Result<(), SheetsError> {
        let spreadsheet_id = require_id(spreadsheet_id)?;
        self.client.delete_file(spreadsheet_id).await?;
        info!(spreadsheet_id = %spreadsheet_id, "Deleted event spreadsheet");
        Ok(())
    }

    /// Checks that the upstream credentials still work.
    pub async fn probe(&self) -> Result<(), SheetsError> {
        Ok(self.client.verify_credentials().await?)
    }
}

fn require_id(spreadsheet_id: &str) -> Result<&str, SheetsError> {
    let trimmed = spreadsheet_id.trim();
    if trimmed.is_empty() {
        return Err(SheetsError::invalid(
            "spreadsheetId",
            "Spreadsheet id is required",
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::sheets::sheet_models::{
        FileMetadata, ShareRole, SpreadsheetLayout, TITLE_ROW,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct FakeState {
        pub layout: Option<SpreadsheetLayout>,
        pub grids: HashMap<String, Vec<Vec<String>>>,
        pub batches: Vec<Vec<Value>>,
        pub shared_as: Option<ShareRole>,
        pub deleted: bool,
        pub calls: usize,
    }

    /// In-memory spreadsheet that understands the `'Tab'!A<row>` ranges the
    /// service uses. Operations named in `failing` return an upstream error.
    #[derive(Default)]
    pub(crate) struct FakeSheets {
        pub state: Mutex<FakeState>,
        pub failing: HashSet<&'static str>,
    }

    impl FakeSheets {
        pub fn failing(ops: &[&'static str]) -> Self {
            Self {
                failing: ops.iter().copied().collect(),
                ..Self::default()
            }
        }

        fn check(&self, op: &'static str) -> Result<(), SheetsApiError> {
            self.state.lock().unwrap().calls += 1;
            if self.failing.contains(op) {
                return Err(SheetsApiError::Upstream {
                    status: 400,
                    message: format!("{op} rejected"),
                });
            }
            Ok(())
        }

        pub fn grid(&self, tab: SheetTab) -> Vec<Vec<String>> {
            self.state
                .lock()
                .unwrap()
                .grids
                .get(tab.title())
                .cloned()
                .unwrap_or_default()
        }
    }

    /// `'Team Members'!A4:ZZ` -> ("Team Members", 4, None),
    /// `'Registrations'!A3:ZZ3` -> ("Registrations", 3, Some(3))
    fn parse_range(range: &str) -> (String, usize, Option<usize>) {
        let (tab, cells) = range.rsplit_once('!').unwrap();
        let row = |cell: &str| cell.trim_start_matches(char::is_alphabetic).parse().ok();
        let mut corners = cells.split(':');
        let start = corners.next().and_then(row).unwrap();
        let end = corners.next().and_then(row);
        (tab.trim_matches('\'').to_string(), start, end)
    }

    #[async_trait]
    impl SpreadsheetClient for FakeSheets {
        async fn create_spreadsheet(
            &self,
            title: &str,
            tabs: &[SheetTab],
        ) -> Result<String, SheetsApiError> {
            self.check("create")?;
            let mut state = self.state.lock().unwrap();
            state.layout = Some(SpreadsheetLayout {
                title: title.to_string(),
                tabs: tabs
                    .iter()
                    .map(|tab| TabLayout {
                        title: tab.title().to_string(),
                        sheet_id: tab.preferred_sheet_id(),
                        banded_range_ids: vec![tab.preferred_sheet_id() + 100],
                    })
                    .collect(),
            });
            Ok("sheet-123".to_string())
        }

        async fn get_layout(&self, id: &str) -> Result<SpreadsheetLayout, SheetsApiError> {
            self.check("layout")?;
            self.state
                .lock()
                .unwrap()
                .layout
                .clone()
                .ok_or_else(|| SheetsApiError::NotFound(id.to_string()))
        }

        async fn write_values(
            &self,
            _id: &str,
            range: &str,
            rows: &[Vec<String>],
        ) -> Result<(), SheetsApiError> {
            self.check("write")?;
            let (tab, start, _) = parse_range(range);
            let mut state = self.state.lock().unwrap();
            let grid = state.grids.entry(tab).or_default();
            let first = start - 1;
            if grid.len() < first + rows.len() {
                grid.resize(first + rows.len(), Vec::new());
            }
            for (offset, row) in rows.iter().enumerate() {
                grid[first + offset] = row.clone();
            }
            Ok(())
        }

        async fn clear_values(&self, _id: &str, range: &str) -> Result<(), SheetsApiError> {
            self.check("clear")?;
            let (tab, start, end) = parse_range(range);
            let mut state = self.state.lock().unwrap();
            if let Some(grid) = state.grids.get_mut(&tab) {
                match end {
                    Some(end) => {
                        for row in grid.iter_mut().take(end).skip(start - 1) {
                            row.clear();
                        }
                    }
                    None => grid.truncate(start - 1),
                }
            }
            Ok(())
        }

        async fn read_values(
            &self,
            _id: &str,
            range: &str,
        ) -> Result<Vec<Vec<String>>, SheetsApiError> {
            self.check("read")?;
            let (tab, start, end) = parse_range(range);
            let state = self.state.lock().unwrap();
            let grid = state.grids.get(&tab).cloned().unwrap_or_default();
            let end = end.unwrap_or(grid.len()).min(grid.len());
            let mut rows: Vec<_> = grid.get(start - 1..end).unwrap_or_default().to_vec();
            while rows.last().map_or(false, Vec::is_empty) {
                rows.pop();
            }
            Ok(rows)
        }

        async fn batch_update(&self, _id: &str, requests: &[Value]) -> Result<(), SheetsApiError> {
            self.check("batch")?;
            let mut state = self.state.lock().unwrap();
            for request in requests {
                if let Some(props) = request.get("addSheet").map(|a| &a["properties"]) {
                    if let Some(layout) = state.layout.as_mut() {
                        layout.tabs.push(TabLayout {
                            title: props["title"].as_str().unwrap().to_string(),
                            sheet_id: props["sheetId"].as_i64().unwrap(),
                            banded_range_ids: Vec::new(),
                        });
                    }
                }
            }
            state.batches.push(requests.to_vec());
            Ok(())
        }

        async fn share_with_anyone(&self, _id: &str, role: ShareRole) -> Result<(), SheetsApiError> {
            self.check("share")?;
            self.state.lock().unwrap().shared_as = Some(role);
            Ok(())
        }

        async fn file_metadata(&self, id: &str) -> Result<FileMetadata, SheetsApiError> {
            self.check("metadata")?;
            let state = self.state.lock().unwrap();
            let layout = state
                .layout
                .as_ref()
                .ok_or_else(|| SheetsApiError::NotFound(id.to_string()))?;
            Ok(FileMetadata {
                title: layout.title.clone(),
                created_time: Some("2025-01-10T09:00:00Z".to_string()),
                modified_time: Some("2025-01-11T09:00:00Z".to_string()),
            })
        }

        async fn delete_file(&self, _id: &str) -> Result<(), SheetsApiError> {
            self.check("delete")?;
            self.state.lock().unwrap().deleted = true;
            Ok(())
        }

        async fn verify_credentials(&self) -> Result<(), SheetsApiError> {
            if self.failing.contains("auth") {
                return Err(SheetsApiError::Auth("invalid_grant".to_string()));
            }
            Ok(())
        }
    }

    fn service(client: FakeSheets) -> SheetsService<FakeSheets> {
        SheetsService::new(client, SheetsConfig::default())
    }

    fn event(value: Value) -> EventDescriptor {
        serde_json::from_value(value).unwrap()
    }

    fn solo_event() -> EventDescriptor {
        event(json!({"id": "e1", "title": "Rust Workshop"}))
    }

    fn registration(name: &str) -> Value {
        json!({
            "participant_name": name,
            "participant_email": format!("{}@example.com", name.to_lowercase()),
            "department": "CSE"
        })
    }

    #[tokio::test]
    async fn test_create_populates_and_shares() {
        let svc = service(FakeSheets::default());
        let regs = json!([registration("Asha"), registration("Ravi")]);

        let created = svc
            .create_event_sheet(Some(&solo_event()), &regs)
            .await
            .unwrap();

        assert_eq!(created.spreadsheet_id, "sheet-123");
        assert_eq!(
            created.shareable_link,
            "https://docs.google.com/spreadsheets/d/sheet-123/edit"
        );
        assert_eq!(created.title, "Rust Workshop - Registrations");
        assert_eq!(created.row_count, 2);
        assert!(created.steps.iter().all(|s| s.succeeded));

        let client = &svc.client;
        let grid = client.grid(SheetTab::Registrations);
        assert_eq!(grid[TITLE_ROW - 1], vec!["Rust Workshop - Registrations".to_string()]);
        assert_eq!(grid[HEADER_ROW - 1][1], "Name");
        assert_eq!(grid[DATA_START_ROW - 1][1], "Asha");
        assert_eq!(grid.len(), DATA_START_ROW - 1 + 2);

        let state = client.state.lock().unwrap();
        assert_eq!(state.shared_as, Some(ShareRole::Writer));
        let titles: Vec<_> = state.layout.as_ref().unwrap().tabs.iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, vec!["Registrations", "Dashboard"]);
        assert!(state.grids.contains_key("Dashboard"));
    }

    #[tokio::test]
    async fn test_team_tab_created_for_team_registrations() {
        let svc = service(FakeSheets::default());
        let regs = json!([{
            "participant_name": "Asha",
            "participant_email": "asha@example.com",
            "additional_info": {"team_name": "Crabs", "team_members": [{"name": "Ravi"}]}
        }]);

        svc.create_event_sheet(Some(&solo_event()), &regs).await.unwrap();

        let roster = svc.client.grid(SheetTab::TeamMembers);
        assert_eq!(roster[DATA_START_ROW - 1][1], "Crabs");
        assert_eq!(roster[DATA_START_ROW][3], "Ravi");
    }

    #[tokio::test]
    async fn test_team_mode_event_gets_team_tab_without_teams() {
        let ev = event(json!({"id": "e", "title": "Hack", "participation_type": "both"}));
        let svc = service(FakeSheets::default());

        svc.create_event_sheet(Some(&ev), &json!([registration("Asha")]))
            .await
            .unwrap();

        let state = svc.client.state.lock().unwrap();
        assert_eq!(state.layout.as_ref().unwrap().tabs.len(), 3);
    }

    #[tokio::test]
    async fn test_secondary_failures_do_not_abort() {
        let svc = service(FakeSheets::failing(&["batch", "share"]));

        let created = svc
            .create_event_sheet(Some(&solo_event()), &json!([registration("Asha")]))
            .await
            .unwrap();

        assert_eq!(created.spreadsheet_id, "sheet-123");
        let failed: Vec<_> = created
            .steps
            .iter()
            .filter(|s| !s.succeeded)
            .map(|s| s.step.as_str())
            .collect();
        assert!(failed.contains(&"share"));
        assert!(failed.contains(&"format:Registrations:banding"));
        assert!(created
            .steps
            .iter()
            .any(|s| s.step == "populate:Registrations" && s.succeeded));
    }

    #[tokio::test]
    async fn test_create_failure_is_fatal() {
        let svc = service(FakeSheets::failing(&["create"]));

        let err = svc
            .create_event_sheet(Some(&solo_event()), &json!([registration("Asha")]))
            .await
            .unwrap_err();

        assert!(matches!(err, SheetsError::Api(SheetsApiError::Upstream { .. })));
    }

    #[tokio::test]
    async fn test_validation_happens_before_remote_calls() {
        let svc = service(FakeSheets::default());

        let err = svc.create_event_sheet(None, &json!([])).await.unwrap_err();
        let SheetsError::Validation(issues) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["eventData", "registrations"]);

        let bad_fields = event(json!({
            "id": "e",
            "title": "T",
            "custom_fields": [{"id": "a", "label": "A"}, {"id": "b"}]
        }));
        let err = svc
            .create_event_sheet(Some(&bad_fields), &json!([registration("Asha")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetsError::Validation(_)));

        let err = svc
            .create_event_sheet(Some(&solo_event()), &json!({"not": "a list"}))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetsError::Validation(_)));

        assert_eq!(svc.client.state.lock().unwrap().calls, 0);
    }

    #[tokio::test]
    async fn test_allow_empty_scaffolding() {
        let config = SheetsConfig {
            allow_empty: true,
            ..SheetsConfig::default()
        };
        let svc = SheetsService::new(FakeSheets::default(), config);

        let created = svc
            .create_event_sheet(Some(&solo_event()), &json!([]))
            .await
            .unwrap();

        assert_eq!(created.row_count, 0);
        assert_eq!(svc.client.grid(SheetTab::Registrations).len(), HEADER_ROW);
    }

    #[tokio::test]
    async fn test_update_keeps_title_and_header_rows() {
        let svc = service(FakeSheets::default());
        let ev = solo_event();
        svc.create_event_sheet(
            Some(&ev),
            &json!([registration("Asha"), registration("Ravi"), registration("Meera")]),
        )
        .await
        .unwrap();
        let before = svc.client.grid(SheetTab::Registrations);

        let updated = svc
            .update_event_sheet("sheet-123", Some(&ev), &json!([registration("Kiran")]))
            .await
            .unwrap();

        let after = svc.client.grid(SheetTab::Registrations);
        assert_eq!(updated.row_count, 1);
        assert_eq!(after[TITLE_ROW - 1], before[TITLE_ROW - 1]);
        assert_eq!(after[HEADER_ROW - 1], before[HEADER_ROW - 1]);
        assert_eq!(after.len(), DATA_START_ROW);
        assert_eq!(after[DATA_START_ROW - 1][1], "Kiran");
        assert!(updated.steps.iter().all(|s| s.succeeded));

        // Stale banding from creation is removed before the new one is added.
        let state = svc.client.state.lock().unwrap();
        assert!(state
            .batches
            .iter()
            .flatten()
            .any(|r| r["deleteBanding"]["bandedRangeId"] == 100));
    }

    #[tokio::test]
    async fn test_update_adds_team_tab_when_teams_appear() {
        let svc = service(FakeSheets::default());
        let ev = solo_event();
        svc.create_event_sheet(Some(&ev), &json!([registration("Asha")]))
            .await
            .unwrap();

        let regs = json!([{
            "participant_name": "Asha",
            "participant_email": "asha@example.com",
            "additional_info": {"team_members": [{"name": "Ravi"}]}
        }]);
        let updated = svc
            .update_event_sheet("sheet-123", Some(&ev), &regs)
            .await
            .unwrap();

        assert!(updated
            .steps
            .iter()
            .any(|s| s.step == "add_tab:Team Members" && s.succeeded));
        let roster = svc.client.grid(SheetTab::TeamMembers);
        assert_eq!(roster[DATA_START_ROW][3], "Ravi");
    }

    #[tokio::test]
    async fn test_update_clears_roster_when_teams_leave() {
        let svc = service(FakeSheets::default());
        let ev = solo_event();
        let team = json!([{
            "participant_name": "Asha",
            "participant_email": "asha@example.com",
            "additional_info": {"team_name": "Crabs", "team_members": [{"name": "Ravi"}]}
        }]);
        svc.create_event_sheet(Some(&ev), &team).await.unwrap();
        assert!(svc.client.grid(SheetTab::TeamMembers).len() > DATA_START_ROW);

        let updated = svc
            .update_event_sheet("sheet-123", Some(&ev), &json!([registration("Asha")]))
            .await
            .unwrap();

        let roster = svc.client.grid(SheetTab::TeamMembers);
        assert_eq!(roster.len(), HEADER_ROW);
        assert_eq!(roster[TITLE_ROW - 1], vec!["Rust Workshop - Team Members".to_string()]);
        assert_eq!(roster[HEADER_ROW - 1][0], "Team #");
        assert!(updated
            .steps
            .iter()
            .any(|s| s.step == "populate:Team Members" && s.succeeded));
    }

    #[tokio::test]
    async fn test_update_rewrites_header_when_columns_change() {
        let svc = service(FakeSheets::default());
        svc.create_event_sheet(Some(&solo_event()), &json!([registration("Asha")]))
            .await
            .unwrap();
        let before = svc.client.grid(SheetTab::Registrations);

        let ev = event(json!({
            "id": "e1",
            "title": "Rust Workshop",
            "custom_fields": [{"id": "college", "label": "College"}]
        }));
        let regs = json!([{
            "participant_name": "Kiran",
            "participant_email": "kiran@example.com",
            "payment_status": "verified",
            "additional_info": {"college": "IIT"}
        }]);
        let updated = svc
            .update_event_sheet("sheet-123", Some(&ev), &regs)
            .await
            .unwrap();

        let after = svc.client.grid(SheetTab::Registrations);
        let header = &after[HEADER_ROW - 1];
        assert_eq!(after[TITLE_ROW - 1], before[TITLE_ROW - 1]);
        assert_ne!(header, &before[HEADER_ROW - 1]);
        assert!(header.contains(&"College".to_string()));
        assert!(header.contains(&"Payment Status".to_string()));
        assert_eq!(header.len(), after[DATA_START_ROW - 1].len());
        assert!(updated.steps.iter().all(|s| s.succeeded));

        let state = svc.client.state.lock().unwrap();
        assert!(state
            .batches
            .iter()
            .flatten()
            .any(|r| r["repeatCell"]["range"]["startRowIndex"] == HEADER_ROW - 1
                && r["repeatCell"]["range"]["endColumnIndex"] == header.len()));
    }

    #[tokio::test]
    async fn test_update_leaves_matching_header_alone() {
        let svc = service(FakeSheets::default());
        svc.create_event_sheet(Some(&solo_event()), &json!([registration("Asha")]))
            .await
            .unwrap();

        let updated = svc
            .update_event_sheet("sheet-123", Some(&solo_event()), &json!([registration("Ravi")]))
            .await
            .unwrap();

        assert!(!updated
            .steps
            .iter()
            .any(|s| s.step.starts_with("populate:Registrations:header")));
    }

    #[tokio::test]
    async fn test_dashboard_totals_include_unreadable_rows() {
        let svc = service(FakeSheets::default());

        let created = svc
            .create_event_sheet(
                Some(&solo_event()),
                &json!([registration("Asha"), 7, {"participant_name": {"first": "R"}}]),
            )
            .await
            .unwrap();

        assert_eq!(created.row_count, 3);
        let dashboard = svc.client.grid(SheetTab::Dashboard);
        assert!(dashboard.contains(&vec!["Total Registrations".to_string(), "3".to_string()]));
        assert!(dashboard.contains(&vec!["Unreadable Registrations".to_string(), "2".to_string()]));
    }

    #[tokio::test]
    async fn test_update_unknown_spreadsheet() {
        let svc = service(FakeSheets::default());

        let err = svc
            .update_event_sheet("missing", Some(&solo_event()), &json!([registration("A")]))
            .await
            .unwrap_err();

        assert!(matches!(err, SheetsError::Api(SheetsApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_info_delete_and_credentials_check() {
        let svc = service(FakeSheets::default());
        svc.create_event_sheet(Some(&solo_event()), &json!([registration("Asha")]))
            .await
            .unwrap();

        let info = svc.get_sheet_info("sheet-123").await.unwrap();
        assert_eq!(info.title, "Rust Workshop - Registrations");
        assert_eq!(info.last_modified.as_deref(), Some("2025-01-11T09:00:00Z"));

        svc.delete_sheet("sheet-123").await.unwrap();
        assert!(svc.client.state.lock().unwrap().deleted);

        assert!(matches!(
            svc.delete_sheet("  ").await,
            Err(SheetsError::Validation(_))
        ));
        assert!(svc.probe().await.is_ok());
        assert!(service(FakeSheets::failing(&["auth"])).probe().await.is_err());
    }
}
