// The sheet data builder turns (event, registrations) into the header/row
// grid for the "Registrations" tab.
//
// It never fails on optional data: missing values become "N/A", invalid
// custom field definitions are filtered, and a registration that cannot be
// read at all becomes a row of "ERROR" cells instead of aborting the export.
//
// Column order:
//   12 fixed columns | one per valid custom field | 3 payment columns (if relevant) | Notes

use chrono_tz::Tz;
use serde_json::Value;

use super::cell_format::{format_amount, format_timestamp, payment_status_label, render_value, title_case};
use super::sheet_models::{InvalidFieldPolicy, SheetData, SheetsConfig, ERROR_CELL, NOT_AVAILABLE};
use crate::core::registrations::registration_models::non_blank;
use crate::core::registrations::{EventDescriptor, FieldDefEntry, Registration};

pub const FIXED_HEADERS: [&str; 12] = [
    "S.No",
    "Name",
    "Email",
    "Phone",
    "Student ID",
    "Department",
    "Year",
    "Registration Type",
    "Status",
    "Attendance Status",
    "Attendance Time",
    "Registration Date",
];

pub const PAYMENT_HEADERS: [&str; 3] = ["Payment Status", "Payment Amount", "Payment Proof"];

pub const PAYMENT_PROOF_HEADER: &str = "Payment Proof";

pub const NOTES_HEADER: &str = "Notes";

/// A custom field that made it into the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomColumn {
    pub id: String,
    pub label: String,
}

pub struct SheetDataBuilder {
    time_zone: Tz,
    currency_symbol: String,
    invalid_field_policy: InvalidFieldPolicy,
}

impl SheetDataBuilder {
    pub fn new(config: &SheetsConfig) -> Self {
        Self {
            time_zone: config.time_zone,
            currency_symbol: config.currency_symbol.clone(),
            invalid_field_policy: config.invalid_field_policy,
        }
    }

    /// Custom field columns in definition order, after applying the invalid
    /// field policy.
    pub fn custom_columns(&self, event: &EventDescriptor) -> Vec<CustomColumn> {
        event
            .custom_field_defs
            .entries()
            .iter()
            .filter_map(|entry| match entry {
                FieldDefEntry::Valid(def) => Some(CustomColumn {
                    id: def.id.clone(),
                    label: def.label.clone(),
                }),
                FieldDefEntry::Invalid(bad) => match (self.invalid_field_policy, &bad.id) {
                    (InvalidFieldPolicy::Placeholder, Some(id)) => Some(CustomColumn {
                        id: id.clone(),
                        label: format!("Custom Field {}", bad.position + 1),
                    }),
                    _ => {
                        tracing::debug!(
                            position = bad.position,
                            reason = %bad.reason,
                            "Skipping invalid custom field definition"
                        );
                        None
                    }
                },
            })
            .collect()
    }

    /// Builds headers and one row per registration.
    pub fn prepare(&self, event: &EventDescriptor, registrations: &[Value]) -> SheetData {
        let columns = self.custom_columns(event);
        let parsed: Vec<_> = registrations.iter().map(Registration::from_value).collect();

        let include_payment = event.payment_required
            || parsed
                .iter()
                .any(|r| r.as_ref().map(Registration::has_payment_info).unwrap_or(false));

        let headers = build_headers(&columns, include_payment);

        let rows = parsed
            .iter()
            .enumerate()
            .map(|(index, registration)| match registration {
                Ok(registration) => {
                    self.build_row(index, event, registration, &columns, include_payment)
                }
                Err(e) => {
                    tracing::warn!(row = index + 1, error = %e, "Emitting error row");
                    error_row(index, headers.len(), &e.0)
                }
            })
            .collect();

        SheetData { headers, rows }
    }

    fn build_row(
        &self,
        index: usize,
        event: &EventDescriptor,
        registration: &Registration,
        columns: &[CustomColumn],
        include_payment: bool,
    ) -> Vec<String> {
        let mut missing = Vec::new();
        let mut required = |value: Option<&str>, label: &'static str| match value {
            Some(v) => v.to_string(),
            None => {
                missing.push(label);
                ERROR_CELL.to_string()
            }
        };

        let name = required(registration.name(), "name");
        let email = required(registration.email(), "email");

        let mut row = vec![
            (index + 1).to_string(),
            name,
            email,
            or_na(non_blank(&registration.phone)),
            or_na(non_blank(&registration.student_id)),
            or_na(registration.department()),
            or_na(registration.year()),
            or_na_with(non_blank(&registration.registration_type), title_case),
            or_na_with(non_blank(&registration.status), title_case),
            or_na_with(non_blank(&registration.attendance_status), title_case),
            self.timestamp_cell(&registration.attendance_timestamp),
            self.timestamp_cell(&registration.created_at),
        ];

        for column in columns {
            row.push(
                registration
                    .custom_value(&column.id)
                    .and_then(render_value)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            );
        }

        if include_payment {
            row.push(or_na_with(
                non_blank(&registration.payment_status),
                payment_status_label,
            ));

            let amount = non_blank(&registration.payment_amount).or_else(|| {
                event
                    .payment_required
                    .then(|| non_blank(&event.payment_amount))
                    .flatten()
            });
            row.push(or_na_with(amount, |a| format_amount(&self.currency_symbol, a)));

            row.push(or_na(non_blank(&registration.payment_screenshot_url)));
        }

        row.push(if missing.is_empty() {
            String::new()
        } else {
            format!("Missing required field(s): {}", missing.join(", "))
        });

        row
    }

    fn timestamp_cell(&self, raw: &Option<String>) -> String {
        or_na_with(non_blank(raw), |ts| format_timestamp(ts, self.time_zone))
    }
}

fn build_headers(columns: &[CustomColumn], include_payment: bool) -> Vec<String> {
    let mut headers: Vec<String> = FIXED_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend(columns.iter().map(|c| c.label.clone()));
    if include_payment {
        headers.extend(PAYMENT_HEADERS.iter().map(|h| h.to_string()));
    }
    headers.push(NOTES_HEADER.to_string());
    headers
}

/// Placeholder row for a registration that could not be read. The serial
/// number and the notes column stay meaningful.
fn error_row(index: usize, width: usize, reason: &str) -> Vec<String> {
    let mut row = vec![ERROR_CELL.to_string(); width];
    row[0] = (index + 1).to_string();
    if let Some(notes) = row.last_mut() {
        *notes = format!("Could not read registration: {reason}");
    }
    row
}

fn or_na(value: Option<&str>) -> String {
    value.unwrap_or(NOT_AVAILABLE).to_string()
}

fn or_na_with(value: Option<&str>, render: impl FnOnce(&str) -> String) -> String {
    value.map(render).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
