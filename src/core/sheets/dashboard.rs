// Dashboard aggregates.
//
// Everything here is pure: registrations in, label/value rows out. Team
// members count as participants in their own right, so a team of four adds
// four to the department and year breakdowns, not one.

use std::collections::HashMap;

use super::cell_format::title_case;
use crate::core::registrations::registration_models::non_blank;
use crate::core::registrations::Registration;

const UNKNOWN: &str = "Unknown";

const ATTENDED_STATUSES: [&str; 3] = ["present", "attended", "checked_in"];

const PAID_STATUSES: [&str; 4] = ["verified", "paid", "completed", "success"];

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    /// Every submitted registration, including ones that could not be read.
    pub total_registrations: usize,
    /// Registrations that show up as error rows on the Registrations tab.
    pub unreadable: usize,
    /// Registrants plus every listed team member.
    pub total_participants: usize,
    pub attended: usize,
    /// Percentage of registrations marked as attended.
    pub attendance_rate: f64,
    pub by_department: Vec<(String, usize)>,
    pub by_year: Vec<(String, usize)>,
    pub by_registration_type: Vec<(String, usize)>,
    /// Only present when at least one registration carries payment data.
    pub verified_payments: Option<usize>,
}

/// Rows for the dashboard tab plus the indices of section heading rows,
/// which the formatter styles differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardLayout {
    pub rows: Vec<Vec<String>>,
    pub section_rows: Vec<usize>,
}

fn is_attended(registration: &Registration) -> bool {
    non_blank(&registration.attendance_status)
        .map(|s| ATTENDED_STATUSES.contains(&s.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_paid(registration: &Registration) -> bool {
    non_blank(&registration.payment_status)
        .map(|s| PAID_STATUSES.contains(&s.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Sorts by count descending, then label ascending so output is stable.
fn sorted_counts(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

fn bump(counts: &mut HashMap<String, usize>, key: Option<&str>) {
    *counts.entry(key.unwrap_or(UNKNOWN).to_string()).or_insert(0) += 1;
}

/// `unreadable` counts submitted registrations that never made it into
/// `registrations`, so the totals match the Registrations tab.
pub fn summarize(registrations: &[Registration], unreadable: usize) -> DashboardSummary {
    let mut by_department = HashMap::new();
    let mut by_year = HashMap::new();
    let mut by_type = HashMap::new();
    let mut total_participants = 0;

    for registration in registrations {
        total_participants += 1;
        bump(&mut by_department, registration.department());
        bump(&mut by_year, registration.year());

        let kind = non_blank(&registration.registration_type).map(title_case);
        bump(&mut by_type, kind.as_deref());

        for member in registration.team_members() {
            total_participants += 1;
            bump(&mut by_department, non_blank(&member.department));
            bump(&mut by_year, non_blank(&member.year));
        }
    }

    let total_registrations = registrations.len() + unreadable;
    let attended = registrations.iter().filter(|r| is_attended(r)).count();
    let attendance_rate = if total_registrations == 0 {
        0.0
    } else {
        attended as f64 * 100.0 / total_registrations as f64
    };

    let verified_payments = registrations
        .iter()
        .any(Registration::has_payment_info)
        .then(|| registrations.iter().filter(|r| is_paid(r)).count());

    DashboardSummary {
        total_registrations,
        unreadable,
        total_participants: total_participants + unreadable,
        attended,
        attendance_rate,
        by_department: sorted_counts(by_department),
        by_year: sorted_counts(by_year),
        by_registration_type: sorted_counts(by_type),
        verified_payments,
    }
}

impl DashboardSummary {
    pub fn attendance_rate_label(&self) -> String {
        format!("{:.1}%", self.attendance_rate)
    }

    /// Two-column label/value rows, ready to write from cell A1.
    pub fn to_layout(&self, event_title: &str, generated_at: &str) -> DashboardLayout {
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut section_rows = Vec::new();

        let pair = |label: &str, value: String| vec![label.to_string(), value];

        rows.push(vec![format!("{event_title} - Dashboard")]);
        rows.push(vec![generated_at.to_string()]);
        rows.push(Vec::new());

        section_rows.push(rows.len());
        rows.push(vec!["Overview".to_string(), "Value".to_string()]);
        rows.push(pair("Total Registrations", self.total_registrations.to_string()));
        rows.push(pair("Total Participants", self.total_participants.to_string()));
        if self.unreadable > 0 {
            rows.push(pair("Unreadable Registrations", self.unreadable.to_string()));
        }
        rows.push(pair("Attended", self.attended.to_string()));
        rows.push(pair(
            "Not Attended",
            (self.total_registrations - self.attended).to_string(),
        ));
        rows.push(pair("Attendance Rate", self.attendance_rate_label()));
        if let Some(paid) = self.verified_payments {
            rows.push(pair("Verified Payments", paid.to_string()));
        }

        let sections = [
            ("By Department", &self.by_department),
            ("By Year", &self.by_year),
            ("By Registration Type", &self.by_registration_type),
        ];
        for (heading, counts) in sections {
            rows.push(Vec::new());
            section_rows.push(rows.len());
            rows.push(vec![heading.to_string(), "Count".to_string()]);
            for (label, count) in counts {
                rows.push(pair(label.as_str(), count.to_string()));
            }
        }

        DashboardLayout { rows, section_rows }
    }
}
