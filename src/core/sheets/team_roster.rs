//! Builds the "Team Members" tab: one row for each team leader followed by
//! one row per member.

use super::sheet_models::{SheetData, NOT_AVAILABLE};
use crate::core::registrations::registration_models::non_blank;
use crate::core::registrations::Registration;

pub const TEAM_HEADERS: [&str; 9] = [
    "Team #",
    "Team Name",
    "Role",
    "Name",
    "Email",
    "Phone",
    "Student ID",
    "Department",
    "Year",
];

/// Registrations that represent a team: either they list members or they
/// carry a team name.
pub fn is_team_registration(registration: &Registration) -> bool {
    registration.has_team() || registration.team_name().is_some()
}

pub fn build_team_roster(registrations: &[Registration]) -> SheetData {
    let mut rows = Vec::new();

    for (team_index, registration) in registrations
        .iter()
        .filter(|r| is_team_registration(r))
        .enumerate()
    {
        let team_number = (team_index + 1).to_string();
        let team_name = registration
            .team_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Team {}", team_index + 1));

        rows.push(vec![
            team_number.clone(),
            team_name.clone(),
            "Leader".to_string(),
            na(registration.name()),
            na(registration.email()),
            na(non_blank(&registration.phone)),
            na(non_blank(&registration.student_id)),
            na(registration.department()),
            na(registration.year()),
        ]);

        for member in registration.team_members() {
            rows.push(vec![
                team_number.clone(),
                team_name.clone(),
                non_blank(&member.role).unwrap_or("Member").to_string(),
                na(non_blank(&member.name)),
                na(non_blank(&member.email)),
                na(non_blank(&member.phone)),
                na(non_blank(&member.student_id)),
                na(non_blank(&member.department)),
                na(non_blank(&member.year)),
            ]);
        }
    }

    SheetData {
        headers: TEAM_HEADERS.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}

fn na(value: Option<&str>) -> String {
    value.unwrap_or(NOT_AVAILABLE).to_string()
}
