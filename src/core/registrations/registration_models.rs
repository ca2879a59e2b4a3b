// Registration domain models.
//
// Payloads come from a web frontend whose schema has drifted over time, so
// every type here is deliberately forgiving on the way in:
// - keys are accepted in camelCase and snake_case; when a payload carries
//   several spellings of one key, the camelCase one wins
// - scalar fields accept strings, numbers and booleans
// - unknown keys are collected into `extra` instead of being rejected
//
// Nothing in this file talks to Google. The sheet builders only see these types.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// LENIENT FIELD HELPERS
// ============================================================================

/// Accepts a string, number or boolean and renders it as a string.
/// `null` and a missing key both become `None`. Objects and arrays are an error.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a text value, found {}",
            value_kind(&other)
        ))),
    }
}

/// Booleans sometimes arrive as "true"/"yes"/1 from form posts.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "1"
        ),
        _ => false,
    })
}

/// Treats an explicit `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Returns the trimmed value if it has any content.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Canonical key and the other spellings clients have used for it.
pub(crate) type KeyAliases = &'static [(&'static str, &'static [&'static str])];

/// Rewrites alternate spellings in `value` to their canonical key.
///
/// A non-null canonical key wins; otherwise the first non-null alternate in
/// listed order is moved to the canonical key. Every other spelling is
/// dropped, so typed deserialization never sees the same field twice.
pub(crate) fn canonicalize_keys(value: &mut Value, aliases: KeyAliases) {
    let Some(object) = value.as_object_mut() else {
        return;
    };

    for (canonical, alternates) in aliases {
        let has_canonical = object.get(*canonical).map_or(false, |v| !v.is_null());
        let mut replacement = None;

        for alternate in *alternates {
            if let Some(found) = object.remove(*alternate) {
                if !has_canonical && replacement.is_none() && !found.is_null() {
                    replacement = Some(found);
                }
            }
        }

        if let Some(found) = replacement {
            object.insert((*canonical).to_string(), found);
        }
    }
}

/// Deserializes through a `Value` so keys can be canonicalized first.
fn deserialize_canonical<'de, D, T>(
    deserializer: D,
    aliases: KeyAliases,
    typed: impl FnOnce(Value) -> Result<T, serde_json::Error>,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
{
    let mut value = Value::deserialize(deserializer)?;
    canonicalize_keys(&mut value, aliases);
    typed(value).map_err(D::Error::custom)
}

pub(crate) const EVENT_KEYS: KeyAliases = &[
    ("title", &["name"]),
    (
        "customFieldDefs",
        &["customFields", "custom_fields", "custom_field_defs"],
    ),
    (
        "paymentRequired",
        &["requiresPayment", "requires_payment", "payment_required"],
    ),
    ("paymentAmount", &["payment_amount"]),
    (
        "participationMode",
        &["participationType", "participation_type", "participation_mode"],
    ),
];

pub(crate) const TEAM_MEMBER_KEYS: KeyAliases = &[
    ("name", &["participantName", "participant_name"]),
    ("email", &["participantEmail", "participant_email"]),
    ("studentId", &["student_id"]),
];

pub(crate) const ADDITIONAL_INFO_KEYS: KeyAliases = &[
    ("teamName", &["team_name"]),
    ("teamMembers", &["team_members"]),
    (
        "customFieldValues",
        &["custom_field_values", "customFields", "custom_fields"],
    ),
];

pub(crate) const REGISTRATION_KEYS: KeyAliases = &[
    ("participantName", &["participant_name"]),
    ("participantEmail", &["participant_email"]),
    ("phone", &["participantPhone", "participant_phone"]),
    ("studentId", &["student_id"]),
    ("registrationType", &["registration_type"]),
    ("createdAt", &["created_at"]),
    ("attendanceStatus", &["attendance_status"]),
    ("attendanceTimestamp", &["attendance_timestamp"]),
    ("paymentStatus", &["payment_status"]),
    ("paymentAmount", &["payment_amount"]),
    ("paymentScreenshotUrl", &["payment_screenshot_url"]),
    ("additionalInfo", &["additional_info"]),
];

// ============================================================================
// EVENT
// ============================================================================

/// How participants may sign up for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticipationMode {
    #[default]
    Solo,
    Team,
    Both,
}

impl ParticipationMode {
    pub fn allows_teams(self) -> bool {
        matches!(self, ParticipationMode::Team | ParticipationMode::Both)
    }
}

impl<'de> Deserialize<'de> for ParticipationMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Unknown modes fall back to solo rather than failing the whole event.
        let raw = lenient_string(deserializer)?;
        Ok(match raw.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            Some(mode) if mode == "team" => ParticipationMode::Team,
            Some(mode) if mode == "both" => ParticipationMode::Both,
            _ => ParticipationMode::Solo,
        })
    }
}

/// A single event-defined registration attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFieldDef {
    pub id: String,
    pub label: String,
    pub field_type: String,
}

/// A custom field entry that could not be used as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFieldDef {
    /// Zero-based position in the submitted list.
    pub position: usize,
    /// The id, if the entry had a usable one.
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDefEntry {
    Valid(CustomFieldDef),
    Invalid(InvalidFieldDef),
}

/// The event's custom field definitions, parsed entry by entry.
///
/// Deserializing this never fails: a value that is not a list becomes an empty
/// list (remembered via [`CustomFieldList::was_list`]), and each bad element is
/// kept as [`FieldDefEntry::Invalid`] so callers can choose between lenient
/// filtering and strict rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFieldList {
    entries: Vec<FieldDefEntry>,
    was_list: bool,
}

impl Default for CustomFieldList {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            was_list: true,
        }
    }
}

impl CustomFieldList {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::Array(items) => Self {
                entries: items
                    .iter()
                    .enumerate()
                    .map(|(position, item)| parse_field_def(position, item))
                    .collect(),
                was_list: true,
            },
            _ => Self {
                entries: Vec::new(),
                was_list: false,
            },
        }
    }

    pub fn entries(&self) -> &[FieldDefEntry] {
        &self.entries
    }

    /// False when the payload carried something other than a list or null.
    pub fn was_list(&self) -> bool {
        self.was_list
    }

    pub fn invalid(&self) -> impl Iterator<Item = &InvalidFieldDef> {
        self.entries.iter().filter_map(|entry| match entry {
            FieldDefEntry::Invalid(bad) => Some(bad),
            FieldDefEntry::Valid(_) => None,
        })
    }
}

impl<'de> Deserialize<'de> for CustomFieldList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
        Ok(Self::from_value(&value))
    }
}

fn parse_field_def(position: usize, item: &Value) -> FieldDefEntry {
    let Some(object) = item.as_object() else {
        return FieldDefEntry::Invalid(InvalidFieldDef {
            position,
            id: None,
            reason: format!("expected an object, found {}", value_kind(item)),
        });
    };

    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let id = text("id");
    let label = text("label");

    match (id, label) {
        (Some(id), Some(label)) => FieldDefEntry::Valid(CustomFieldDef {
            id,
            label,
            field_type: text("type").unwrap_or_else(|| "text".to_string()),
        }),
        (id, label) => {
            let reason = match (&id, &label) {
                (None, None) => "missing id and label",
                (None, Some(_)) => "missing id",
                _ => "missing label",
            };
            FieldDefEntry::Invalid(InvalidFieldDef {
                position,
                id,
                reason: reason.to_string(),
            })
        }
    }
}

/// The event a spreadsheet is generated for.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", remote = "Self")]
pub struct EventDescriptor {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,

    #[serde(default)]
    pub custom_field_defs: CustomFieldList,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub payment_required: bool,

    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_amount: Option<String>,

    #[serde(default)]
    pub participation_mode: ParticipationMode,

    /// Keys this service does not know about. Kept, never interpreted.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl<'de> Deserialize<'de> for EventDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_canonical(deserializer, EVENT_KEYS, EventDescriptor::deserialize)
    }
}

impl EventDescriptor {
    pub fn title(&self) -> Option<&str> {
        non_blank(&self.title)
    }
}

// ============================================================================
// REGISTRATION
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", remote = "Self")]
pub struct TeamMember {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub student_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
}

impl<'de> Deserialize<'de> for TeamMember {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_canonical(deserializer, TEAM_MEMBER_KEYS, TeamMember::deserialize)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", remote = "Self")]
pub struct AdditionalInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub team_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub team_members: Vec<TeamMember>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_field_values: HashMap<String, Value>,
    /// Older clients put custom answers directly on `additional_info`.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl<'de> Deserialize<'de> for AdditionalInfo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_canonical(deserializer, ADDITIONAL_INFO_KEYS, AdditionalInfo::deserialize)
    }
}

/// One participant's registration for an event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", remote = "Self")]
pub struct Registration {
    #[serde(default, deserialize_with = "lenient_string")]
    pub participant_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub participant_email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub student_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub registration_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub attendance_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub attendance_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_screenshot_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_info: AdditionalInfo,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl<'de> Deserialize<'de> for Registration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_canonical(deserializer, REGISTRATION_KEYS, Registration::deserialize)
    }
}

/// A registration element that could not be read at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed registration: {0}")]
pub struct MalformedRegistration(pub String);

/// The readable registrations of a request and how many elements were not.
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub registrations: Vec<Registration>,
    pub malformed: usize,
}

impl Registration {
    pub fn from_value(value: &Value) -> Result<Self, MalformedRegistration> {
        if !value.is_object() {
            return Err(MalformedRegistration(format!(
                "expected an object, found {}",
                value_kind(value)
            )));
        }

        serde_json::from_value(value.clone()).map_err(|e| MalformedRegistration(e.to_string()))
    }

    /// Parses a batch. Unreadable elements are counted, not kept.
    pub fn parse_batch(values: &[Value]) -> ParsedBatch {
        let mut batch = ParsedBatch::default();
        for value in values {
            match Registration::from_value(value) {
                Ok(registration) => batch.registrations.push(registration),
                Err(_) => batch.malformed += 1,
            }
        }
        batch
    }

    pub fn name(&self) -> Option<&str> {
        non_blank(&self.participant_name)
    }

    pub fn email(&self) -> Option<&str> {
        non_blank(&self.participant_email)
    }

    /// Top-level department, falling back to the one inside `additional_info`.
    pub fn department(&self) -> Option<&str> {
        non_blank(&self.department).or_else(|| non_blank(&self.additional_info.department))
    }

    pub fn year(&self) -> Option<&str> {
        non_blank(&self.year).or_else(|| non_blank(&self.additional_info.year))
    }

    pub fn team_name(&self) -> Option<&str> {
        non_blank(&self.additional_info.team_name)
    }

    pub fn team_members(&self) -> &[TeamMember] {
        &self.additional_info.team_members
    }

    pub fn has_team(&self) -> bool {
        !self.additional_info.team_members.is_empty()
    }

    pub fn has_payment_info(&self) -> bool {
        non_blank(&self.payment_status).is_some()
            || non_blank(&self.payment_amount).is_some()
            || non_blank(&self.payment_screenshot_url).is_some()
    }

    /// The submitted answer for a custom field, if any.
    pub fn custom_value(&self, field_id: &str) -> Option<&Value> {
        let info = &self.additional_info;
        info.custom_field_values
            .get(field_id)
            .or_else(|| info.extra.get(field_id))
    }
}
