use serde::Deserialize;

/// Listing filter for patients. Matches `last_name` as a case-insensitive substring.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PatientFilter {
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DoctorFilter {
    pub last_name: Option<String>,
    /// Staff accounts (administrators) are hidden from the doctor list unless set.
    #[serde(default)]
    pub include_staff: bool,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct VisitFilter {
    /// Substring of the stored date/time text, e.g. `2030-01-02` or `10:30`.
    pub date_time: Option<String>,
    /// Past visits are hidden unless set.
    #[serde(default)]
    pub include_past: bool,
}

impl PatientFilter {
    pub fn by_last_name(last_name: impl Into<String>) -> Self {
        Self {
            last_name: Some(last_name.into()),
        }
    }
}

/// Builds a `LIKE` pattern for a substring search, escaping wildcards.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
