use chrono::NaiveDate;
use thiserror::Error;

pub const VALID_STATUSES: &[&str] = &[
    "RECRUITING",
    "NOT_YET_RECRUITING",
    "ENROLLING_BY_INVITATION",
    "ACTIVE_NOT_RECRUITING",
    "SUSPENDED",
    "TERMINATED",
    "COMPLETED",
    "WITHDRAWN",
];

pub const VALID_PHASES: &[&str] = &["EARLY_PHASE1", "PHASE1", "PHASE2", "PHASE3", "PHASE4", "NA"];

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Invalid {kind}: {value}\nValid {kind} values: {accepted}")]
    InvalidValue {
        kind: &'static str,
        value: String,
        accepted: String,
    },
    #[error("Invalid date: {value} (expected YYYY-MM-DD)")]
    InvalidDate { value: String },
}

/// Filters for the `/studies` search endpoint. Unset fields are not sent.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub condition: Option<String>,
    pub intervention: Option<String>,
    pub term: Option<String>,
    pub sponsor: Option<String>,
    pub location: Option<String>,
    pub statuses: Vec<String>,
    pub phases: Vec<String>,
    pub advanced: Option<String>,
    pub sort: Option<String>,
    pub page_size: u32,
}

impl SearchQuery {
    pub fn new(page_size: u32) -> Self {
        SearchQuery {
            page_size,
            ..Default::default()
        }
    }

    /// Parse and validate a comma-separated status list (`--status`).
    pub fn with_statuses(mut self, raw: &str) -> Result<Self, QueryError> {
        self.statuses = parse_list(raw, VALID_STATUSES, "status")?;
        Ok(self)
    }

    /// Parse and validate a comma-separated phase list (`--phase`).
    pub fn with_phases(mut self, raw: &str) -> Result<Self, QueryError> {
        self.phases = parse_list(raw, VALID_PHASES, "phase")?;
        Ok(self)
    }

    /// Restrict to trials starting in the inclusive date range.
    pub fn with_start_range(mut self, from: &str, to: &str) -> Result<Self, QueryError> {
        let from = parse_date(from)?;
        let to = parse_date(to)?;
        self.advanced = Some(format!(
            "AREA[StartDate]RANGE[{}, {}]",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        ));
        Ok(self)
    }

    /// Request parameters shared by every page of a search.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("format".to_string(), "json".to_string()),
            ("pageSize".to_string(), self.page_size.to_string()),
        ];
        let optional = [
            ("query.cond", &self.condition),
            ("query.intr", &self.intervention),
            ("query.term", &self.term),
            ("query.spons", &self.sponsor),
            ("query.locn", &self.location),
            ("filter.advanced", &self.advanced),
            ("sort", &self.sort),
        ];
        for (key, value) in optional {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                params.push((key.to_string(), v.to_string()));
            }
        }
        if !self.statuses.is_empty() {
            params.push(("filter.overallStatus".to_string(), self.statuses.join(",")));
        }
        if !self.phases.is_empty() {
            params.push(("filter.phase".to_string(), self.phases.join(",")));
        }
        params
    }
}

fn parse_list(raw: &str, valid: &[&str], kind: &'static str) -> Result<Vec<String>, QueryError> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .map(|s| {
            if valid.contains(&s.as_str()) {
                Ok(s)
            } else {
                Err(QueryError::InvalidValue {
                    kind,
                    value: s,
                    accepted: valid.join(", "),
                })
            }
        })
        .collect()
}

fn parse_date(raw: &str) -> Result<NaiveDate, QueryError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| QueryError::InvalidDate {
        value: raw.to_string(),
    })
}

/// Uppercase an NCT identifier and add the `NCT` prefix when missing.
pub fn normalize_nct_id(raw: &str) -> String {
    let id = raw.trim().to_uppercase();
    if id.starts_with("NCT") {
        id
    } else {
        format!("NCT{}", id)
    }
}
