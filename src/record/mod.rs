pub mod lookup;
pub mod sites;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use lookup::{items_at, list_at, text_at};

/// Separator for multi-valued cells. Elements must not contain it; nothing is escaped.
pub const LIST_DELIMITER: &str = "|";

pub const STUDY_URL_PREFIX: &str = "https://clinicaltrials.gov/study/";

/// Export column order. Matches the field order of [`Row`].
pub const COLUMNS: [&str; 24] = [
    "nct_id",
    "brief_title",
    "official_title",
    "overall_status",
    "phase",
    "study_type",
    "enrollment",
    "enrollment_type",
    "start_date",
    "completion_date",
    "last_update_post_date",
    "lead_sponsor",
    "lead_sponsor_class",
    "collaborators",
    "conditions",
    "keywords",
    "interventions",
    "primary_outcomes",
    "secondary_outcomes",
    "sex",
    "min_age",
    "max_age",
    "healthy_volunteers",
    "study_url",
];

/// One flattened trial. Every field is always present; missing data is "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub nct_id: String,
    pub brief_title: String,
    pub official_title: String,
    pub overall_status: String,
    pub phase: String,
    pub study_type: String,
    pub enrollment: String,
    pub enrollment_type: String,
    pub start_date: String,
    pub completion_date: String,
    pub last_update_post_date: String,
    pub lead_sponsor: String,
    pub lead_sponsor_class: String,
    pub collaborators: String,
    pub conditions: String,
    pub keywords: String,
    pub interventions: String,
    pub primary_outcomes: String,
    pub secondary_outcomes: String,
    pub sex: String,
    pub min_age: String,
    pub max_age: String,
    pub healthy_volunteers: String,
    pub study_url: String,
}

/// Split a multi-valued cell back into its elements.
pub fn split_list(cell: &str) -> Vec<&str> {
    if cell.is_empty() {
        Vec::new()
    } else {
        cell.split(LIST_DELIMITER).collect()
    }
}

/// Flatten one study document into a [`Row`]. Never fails.
pub fn flatten(study: &Value) -> Row {
    let proto = lookup::protocol(study);
    let text = |path: &[&str]| text_at(proto, path).unwrap_or_default();
    let names = |path: &[&str], key: &str| -> String {
        items_at(proto, path)
            .iter()
            .map(|item| text_at(item, &[key]).unwrap_or_default())
            .join(LIST_DELIMITER)
    };

    let nct_id = text(&["identificationModule", "nctId"]);
    let study_url = if nct_id.trim().is_empty() {
        String::new()
    } else {
        format!("{}{}", STUDY_URL_PREFIX, nct_id.trim())
    };

    let interventions = items_at(proto, &["armsInterventionsModule", "interventions"])
        .iter()
        .map(|i| {
            format!(
                "{}:{}",
                text_at(i, &["type"]).unwrap_or_default(),
                text_at(i, &["name"]).unwrap_or_default()
            )
        })
        .join(LIST_DELIMITER);

    Row {
        brief_title: text(&["identificationModule", "briefTitle"]),
        official_title: text(&["identificationModule", "officialTitle"]),
        overall_status: text(&["statusModule", "overallStatus"]),
        phase: list_at(proto, &["designModule", "phases"]).join(LIST_DELIMITER),
        study_type: text(&["designModule", "studyType"]),
        enrollment: text(&["designModule", "enrollmentInfo", "count"]),
        enrollment_type: text(&["designModule", "enrollmentInfo", "type"]),
        start_date: text(&["statusModule", "startDateStruct", "date"]),
        completion_date: text(&["statusModule", "completionDateStruct", "date"]),
        last_update_post_date: text(&["statusModule", "lastUpdatePostDateStruct", "date"]),
        lead_sponsor: text(&["sponsorCollaboratorsModule", "leadSponsor", "name"]),
        lead_sponsor_class: text(&["sponsorCollaboratorsModule", "leadSponsor", "class"]),
        collaborators: names(&["sponsorCollaboratorsModule", "collaborators"], "name"),
        conditions: list_at(proto, &["conditionsModule", "conditions"]).join(LIST_DELIMITER),
        keywords: list_at(proto, &["conditionsModule", "keywords"]).join(LIST_DELIMITER),
        interventions,
        primary_outcomes: names(&["outcomesModule", "primaryOutcomes"], "measure"),
        secondary_outcomes: names(&["outcomesModule", "secondaryOutcomes"], "measure"),
        sex: text(&["eligibilityModule", "sex"]),
        min_age: text(&["eligibilityModule", "minimumAge"]),
        max_age: text(&["eligibilityModule", "maximumAge"]),
        healthy_volunteers: text(&["eligibilityModule", "healthyVolunteers"]),
        study_url,
        nct_id,
    }
}

// ── Tests ──
