//! Human-readable study views for the `search` and `study` commands. Unlike
//! the export row, absent fields read "N/A" here.

use std::fmt::Write;

use serde_json::Value;

use crate::record::lookup::{at, items_at, list_at, protocol, text_at};

const NA: &str = "N/A";
const SUMMARY_CHARS: usize = 200;
const MAX_LOCATIONS: usize = 10;

fn or_na(value: &Value, path: &[&str]) -> String {
    text_at(value, path).unwrap_or_else(|| NA.to_string())
}

fn or_blank(value: &Value, path: &[&str]) -> String {
    text_at(value, path).unwrap_or_default()
}

/// Compact multi-line summary used in search results.
pub fn format_summary(study: &Value) -> String {
    let proto = protocol(study);
    let phase = list_at(proto, &["designModule", "phases"])
        .into_iter()
        .next()
        .unwrap_or_else(|| NA.to_string());
    let sex = or_na(proto, &["eligibilityModule", "sex"]);
    let min_age = or_na(proto, &["eligibilityModule", "minimumAge"]);
    let max_age = or_na(proto, &["eligibilityModule", "maximumAge"]);

    let mut lines = vec![
        format!(
            "  {}  {}",
            or_na(proto, &["identificationModule", "nctId"]),
            or_na(proto, &["identificationModule", "briefTitle"])
        ),
        format!(
            "  Status: {}  |  Phase: {}  |  Enrollment: {}",
            or_na(proto, &["statusModule", "overallStatus"]),
            phase,
            or_na(proto, &["designModule", "enrollmentInfo", "count"])
        ),
        format!("  Sponsor: {}", or_na(proto, &["sponsorCollaboratorsModule", "leadSponsor", "name"])),
        format!(
            "  Dates: {} → {}",
            or_na(proto, &["statusModule", "startDateStruct", "date"]),
            or_na(proto, &["statusModule", "completionDateStruct", "date"])
        ),
    ];

    let conditions = list_at(proto, &["conditionsModule", "conditions"]);
    if !conditions.is_empty() {
        let shown: Vec<&str> = conditions.iter().take(5).map(String::as_str).collect();
        lines.push(format!("  Conditions: {}", shown.join(", ")));
    }
    if sex != "ALL" || min_age != NA || max_age != NA {
        lines.push(format!("  Eligibility: {}, {} - {}", sex, min_age, max_age));
    }
    let summary = or_blank(proto, &["descriptionModule", "briefSummary"]);
    if !summary.is_empty() {
        let mut short: String = summary.chars().take(SUMMARY_CHARS).collect::<String>().replace('\n', " ");
        if summary.chars().count() > SUMMARY_CHARS {
            short.push_str("...");
        }
        lines.push(format!("  Summary: {}", short));
    }
    lines.join("\n")
}

/// Full single-study report.
pub fn format_detail(study: &Value) -> String {
    let proto = protocol(study);
    let rule = "=".repeat(70);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "  {}  {}",
        or_na(proto, &["identificationModule", "nctId"]),
        or_na(proto, &["identificationModule", "briefTitle"])
    );
    let _ = writeln!(out, "{}", rule);

    if at(proto, &["identificationModule", "organization"]).is_some() {
        let _ = writeln!(
            out,
            "\nOrganization: {}",
            or_na(proto, &["identificationModule", "organization", "fullName"])
        );
    }
    let _ = writeln!(out, "Official Title: {}", or_na(proto, &["identificationModule", "officialTitle"]));

    let _ = writeln!(out, "\n--- Status ---");
    let _ = writeln!(out, "Overall Status: {}", or_na(proto, &["statusModule", "overallStatus"]));
    let _ = writeln!(out, "Start Date: {}", or_na(proto, &["statusModule", "startDateStruct", "date"]));
    let _ = writeln!(
        out,
        "Completion Date: {}",
        or_na(proto, &["statusModule", "completionDateStruct", "date"])
    );

    let _ = writeln!(out, "\n--- Design ---");
    let phases = list_at(proto, &["designModule", "phases"]);
    let _ = writeln!(
        out,
        "Phase: {}",
        if phases.is_empty() { NA.to_string() } else { phases.join(", ") }
    );
    let _ = writeln!(out, "Study Type: {}", or_na(proto, &["designModule", "studyType"]));
    let _ = writeln!(
        out,
        "Enrollment: {} ({})",
        or_na(proto, &["designModule", "enrollmentInfo", "count"]),
        or_blank(proto, &["designModule", "enrollmentInfo", "type"])
    );

    let conditions = list_at(proto, &["conditionsModule", "conditions"]);
    if !conditions.is_empty() {
        let _ = writeln!(out, "\n--- Conditions ---");
        for c in &conditions {
            let _ = writeln!(out, "  - {}", c);
        }
    }
    let keywords = list_at(proto, &["conditionsModule", "keywords"]);
    if !keywords.is_empty() {
        let _ = writeln!(out, "\n--- Keywords ---");
        let _ = writeln!(out, "  {}", keywords.join(", "));
    }

    let _ = writeln!(out, "\n--- Sponsors ---");
    let _ = writeln!(
        out,
        "Lead: {} ({})",
        or_na(proto, &["sponsorCollaboratorsModule", "leadSponsor", "name"]),
        or_blank(proto, &["sponsorCollaboratorsModule", "leadSponsor", "class"])
    );
    for c in items_at(proto, &["sponsorCollaboratorsModule", "collaborators"]) {
        let _ = writeln!(out, "Collaborator: {} ({})", or_na(c, &["name"]), or_blank(c, &["class"]));
    }

    for (title, key) in [
        ("Brief Summary", "briefSummary"),
        ("Detailed Description", "detailedDescription"),
    ] {
        let text = or_blank(proto, &["descriptionModule", key]);
        if !text.is_empty() {
            let _ = writeln!(out, "\n--- {} ---", title);
            let _ = writeln!(out, "{}", text);
        }
    }

    let _ = writeln!(out, "\n--- Eligibility ---");
    let _ = writeln!(out, "Sex: {}", or_na(proto, &["eligibilityModule", "sex"]));
    let _ = writeln!(out, "Min Age: {}", or_na(proto, &["eligibilityModule", "minimumAge"]));
    let _ = writeln!(out, "Max Age: {}", or_na(proto, &["eligibilityModule", "maximumAge"]));
    let _ = writeln!(
        out,
        "Healthy Volunteers: {}",
        or_na(proto, &["eligibilityModule", "healthyVolunteers"])
    );
    let criteria = or_blank(proto, &["eligibilityModule", "eligibilityCriteria"]);
    if !criteria.is_empty() {
        let _ = writeln!(out, "\nCriteria:\n{}", criteria);
    }

    let arms = items_at(proto, &["armsInterventionsModule", "armGroups"]);
    if !arms.is_empty() {
        let _ = writeln!(out, "\n--- Arms ---");
        for arm in arms {
            let _ = writeln!(out, "  [{}] {}", or_blank(arm, &["type"]), or_na(arm, &["label"]));
            let desc = or_blank(arm, &["description"]);
            if !desc.is_empty() {
                let _ = writeln!(out, "    {}", desc);
            }
        }
    }

    let interventions = items_at(proto, &["armsInterventionsModule", "interventions"]);
    if !interventions.is_empty() {
        let _ = writeln!(out, "\n--- Interventions ---");
        for intv in interventions {
            let _ = writeln!(out, "  [{}] {}", or_blank(intv, &["type"]), or_na(intv, &["name"]));
            let desc = or_blank(intv, &["description"]);
            if !desc.is_empty() {
                let _ = writeln!(out, "    {}", desc);
            }
        }
    }

    for (title, key) in [
        ("Primary Outcomes", "primaryOutcomes"),
        ("Secondary Outcomes", "secondaryOutcomes"),
    ] {
        let outcomes = items_at(proto, &["outcomesModule", key]);
        if outcomes.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n--- {} ---", title);
        for o in outcomes {
            let _ = writeln!(out, "  - {}", or_na(o, &["measure"]));
            let frame = or_blank(o, &["timeFrame"]);
            if !frame.is_empty() {
                let _ = writeln!(out, "    Time frame: {}", frame);
            }
        }
    }

    let locations = items_at(proto, &["contactsLocationsModule", "locations"]);
    if !locations.is_empty() {
        let _ = writeln!(out, "\n--- Locations ({}) ---", locations.len());
        for loc in locations.iter().take(MAX_LOCATIONS) {
            let place: Vec<String> = ["city", "state", "country"]
                .iter()
                .filter_map(|k| text_at(loc, &[*k]))
                .filter(|p| !p.is_empty())
                .collect();
            let _ = writeln!(
                out,
                "  - {}, {}  [{}]",
                or_na(loc, &["facility"]),
                place.join(", "),
                or_blank(loc, &["status"])
            );
        }
        if locations.len() > MAX_LOCATIONS {
            let _ = writeln!(out, "  ... and {} more locations", locations.len() - MAX_LOCATIONS);
        }
    }

    if let Some(results) = at(study, &["resultsSection"]).filter(|r| r.is_object()) {
        let _ = writeln!(out, "\n--- Results Available ---");
        if at(results, &["adverseEventsModule"]).is_some() {
            let _ = writeln!(out, "  Adverse events data: Yes");
        }
        let measures = items_at(results, &["outcomeMeasuresModule", "outcomeMeasures"]);
        if !measures.is_empty() {
            let _ = writeln!(out, "  Outcome measures: {}", measures.len());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture(name: &str) -> Value {
        let raw = std::fs::read_to_string(format!("tests/fixtures/{}.json", name)).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn summary_uses_na_defaults() {
        let text = format_summary(&json!({}));
        assert!(text.contains("  N/A  N/A"));
        assert!(text.contains("Status: N/A  |  Phase: N/A  |  Enrollment: N/A"));
        assert!(text.contains("Eligibility: N/A, N/A - N/A"));
        assert!(!text.contains("Conditions:"));
    }

    #[test]
    fn summary_shows_first_phase_and_truncates() {
        let text = format_summary(&fixture("nct05000001"));
        assert!(text.starts_with("  NCT05000001  Pembrolizumab"));
        assert!(text.contains("Phase: PHASE2  |  Enrollment: 450"));
        assert!(text.contains("Eligibility: ALL, 18 Years - N/A"));
        let summary = text.lines().find(|l| l.starts_with("  Summary:")).unwrap();
        assert!(summary.ends_with("..."));
        assert!(!summary.contains('\n'));
    }

    #[test]
    fn detail_sections() {
        let text = format_detail(&fixture("nct05000001"));
        assert!(text.contains("Phase: PHASE2, PHASE3"));
        assert!(text.contains("Lead: Merck Sharp & Dohme LLC (INDUSTRY)"));
        assert!(text.contains("Collaborator: Dana-Farber Cancer Institute (OTHER)"));
        assert!(text.contains("Healthy Volunteers: false"));
        assert!(text.contains("--- Locations (12) ---"));
        assert!(text.contains("... and 2 more locations"));
        assert!(text.contains("Time frame: Up to 5 years"));
        assert!(!text.contains("Results Available"));
    }

    #[test]
    fn detail_of_empty_document() {
        let text = format_detail(&json!({}));
        assert!(text.contains("Official Title: N/A"));
        assert!(text.contains("Phase: N/A"));
        assert!(!text.contains("--- Locations"));
    }
}
