use std::fmt;

use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::reference::{ReferenceData, ReferenceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteCategory {
    AcademicOnly,
    CommunityOnly,
    Mixed,
    NoFacilityData,
}

impl SiteCategory {
    pub const ALL: [SiteCategory; 4] = [
        SiteCategory::AcademicOnly,
        SiteCategory::CommunityOnly,
        SiteCategory::Mixed,
        SiteCategory::NoFacilityData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SiteCategory::AcademicOnly => "academic_only",
            SiteCategory::CommunityOnly => "community_only",
            SiteCategory::Mixed => "mixed",
            SiteCategory::NoFacilityData => "no_facility_data",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SiteCategory::AcademicOnly => "Academic sites only",
            SiteCategory::CommunityOnly => "Community sites only",
            SiteCategory::Mixed => "Mixed (academic + community)",
            SiteCategory::NoFacilityData => "No facility data",
        }
    }
}

impl fmt::Display for SiteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-trial site counts behind a [`SiteCategory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteCounts {
    pub academic: usize,
    pub community: usize,
}

impl SiteCounts {
    pub fn category(self) -> SiteCategory {
        match (self.academic, self.community) {
            (0, 0) => SiteCategory::NoFacilityData,
            (_, 0) => SiteCategory::AcademicOnly,
            (0, _) => SiteCategory::CommunityOnly,
            _ => SiteCategory::Mixed,
        }
    }
}

/// Academic-site detector: a single case-insensitive union of all configured
/// patterns, matched anywhere in the facility name.
pub struct FacilityClassifier {
    union: Option<Regex>,
    rules: RegexSet,
    labels: Vec<String>,
}

impl FacilityClassifier {
    pub fn new(reference: &ReferenceData) -> Result<Self, ReferenceError> {
        let patterns: Vec<&str> = reference.facilities.iter().map(|r| r.pattern.as_str()).collect();
        let rules = RegexSetBuilder::new(&patterns).case_insensitive(true).build()?;
        let union = if patterns.is_empty() {
            None
        } else {
            let joined = patterns.iter().map(|p| format!("(?:{})", p)).collect::<Vec<_>>().join("|");
            Some(RegexBuilder::new(&joined).case_insensitive(true).build()?)
        };
        Ok(FacilityClassifier {
            union,
            rules,
            labels: reference.facilities.iter().map(|r| r.label.clone()).collect(),
        })
    }

    pub fn is_academic(&self, facility: &str) -> bool {
        self.union.as_ref().is_some_and(|re| re.is_match(facility))
    }

    /// Label of the first rule (in file order) matching `facility`.
    pub fn matching_rule(&self, facility: &str) -> Option<&str> {
        self.rules
            .matches(facility)
            .iter()
            .next()
            .map(|idx| self.labels[idx].as_str())
    }

    pub fn count<S: AsRef<str>>(&self, facilities: &[S]) -> SiteCounts {
        let academic = facilities
            .iter()
            .map(AsRef::as_ref)
            .filter(|f| {
                let hit = self.is_academic(f);
                if hit {
                    trace!(facility = *f, rule = ?self.matching_rule(f), "Academic site");
                }
                hit
            })
            .count();
        SiteCounts {
            academic,
            community: facilities.len() - academic,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::reference::FacilityRule;

    fn builtin() -> FacilityClassifier {
        FacilityClassifier::new(&ReferenceData::builtin().unwrap()).unwrap()
    }

    #[test]
    fn trial_categories() {
        let c = builtin();
        let none: [&str; 0] = [];
        assert_eq!(c.count(&none).category(), SiteCategory::NoFacilityData);
        assert_eq!(c.count(&["MD Anderson Cancer Center"]).category(), SiteCategory::AcademicOnly);
        assert_eq!(c.count(&["Community Oncology Clinic"]).category(), SiteCategory::CommunityOnly);
        assert_eq!(
            c.count(&["MD Anderson Cancer Center", "Community Oncology Clinic"]).category(),
            SiteCategory::Mixed
        );
    }

    #[test]
    fn generic_vocabulary_is_unanchored_and_case_insensitive() {
        let c = builtin();
        assert!(c.is_academic("UNIVERSITY OF IOWA HOSPITALS"));
        assert!(c.is_academic("Universitätsklinikum Heidelberg"));
        assert!(c.is_academic("Clínica Universidad de Navarra"));
        // no alternative covers "universitaire"
        assert!(!c.is_academic("Centre Hospitalier Universitaire de Nantes"));
        assert!(c.is_academic("St. Jude Children's Research Hospital"));
        assert!(c.is_academic("Boston VA Medical Center"));
        assert!(c.is_academic("Univ of Chicago"));
        assert!(!c.is_academic("Universal Oncology Partners"));
        assert!(!c.is_academic("Northside Hospital"));
    }

    #[test]
    fn named_centres() {
        let c = builtin();
        assert!(c.is_academic("Memorial Sloan Kettering Cancer Center"));
        assert!(c.is_academic("Dana-Farber Cancer Institute"));
        assert!(c.is_academic("Fred Hutchinson Cancer Center"));
        assert_eq!(c.matching_rule("Mayo Clinic in Rochester"), Some("named centre"));
    }

    #[test]
    fn first_matching_rule_reported() {
        let c = builtin();
        assert_eq!(c.matching_rule("Stanford University"), Some("university"));
        assert_eq!(c.matching_rule("Northside Hospital"), None);
    }

    #[test]
    fn alternate_reference_data() {
        let data = ReferenceData {
            facilities: vec![FacilityRule {
                label: "clinic".into(),
                pattern: "clinic".into(),
            }],
            ..Default::default()
        };
        let c = FacilityClassifier::new(&data).unwrap();
        assert!(c.is_academic("Community Oncology Clinic"));
        assert!(!c.is_academic("MD Anderson Cancer Center"));

        let empty = FacilityClassifier::new(&ReferenceData::default()).unwrap();
        assert!(!empty.is_academic("Stanford University"));
        assert_eq!(empty.count(&["Stanford University"]).category(), SiteCategory::CommunityOnly);
    }

    #[test]
    fn invalid_pattern_rejected() {
        let data = ReferenceData {
            facilities: vec![FacilityRule {
                label: "broken".into(),
                pattern: "(unclosed".into(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            FacilityClassifier::new(&data),
            Err(ReferenceError::Pattern(_))
        ));
    }
}
