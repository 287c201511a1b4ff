use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::reference::ReferenceData;

pub const INDUSTRY_CLASS: &str = "INDUSTRY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorTier {
    LargeCap,
    MidMarket,
    Emerging,
}

impl SponsorTier {
    pub const ALL: [SponsorTier; 3] = [SponsorTier::LargeCap, SponsorTier::MidMarket, SponsorTier::Emerging];

    pub fn as_str(self) -> &'static str {
        match self {
            SponsorTier::LargeCap => "large_cap",
            SponsorTier::MidMarket => "mid_market",
            SponsorTier::Emerging => "emerging",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SponsorTier::LargeCap => "Large Cap",
            SponsorTier::MidMarket => "Mid Market",
            SponsorTier::Emerging => "Emerging",
        }
    }
}

impl fmt::Display for SponsorTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a sponsor name was tiered. `reference` is the curated name that
/// matched; `ambiguous` is set when a rule of another tier also matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorMatch {
    pub tier: SponsorTier,
    pub reference: Option<String>,
    pub ambiguous: bool,
}

struct Rule {
    needle: String,
    name: String,
    tier: SponsorTier,
}

/// Ordered name rules: every large-cap name, then every mid-market name,
/// each in file order. The first rule matching in either direction wins.
pub struct SponsorClassifier {
    rules: Vec<Rule>,
}

impl SponsorClassifier {
    pub fn new(reference: &ReferenceData) -> Self {
        let tiered = [
            (SponsorTier::LargeCap, &reference.sponsors.large_cap),
            (SponsorTier::MidMarket, &reference.sponsors.mid_market),
        ];
        let rules = tiered
            .into_iter()
            .flat_map(|(tier, names)| names.iter().map(move |name| (tier, name)))
            .map(|(tier, name)| Rule {
                needle: name.trim().to_lowercase(),
                name: name.clone(),
                tier,
            })
            .filter(|r| !r.needle.is_empty())
            .collect();
        SponsorClassifier { rules }
    }

    /// Tier for an industry sponsor; `None` for any other sponsor class.
    pub fn classify(&self, name: &str, class: &str) -> Option<SponsorTier> {
        self.explain(name, class).map(|m| m.tier)
    }

    pub fn explain(&self, name: &str, class: &str) -> Option<SponsorMatch> {
        if !class.trim().eq_ignore_ascii_case(INDUSTRY_CLASS) {
            return None;
        }
        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() {
            return Some(SponsorMatch {
                tier: SponsorTier::Emerging,
                reference: None,
                ambiguous: false,
            });
        }

        let mut hits = self.rules.iter().filter(|r| {
            normalized.contains(r.needle.as_str()) || r.needle.contains(normalized.as_str())
        });
        let Some(first) = hits.next() else {
            return Some(SponsorMatch {
                tier: SponsorTier::Emerging,
                reference: None,
                ambiguous: false,
            });
        };
        let conflict = hits.find(|r| r.tier != first.tier);
        if let Some(other) = conflict {
            debug!(
                sponsor = name,
                chosen = %first.name,
                also = %other.name,
                "Sponsor matches more than one tier"
            );
        }
        Some(SponsorMatch {
            tier: first.tier,
            reference: Some(first.name.clone()),
            ambiguous: conflict.is_some(),
        })
    }
}
