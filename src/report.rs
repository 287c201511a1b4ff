//! Aggregate breakdowns over an exported trial table: volume by year and
//! phase, geography, US site mix, and industry sponsor tiers.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;

use crate::classify::facility::SiteCategory;
use crate::classify::sponsor::SponsorTier;
use crate::classify::Classifiers;
use crate::record::sites::SiteRow;
use crate::record::Row;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})").unwrap());

const PHASE_ORDER: &[&str] = &[
    "EARLY_PHASE1",
    "PHASE1",
    "PHASE1|PHASE2",
    "PHASE2",
    "PHASE2|PHASE3",
    "PHASE3",
    "PHASE4",
    "NA",
    "Not specified",
];
const TOP_COUNTRIES: usize = 15;
const TOP_SPONSORS: usize = 10;

/// Year of an ISO date that may be only `YYYY-MM`.
pub fn parse_year(date: &str) -> Option<i32> {
    YEAR_RE.captures(date.trim())?.get(1)?.as_str().parse().ok()
}

/// Geography bucket of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Geography {
    UsOnly,
    UsAndInternational,
    NonUsOnly,
    NoLocation,
}

impl Geography {
    pub const ALL: [Geography; 4] = [
        Geography::UsOnly,
        Geography::UsAndInternational,
        Geography::NonUsOnly,
        Geography::NoLocation,
    ];

    pub fn of(sites: &SiteRow) -> Geography {
        let countries = sites.countries().len();
        match (countries, sites.has_us_site) {
            (0, _) => Geography::NoLocation,
            (1, true) => Geography::UsOnly,
            (_, true) => Geography::UsAndInternational,
            _ => Geography::NonUsOnly,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Geography::UsOnly => "US only",
            Geography::UsAndInternational => "US + international",
            Geography::NonUsOnly => "Non-US only",
            Geography::NoLocation => "No location data",
        }
    }
}

type ByYear = BTreeMap<i32, usize>;

/// All counts for one report run. Only trials whose start year falls in
/// `years` are counted, except where noted.
#[derive(Debug, Default)]
pub struct Report {
    pub years: Vec<i32>,
    pub total_trials: usize,
    pub by_year: ByYear,
    pub phase_by_year: HashMap<String, ByYear>,
    pub geography_by_year: HashMap<Geography, ByYear>,
    /// All years.
    pub country_counts: HashMap<String, usize>,
    pub us_sites_by_year: HashMap<SiteCategory, ByYear>,
    pub academic_sites_by_year: ByYear,
    pub community_sites_by_year: ByYear,
    pub tier_by_year: HashMap<SponsorTier, ByYear>,
    /// All years.
    pub industry_trials: usize,
    /// All years.
    pub sponsor_counts: HashMap<SponsorTier, HashMap<String, usize>>,
    pub has_sites: bool,
}

fn bump(map: &mut ByYear, year: i32, n: usize) {
    *map.entry(year).or_default() += n;
}

impl Report {
    pub fn build(
        rows: &[Row],
        sites: &HashMap<String, SiteRow>,
        classifiers: &Classifiers,
        years: RangeInclusive<i32>,
    ) -> Report {
        let mut report = Report {
            years: years.clone().collect(),
            total_trials: rows.len(),
            has_sites: !sites.is_empty(),
            ..Default::default()
        };

        for row in rows {
            let site = sites.get(&row.nct_id);
            let annotation = classifiers.annotate(row, site);

            if let Some(tier) = annotation.sponsor_tier {
                report.industry_trials += 1;
                *report
                    .sponsor_counts
                    .entry(tier)
                    .or_default()
                    .entry(row.lead_sponsor.clone())
                    .or_default() += 1;
            }
            if let Some(site) = site {
                for country in site.countries() {
                    *report.country_counts.entry(country.to_string()).or_default() += 1;
                }
            }

            let Some(year) = parse_year(&row.start_date).filter(|y| years.contains(y)) else {
                continue;
            };
            bump(&mut report.by_year, year, 1);
            let phase = if row.phase.is_empty() { "Not specified" } else { row.phase.as_str() };
            bump(report.phase_by_year.entry(phase.to_string()).or_default(), year, 1);

            if let Some(tier) = annotation.sponsor_tier {
                bump(report.tier_by_year.entry(tier).or_default(), year, 1);
            }

            let Some(site) = site else { continue };
            bump(report.geography_by_year.entry(Geography::of(site)).or_default(), year, 1);
            if site.has_us_site {
                bump(report.us_sites_by_year.entry(annotation.site_category()).or_default(), year, 1);
                bump(&mut report.academic_sites_by_year, year, annotation.sites.academic);
                bump(&mut report.community_sites_by_year, year, annotation.sites.community);
            }
        }
        report
    }

    fn count(map: Option<&ByYear>, year: i32) -> usize {
        map.and_then(|m| m.get(&year)).copied().unwrap_or(0)
    }

    fn table_header(&self, out: &mut String, label: &str, width: usize, total: bool) {
        let _ = write!(out, "  {:<width$}", label);
        for y in &self.years {
            let _ = write!(out, " {:>7}", y);
        }
        if total {
            let _ = write!(out, "  {:>7}", "Total");
        }
        let _ = writeln!(out);
        let _ = write!(out, "  {}", "-".repeat(width));
        for _ in &self.years {
            let _ = write!(out, " {}", "-".repeat(7));
        }
        if total {
            let _ = write!(out, "  {}", "-".repeat(7));
        }
        let _ = writeln!(out);
    }

    fn table_row(&self, out: &mut String, label: &str, width: usize, map: Option<&ByYear>, total: bool) {
        let _ = write!(out, "  {:<width$}", label);
        let mut sum = 0;
        for y in &self.years {
            let n = Self::count(map, *y);
            sum += n;
            let _ = write!(out, " {:>7}", n);
        }
        if total {
            let _ = write!(out, "  {:>7}", sum);
        }
        let _ = writeln!(out);
    }

    fn banner(out: &mut String, title: &str) {
        let rule = "=".repeat(70);
        let _ = writeln!(out, "{}\n{}\n{}", rule, title, rule);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        Self::banner(&mut out, "Q1: TRIAL VOLUME BY YEAR");
        for y in &self.years {
            let n = Self::count(Some(&self.by_year), *y);
            let _ = writeln!(out, "  {}:  {:>6}  {}", y, n, "█".repeat(n / 100));
        }
        let _ = writeln!(out, "\n  By phase:");
        self.table_header(&mut out, "Phase", 20, false);
        for phase in PHASE_ORDER {
            if let Some(map) = self.phase_by_year.get(*phase) {
                self.table_row(&mut out, phase, 20, Some(map), false);
            }
        }
        let _ = writeln!(out);

        if self.has_sites {
            self.render_geography(&mut out);
            self.render_sites(&mut out);
        } else {
            let _ = writeln!(out, "(no sites file: geography and site-type breakdowns skipped)\n");
        }
        self.render_tiers(&mut out);
        out
    }

    fn render_geography(&self, out: &mut String) {
        Self::banner(out, "Q2: US vs NON-US TRIALS BY YEAR");
        self.table_header(out, "Category", 25, false);
        for g in Geography::ALL {
            self.table_row(out, g.title(), 25, self.geography_by_year.get(&g), false);
        }
        let _ = writeln!(out, "\n  US involvement (any US site):");
        for y in &self.years {
            let us = Self::count(self.geography_by_year.get(&Geography::UsOnly), *y)
                + Self::count(self.geography_by_year.get(&Geography::UsAndInternational), *y);
            let non_us = Self::count(self.geography_by_year.get(&Geography::NonUsOnly), *y);
            let _ = writeln!(
                out,
                "    {}: {:>5} US ({:.1}%)  |  {:>5} non-US",
                y,
                us,
                percent(us, us + non_us),
                non_us
            );
        }
        let _ = writeln!(out, "\n  Top {} countries by trial count (all years):", TOP_COUNTRIES);
        for (country, n) in top(&self.country_counts, TOP_COUNTRIES) {
            let _ = writeln!(out, "    {:<30} {:>6}", country, n);
        }
        let _ = writeln!(out);
    }

    fn render_sites(&self, out: &mut String) {
        Self::banner(out, "Q3: US TRIALS - ACADEMIC vs COMMUNITY SITES");
        let _ = writeln!(out, "\n  Trial classification (by whether sites are academic, community, or mixed):");
        self.table_header(out, "Category", 30, false);
        for c in SiteCategory::ALL {
            self.table_row(out, c.title(), 30, self.us_sites_by_year.get(&c), false);
        }
        let _ = writeln!(out, "\n  Site-level counts (individual sites across US trials):");
        self.table_header(out, "Site type", 20, false);
        self.table_row(out, "Academic", 20, Some(&self.academic_sites_by_year), false);
        self.table_row(out, "Community", 20, Some(&self.community_sites_by_year), false);
        for y in &self.years {
            let academic = Self::count(Some(&self.academic_sites_by_year), *y);
            let community = Self::count(Some(&self.community_sites_by_year), *y);
            if academic + community > 0 {
                let _ = writeln!(out, "    {}: Academic share = {:.1}%", y, percent(academic, academic + community));
            }
        }
        let _ = writeln!(out);
    }

    fn render_tiers(&self, out: &mut String) {
        Self::banner(out, "Q4: INDUSTRY TRIALS BY SPONSOR TIER");
        let _ = writeln!(
            out,
            "\n  Overall: {} industry-sponsored  |  {} non-industry (academic/govt/other)\n",
            self.industry_trials,
            self.total_trials - self.industry_trials
        );
        self.table_header(out, "Sponsor tier", 20, true);
        for tier in SponsorTier::ALL {
            self.table_row(out, tier.title(), 20, self.tier_by_year.get(&tier), true);
        }

        let _ = writeln!(out, "\n  Share of industry trials by tier:");
        for y in &self.years {
            let total: usize = SponsorTier::ALL
                .iter()
                .map(|t| Self::count(self.tier_by_year.get(t), *y))
                .sum();
            if total == 0 {
                continue;
            }
            let parts: Vec<String> = SponsorTier::ALL
                .iter()
                .map(|t| {
                    let n = Self::count(self.tier_by_year.get(t), *y);
                    format!("{}: {:.1}%", t.title(), percent(n, total))
                })
                .collect();
            let _ = writeln!(out, "    {}: {}", y, parts.join(" | "));
        }
        let _ = writeln!(out);

        for tier in SponsorTier::ALL {
            let _ = writeln!(out, "  Top {} sponsors:", tier.title());
            if let Some(counts) = self.sponsor_counts.get(&tier) {
                for (name, n) in top(counts, TOP_SPONSORS) {
                    let _ = writeln!(out, "    {:<50} {:>5}", name, n);
                }
            }
            let _ = writeln!(out);
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Highest counts first; ties broken by name for stable output.
fn top(counts: &HashMap<String, usize>, n: usize) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries.truncate(n);
    entries
}
