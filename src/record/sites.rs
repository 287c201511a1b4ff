use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lookup::{items_at, text_at};
use super::{split_list, LIST_DELIMITER};

pub const US_COUNTRY: &str = "United States";

pub const SITE_COLUMNS: [&str; 4] = ["nct_id", "countries", "facilities", "has_us_site"];

/// Site locations of one trial, as written to the companion sites file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRow {
    pub nct_id: String,
    pub countries: String,
    pub facilities: String,
    pub has_us_site: bool,
}

impl SiteRow {
    pub fn countries(&self) -> Vec<&str> {
        split_list(&self.countries)
    }

    pub fn facilities(&self) -> Vec<&str> {
        split_list(&self.facilities)
    }
}

/// Collect facility names and countries from `contactsLocationsModule.locations`.
/// Countries are de-duplicated keeping first appearance; blank names are skipped.
pub fn extract(study: &Value) -> SiteRow {
    let nct_id = text_at(study, &["protocolSection", "identificationModule", "nctId"]).unwrap_or_default();
    let locations = items_at(study, &["protocolSection", "contactsLocationsModule", "locations"]);

    let countries: Vec<String> = locations
        .iter()
        .filter_map(|loc| text_at(loc, &["country"]))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unique()
        .collect();
    let facilities = locations
        .iter()
        .filter_map(|loc| text_at(loc, &["facility"]))
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .join(LIST_DELIMITER);

    SiteRow {
        nct_id,
        has_us_site: countries.iter().any(|c| c == US_COUNTRY),
        countries: countries.join(LIST_DELIMITER),
        facilities,
    }
}
