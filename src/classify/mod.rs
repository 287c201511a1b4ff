pub mod facility;
pub mod reference;
pub mod sponsor;

use crate::record::sites::SiteRow;
use crate::record::Row;
use facility::{FacilityClassifier, SiteCategory, SiteCounts};
use reference::{ReferenceData, ReferenceError};
use sponsor::{SponsorClassifier, SponsorTier};

/// Labels attached to a row for downstream aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotation {
    pub sponsor_tier: Option<SponsorTier>,
    pub sites: SiteCounts,
}

impl Annotation {
    pub fn site_category(&self) -> SiteCategory {
        self.sites.category()
    }
}

/// Both classifiers built from the same reference data.
pub struct Classifiers {
    pub sponsor: SponsorClassifier,
    pub facility: FacilityClassifier,
}

impl Classifiers {
    pub fn new(reference: &ReferenceData) -> Result<Self, ReferenceError> {
        Ok(Classifiers {
            sponsor: SponsorClassifier::new(reference),
            facility: FacilityClassifier::new(reference)?,
        })
    }

    pub fn annotate(&self, row: &Row, sites: Option<&SiteRow>) -> Annotation {
        let facilities = sites.map(SiteRow::facilities).unwrap_or_default();
        Annotation {
            sponsor_tier: self.sponsor.classify(&row.lead_sponsor, &row.lead_sponsor_class),
            sites: self.facility.count(facilities.as_slice()),
        }
    }
}
