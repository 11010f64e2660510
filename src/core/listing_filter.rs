use crate::config::SourceConfig;
use crate::models::Listing;

/// Title keyword filter applied to a freshly fetched catalog.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ListingFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        let lower = |words: &[String]| {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };

        Self {
            include: lower(include),
            exclude: lower(exclude),
        }
    }

    pub fn from_source(source: &SourceConfig) -> Self {
        Self::new(&source.include_keywords, &source.exclude_keywords)
    }

    /// A title must contain one include keyword (when any are set) and no exclude keyword.
    pub fn accepts(&self, listing: &Listing) -> bool {
        let title = listing.title.to_lowercase();

        let included = self.include.is_empty() || self.include.iter().any(|w| title.contains(w.as_str()));
        let excluded = self.exclude.iter().any(|w| title.contains(w.as_str()));

        included && !excluded
    }

    pub fn apply(&self, listings: Vec<Listing>) -> Vec<Listing> {
        listings.into_iter().filter(|l| self.accepts(l)).collect()
    }
}
