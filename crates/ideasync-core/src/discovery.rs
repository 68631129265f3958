//! Investor-side company search. Pure functions over an already loaded
//! list; order is preserved and nothing is paginated.

use ideasync_types::models::Company;

/// Sector value that disables sector filtering.
pub const ALL_SECTORS: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyFilter {
    pub search: String,
    pub sector: String,
}

impl Default for CompanyFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            sector: ALL_SECTORS.to_string(),
        }
    }
}

impl CompanyFilter {
    pub fn new(search: impl Into<String>, sector: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            sector: sector.into(),
        }
    }

    pub fn matches(&self, company: &Company) -> bool {
        let needle = self.search.to_lowercase();
        let text_match = company.name.to_lowercase().contains(&needle)
            || company.description.to_lowercase().contains(&needle);
        // Sectors compare as offered by `sectors`, surrounding whitespace dropped
        let wanted = self.sector.trim();
        let sector_match = wanted == ALL_SECTORS || wanted == company.sector.trim();
        text_match && sector_match
    }
}

pub fn filter_companies(companies: &[Company], filter: &CompanyFilter) -> Vec<Company> {
    companies
        .iter()
        .filter(|c| filter.matches(c))
        .cloned()
        .collect()
}

/// Distinct non-empty sectors in first-seen order.
pub fn sectors(companies: &[Company]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for company in companies {
        let sector = company.sector.trim();
        if !sector.is_empty() && !seen.iter().any(|s| s == sector) {
            seen.push(sector.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn company(name: &str, description: &str, sector: &str) -> Company {
        Company {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            sector: sector.to_string(),
            founder_id: Uuid::new_v4(),
            funding_goal: None,
            pitch_deck: None,
            contact_details: None,
        }
    }

    fn names(companies: &[Company]) -> Vec<&str> {
        companies.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn search_across_all_sectors() {
        let companies = vec![
            company("TechNova", "Cloud robotics", "Technology"),
            company("MediSync", "Clinic scheduling", "Healthcare"),
        ];
        let found = filter_companies(&companies, &CompanyFilter::new("Tech", ALL_SECTORS));
        assert_eq!(names(&found), vec!["TechNova"]);
    }

    #[test]
    fn search_is_case_insensitive_and_covers_description() {
        let companies = vec![
            company("Orbit", "Satellite TECHNOLOGY for farms", "Space"),
            company("Harvest", "Crop insurance", "Agriculture"),
        ];
        let found = filter_companies(&companies, &CompanyFilter::new("technology", ALL_SECTORS));
        assert_eq!(names(&found), vec!["Orbit"]);
    }

    #[test]
    fn sector_must_match_exactly() {
        let companies = vec![
            company("A", "x", "Fintech"),
            company("B", "x", "fintech"),
            company("C", "x", "Healthcare"),
        ];
        let found = filter_companies(&companies, &CompanyFilter::new("", "Fintech"));
        assert_eq!(names(&found), vec!["A"]);
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let companies = vec![
            company("Zeta", "z", "Energy"),
            company("Alpha", "a", "Energy"),
            company("Mid", "m", "Retail"),
        ];
        let found = filter_companies(&companies, &CompanyFilter::default());
        assert_eq!(found, companies);
    }

    #[test]
    fn result_is_a_subset_where_every_item_matches() {
        let companies = vec![
            company("TechNova", "robots", "Technology"),
            company("Nova Health", "tech for clinics", "Healthcare"),
            company("Bakery", "bread", "Food"),
        ];
        for filter in [
            CompanyFilter::new("nova", ALL_SECTORS),
            CompanyFilter::new("tech", "Healthcare"),
            CompanyFilter::new("", "Food"),
            CompanyFilter::new("zzz", ALL_SECTORS),
        ] {
            let found = filter_companies(&companies, &filter);
            assert!(found.iter().all(|c| companies.contains(c) && filter.matches(c)));
            let expected = companies.iter().filter(|c| filter.matches(c)).count();
            assert_eq!(found.len(), expected);
        }
    }

    #[test]
    fn sectors_are_distinct_in_first_seen_order() {
        let companies = vec![
            company("A", "", "Fintech"),
            company("B", "", ""),
            company("C", "", "Energy"),
            company("D", "", "Fintech"),
        ];
        assert_eq!(sectors(&companies), vec!["Fintech", "Energy"]);
    }

    #[test]
    fn offered_sector_matches_padded_rows() {
        let companies = vec![company("Ledgerly", "books", "Fintech "), company("Volt", "grid", "Energy")];
        let offered = sectors(&companies);
        assert_eq!(offered, vec!["Fintech", "Energy"]);

        let found = filter_companies(&companies, &CompanyFilter::new("", offered[0].clone()));
        assert_eq!(names(&found), vec!["Ledgerly"]);
    }
}
