// New York court focus: primary tier is the trial-level consumer venues,
// secondary tier is the appellate/precedent-setting courts.

pub const PRIMARY_COURTS: &[&str] = &[
    "ny-civ-ct",
    "ny-city-ct-buffalo",
    "ny-city-ct-rochester",
    "ny-city-ct-syracuse",
    "ny-city-ct-albany",
    "ny-city-ct-yonkers",
    "ny-dist-ct-nassau",
    "ny-dist-ct-suffolk",
];

pub const SECONDARY_COURTS: &[&str] = &[
    "ny-supreme-ct",
    "ny-app-div-1st",
    "ny-app-div-2nd",
    "ny-app-div-3rd",
    "ny-app-div-4th",
    "ny-ct-app",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourtScope {
    Primary,
    Secondary,
    All,
}

impl CourtScope {
    pub fn from_level(level: &str) -> Self {
        match level {
            "trial" => Self::Primary,
            "appellate" => Self::Secondary,
            _ => Self::All,
        }
    }

    pub fn court_ids(&self) -> Vec<&'static str> {
        match self {
            Self::Primary => PRIMARY_COURTS.to_vec(),
            Self::Secondary => SECONDARY_COURTS.to_vec(),
            Self::All => {
                let mut all = PRIMARY_COURTS.to_vec();
                all.extend_from_slice(SECONDARY_COURTS);
                all
            }
        }
    }

    // Upstream `court` filter value; comma-joined court ids.
    pub fn filter_value(&self) -> String {
        self.court_ids().join(",")
    }
}

pub fn primary_courts() -> Vec<&'static str> {
    CourtScope::Primary.court_ids()
}

pub fn secondary_courts() -> Vec<&'static str> {
    CourtScope::Secondary.court_ids()
}

pub fn all_courts() -> Vec<&'static str> {
    CourtScope::All.court_ids()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tiers_are_disjoint() {
        let primary: HashSet<&str> = primary_courts().into_iter().collect();
        let secondary: HashSet<&str> = secondary_courts().into_iter().collect();
        assert!(primary.is_disjoint(&secondary));
    }

    #[test]
    fn all_is_union_of_tiers() {
        let all = all_courts();
        assert_eq!(all.len(), PRIMARY_COURTS.len() + SECONDARY_COURTS.len());
        for id in PRIMARY_COURTS.iter().chain(SECONDARY_COURTS.iter()) {
            assert!(all.contains(id));
        }
    }

    #[test]
    fn scope_from_level() {
        assert_eq!(CourtScope::from_level("trial"), CourtScope::Primary);
        assert_eq!(CourtScope::from_level("appellate"), CourtScope::Secondary);
        assert_eq!(CourtScope::from_level("all"), CourtScope::All);
        assert_eq!(CourtScope::from_level("anything-else"), CourtScope::All);
    }

    #[test]
    fn filter_value_is_comma_joined() {
        let value = CourtScope::Primary.filter_value();
        assert!(value.starts_with("ny-civ-ct,"));
        assert_eq!(value.matches(',').count(), PRIMARY_COURTS.len() - 1);
    }
}
