//! Static reference data: countries, HS chapters, and run defaults.

use crate::models::{Country, HsCategory};

/// Reference entry for a country: ISO alpha-3 code, name, region, M49 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryRef {
    pub code: &'static str,
    pub name: &'static str,
    pub region: &'static str,
    pub m49: u16,
}

pub const COUNTRIES: &[CountryRef] = &[
    CountryRef { code: "USA", name: "United States of America", region: "Americas", m49: 842 },
    CountryRef { code: "CHN", name: "China", region: "Asia", m49: 156 },
    CountryRef { code: "DEU", name: "Germany", region: "Europe", m49: 276 },
    CountryRef { code: "JPN", name: "Japan", region: "Asia", m49: 392 },
    CountryRef { code: "GBR", name: "United Kingdom", region: "Europe", m49: 826 },
    CountryRef { code: "FRA", name: "France", region: "Europe", m49: 251 },
    CountryRef { code: "IND", name: "India", region: "Asia", m49: 699 },
    CountryRef { code: "ITA", name: "Italy", region: "Europe", m49: 380 },
    CountryRef { code: "BRA", name: "Brazil", region: "Americas", m49: 76 },
    CountryRef { code: "CAN", name: "Canada", region: "Americas", m49: 124 },
    CountryRef { code: "RUS", name: "Russian Federation", region: "Europe", m49: 643 },
    CountryRef { code: "KOR", name: "Republic of Korea", region: "Asia", m49: 410 },
    CountryRef { code: "ESP", name: "Spain", region: "Europe", m49: 724 },
    CountryRef { code: "AUS", name: "Australia", region: "Oceania", m49: 36 },
    CountryRef { code: "MEX", name: "Mexico", region: "Americas", m49: 484 },
    CountryRef { code: "IDN", name: "Indonesia", region: "Asia", m49: 360 },
    CountryRef { code: "NLD", name: "Netherlands", region: "Europe", m49: 528 },
    CountryRef { code: "SAU", name: "Saudi Arabia", region: "Asia", m49: 682 },
    CountryRef { code: "TUR", name: "Turkey", region: "Asia", m49: 792 },
    CountryRef { code: "CHE", name: "Switzerland", region: "Europe", m49: 757 },
];

/// HS chapter code → description. `TOTAL` is the all-commodities aggregate.
pub const HS_CATEGORIES: &[(&str, &str)] = &[
    ("01", "Live animals"),
    ("02", "Meat and edible meat offal"),
    ("03", "Fish and crustaceans"),
    ("04", "Dairy produce"),
    ("05", "Products of animal origin"),
    ("06", "Live trees and other plants"),
    ("07", "Edible vegetables"),
    ("08", "Edible fruit and nuts"),
    ("09", "Coffee, tea, mate and spices"),
    ("10", "Cereals"),
    ("27", "Mineral fuels, oils and waxes"),
    ("84", "Nuclear reactors, boilers, machinery"),
    ("85", "Electrical machinery and equipment"),
    ("87", "Vehicles other than railway"),
    ("TOTAL", "All commodities"),
];

pub const UNKNOWN_HS_DESCRIPTION: &str = "Unknown";

/// Partner code for the whole world.
pub const WORLD_CODE: &str = "W00";

pub const DEFAULT_COUNTRIES: &[&str] = &[
    "USA", "CHN", "DEU", "JPN", "GBR", "FRA", "IND", "ITA", "BRA", "CAN",
];

pub const DEFAULT_YEARS: &[i32] = &[2020, 2021, 2022, 2023];

pub const DEFAULT_HS_CODES: &[&str] = &["01", "02", "03", "10", "27", "84", "85", "87"];

pub fn country(code: &str) -> Option<&'static CountryRef> {
    COUNTRIES.iter().find(|c| c.code == code)
}

pub fn country_by_m49(m49: u16) -> Option<&'static CountryRef> {
    COUNTRIES.iter().find(|c| c.m49 == m49)
}

/// Display name for a country code, falling back to the code itself.
pub fn country_name(code: &str) -> String {
    match country(code) {
        Some(c) => c.name.to_string(),
        None if code == WORLD_CODE => "World".to_string(),
        None => code.to_string(),
    }
}

/// Resolve an HS code to its description: exact match first, then the
/// two-digit chapter, then "Unknown".
pub fn hs_description(code: &str) -> &'static str {
    let lookup = |c: &str| {
        HS_CATEGORIES
            .iter()
            .find(|(k, _)| *k == c)
            .map(|(_, d)| *d)
    };
    lookup(code)
        .or_else(|| code.get(..2).filter(|_| code.len() > 2).and_then(lookup))
        .unwrap_or(UNKNOWN_HS_DESCRIPTION)
}

pub fn countries() -> Vec<Country> {
    COUNTRIES
        .iter()
        .map(|c| Country {
            code: c.code.to_string(),
            name: c.name.to_string(),
            region: c.region.to_string(),
        })
        .collect()
}

pub fn hs_categories() -> Vec<HsCategory> {
    HS_CATEGORIES
        .iter()
        .map(|(code, description)| HsCategory {
            code: code.to_string(),
            description: description.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hs_description_exact_and_chapter() {
        assert_eq!(hs_description("84"), "Nuclear reactors, boilers, machinery");
        assert_eq!(hs_description("8471"), "Nuclear reactors, boilers, machinery");
        assert_eq!(hs_description("TOTAL"), "All commodities");
    }

    #[test]
    fn test_hs_description_unknown() {
        assert_eq!(hs_description("99"), UNKNOWN_HS_DESCRIPTION);
        assert_eq!(hs_description(""), UNKNOWN_HS_DESCRIPTION);
        assert_eq!(hs_description("9"), UNKNOWN_HS_DESCRIPTION);
    }

    #[test]
    fn test_country_lookups() {
        assert_eq!(country_name("DEU"), "Germany");
        assert_eq!(country_name("W00"), "World");
        assert_eq!(country_name("XYZ"), "XYZ");
        assert_eq!(country_by_m49(842).unwrap().code, "USA");
        assert!(country_by_m49(1).is_none());
    }

    #[test]
    fn test_defaults_are_known() {
        for code in DEFAULT_COUNTRIES {
            assert!(country(code).is_some(), "{code} missing from COUNTRIES");
        }
        for code in DEFAULT_HS_CODES {
            assert_ne!(hs_description(code), UNKNOWN_HS_DESCRIPTION);
        }
    }
}
