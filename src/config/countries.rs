//! Built-in country catalog
//!
//! The catalog ships inside the binary as TOML. Profiles from the user's
//! configuration replace built-in profiles with the same country code.

use crate::config::types::CountryProfile;
use crate::ConfigResult;
use std::collections::BTreeMap;

const BUILTIN_COUNTRIES: &str = include_str!("countries.toml");

/// Parses the embedded country catalog
pub fn builtin_countries() -> ConfigResult<BTreeMap<String, CountryProfile>> {
    Ok(toml::from_str(BUILTIN_COUNTRIES)?)
}

/// Overlays user-supplied profiles on top of the built-in catalog
pub fn merge_countries(
    overrides: BTreeMap<String, CountryProfile>,
) -> ConfigResult<BTreeMap<String, CountryProfile>> {
    let mut countries = builtin_countries()?;
    for (code, profile) in overrides {
        countries.insert(code.to_uppercase(), profile);
    }
    Ok(countries)
}
