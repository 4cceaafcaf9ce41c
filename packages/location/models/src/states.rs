//! Fixed list of states and administrative areas.
//!
//! The top level of the hierarchy never changes, so it is served from this
//! table instead of being fetched. Codes are the three-letter abbreviations
//! the upstream dataset uses for its `state` column.

use crate::LocationNode;

/// All state codes, in display order.
pub const STATE_CODES: &[&str] = &[
    "CES", "EES", "WES", "JGL", "LKS", "NBG", "UNY", "UPN", "WBG", "WRP", "AAA", "PAA", "RAA",
];

/// Returns the display name for a state code, or `"Unknown"`.
#[must_use]
pub fn state_name(code: &str) -> &'static str {
    match code.to_ascii_uppercase().as_str() {
        "CES" => "Central Equatoria",
        "EES" => "Eastern Equatoria",
        "WES" => "Western Equatoria",
        "JGL" => "Jonglei",
        "LKS" => "Lakes",
        "NBG" => "Northern Bahr el Ghazal",
        "UNY" => "Unity",
        "UPN" => "Upper Nile",
        "WBG" => "Western Bahr el Ghazal",
        "WRP" => "Warrap",
        "AAA" => "Abyei Administrative Area",
        "PAA" => "Pibor Administrative Area",
        "RAA" => "Ruweng Administrative Area",
        _ => "Unknown",
    }
}

/// Resolves a state code or display name (case-insensitive) to its code.
#[must_use]
pub fn resolve_state(input: &str) -> Option<&'static str> {
    let input = input.trim();
    STATE_CODES.iter().copied().find(|code| {
        code.eq_ignore_ascii_case(input) || state_name(code).eq_ignore_ascii_case(input)
    })
}

/// The state option list, as shown at the top of every filter bar.
#[must_use]
pub fn state_nodes() -> Vec<LocationNode> {
    STATE_CODES
        .iter()
        .map(|code| LocationNode {
            id: (*code).to_string(),
            name: state_name(code).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_count() {
        assert_eq!(STATE_CODES.len(), 13);
        assert_eq!(state_nodes().len(), 13);
    }

    #[test]
    fn every_code_has_a_name() {
        for code in STATE_CODES {
            assert_ne!(state_name(code), "Unknown", "no name for state: {code}");
        }
    }

    #[test]
    fn resolves_codes_and_names() {
        assert_eq!(resolve_state("ces"), Some("CES"));
        assert_eq!(resolve_state("Upper Nile"), Some("UPN"));
        assert_eq!(resolve_state(" lakes "), Some("LKS"));
        assert_eq!(resolve_state("Atlantis"), None);
    }

    #[test]
    fn unknown_code() {
        assert_eq!(state_name("XXX"), "Unknown");
    }
}
