use serde::{Serialize, Serializer};

use crate::extract::Listing;

/// Rank of the target business within an extraction result.
///
/// Serializes the way the audit response reports it: a 1-based integer,
/// `"Not Found"`, or `"N/A (No target specified)"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    Rank(usize),
    NotFound,
    NoTarget,
}

impl Serialize for Position {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Position::Rank(rank) => serializer.serialize_u64(*rank as u64),
            Position::NotFound => serializer.serialize_str("Not Found"),
            Position::NoTarget => serializer.serialize_str("N/A (No target specified)"),
        }
    }
}

/// Loose match: trimmed, case-insensitive substring. No canonical business
/// id exists upstream, so "Ace Plumbing" also matches "Ace Plumbing &
/// Heating"; switching to token- or distance-based matching is a product
/// decision, not a drive-by upgrade.
fn names_match_loosely(name: &str, target: &str) -> bool {
    name.trim()
        .to_lowercase()
        .contains(&target.trim().to_lowercase())
}

/// 1-based rank of the first listing whose name loosely contains `target`.
/// Only the first match counts; duplicates further down are not reported.
pub fn find_position(listings: &[Listing], target: &str) -> Position {
    if target.trim().is_empty() {
        return Position::NoTarget;
    }
    listings
        .iter()
        .position(|listing| names_match_loosely(&listing.business_name, target))
        .map(|index| Position::Rank(index + 1))
        .unwrap_or(Position::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(name: &str) -> Listing {
        Listing {
            business_name: name.to_string(),
            service_category: None,
            phone_number: None,
            address: None,
            website_url: None,
            rating: None,
            review_count: 0,
            listing_link: "https://www.google.com/maps/place/fixture".to_string(),
        }
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let listings = vec![listing("Roto Rooter"), listing("Select Plumbing Co.")];
        assert_eq!(find_position(&listings, "plumbing"), Position::Rank(2));
    }

    #[test]
    fn first_match_wins() {
        let listings = vec![
            listing("Ace Plumbing"),
            listing("Ace Plumbing & Heating"),
        ];
        assert_eq!(find_position(&listings, "ace plumbing"), Position::Rank(1));
    }

    #[test]
    fn rank_stays_within_sequence_bounds() {
        let listings = vec![listing("A"), listing("B"), listing("C")];
        if let Position::Rank(rank) = find_position(&listings, "c") {
            assert!(rank >= 1 && rank <= listings.len());
        } else {
            panic!("expected a rank");
        }
    }

    #[test]
    fn missing_target_reports_not_found() {
        let listings = vec![listing("Select Plumbing Co.")];
        assert_eq!(
            find_position(&listings, "Nonexistent LLC"),
            Position::NotFound
        );
    }

    #[test]
    fn blank_target_reports_no_target_regardless_of_contents() {
        let listings = vec![listing("Select Plumbing Co.")];
        assert_eq!(find_position(&listings, ""), Position::NoTarget);
        assert_eq!(find_position(&listings, "   "), Position::NoTarget);
        assert_eq!(find_position(&[], "  "), Position::NoTarget);
    }

    #[test]
    fn serializes_to_wire_values() {
        assert_eq!(
            serde_json::to_value(Position::Rank(3)).unwrap(),
            serde_json::json!(3)
        );
        assert_eq!(
            serde_json::to_value(Position::NotFound).unwrap(),
            serde_json::json!("Not Found")
        );
        assert_eq!(
            serde_json::to_value(Position::NoTarget).unwrap(),
            serde_json::json!("N/A (No target specified)")
        );
    }
}
