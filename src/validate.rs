//! Input validation and name suggestions.
//!
//! Record input is checked before it reaches the store so malformed cards
//! and blank names are rejected with a clear message. Lookups that miss can
//! suggest close existing names.

use crate::error::{Error, Result};
use crate::model::CardPayload;

/// Longest accepted record name, in characters.
pub const MAX_NAME_LEN: usize = 256;

/// Check a record name.
///
/// # Errors
///
/// Returns `InvalidArgument` for a blank, overlong or control-character name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidArgument(format!(
            "name is longer than {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::InvalidArgument(
            "name must not contain control characters".into(),
        ));
    }
    Ok(())
}

/// Build a card payload from raw input.
///
/// The number may contain spaces or dashes, which are dropped. The CVV must
/// be 3 or 4 digits and is kept as text so leading zeros survive.
///
/// # Errors
///
/// Returns `InvalidArgument` describing the first bad field.
pub fn card_payload(number: &str, expiry: &str, cvv: &str) -> Result<CardPayload> {
    let digits: String = number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidArgument(format!(
            "card number must be digits: {number}"
        )));
    }

    if expiry.trim().is_empty() {
        return Err(Error::InvalidArgument("card expiry must not be empty".into()));
    }

    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidArgument(format!(
            "CVV must be 3 or 4 digits: {cvv}"
        )));
    }

    Ok(CardPayload {
        number: digits,
        expiry: expiry.trim().to_string(),
        cvv: cvv.to_string(),
    })
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let a_len = a.len();
    let b_len = b.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    // Use single-row optimization (O(min(m,n)) space)
    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Find existing names similar to the searched name.
///
/// Returns up to `max` suggestions with edit distance ≤ 3,
/// sorted by distance then alphabetically.
#[must_use]
pub fn find_similar_names(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let searched = searched.to_lowercase();
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|name| (levenshtein_distance(&searched, &name.to_lowercase()), name.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max)
        .map(|(_, name)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("bank").is_ok());
        assert!(validate_name("  ").is_err());
        assert!(validate_name("a\nb").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_card_payload() {
        let card = card_payload("4111 1111-1111 1111", "12/27", "012").unwrap();
        assert_eq!(card.number, "4111111111111111");
        assert_eq!(card.cvv, "012");

        assert!(card_payload("4111x", "12/27", "123").is_err());
        assert!(card_payload("4111", "", "123").is_err());
        assert!(card_payload("4111", "12/27", "12").is_err());
        assert!(card_payload("4111", "12/27", "12a").is_err());
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_find_similar_names() {
        let names = vec!["bank".to_string(), "Banks".to_string(), "mail".to_string()];
        let result = find_similar_names("bnak", &names, 3);
        assert_eq!(result.first().map(String::as_str), Some("bank"));
        assert!(!result.contains(&"mail".to_string()));
    }
}
