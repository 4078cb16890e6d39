//! Entity ID generation.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;

const SUFFIX_LEN: usize = 9;

/// Generate `<prefix>_<epoch_ms>_<random>`: sortable by creation time
/// with a collision-resistant alphanumeric suffix.
pub fn generate_id(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!(
        "{prefix}_{}_{}",
        Utc::now().timestamp_millis(),
        suffix.to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix_timestamp_and_suffix() {
        let id = generate_id("comment");
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "comment");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
    }

    #[test]
    fn ids_are_unique_enough() {
        let a = generate_id("x");
        let b = generate_id("x");
        assert_ne!(a, b);
    }
}
