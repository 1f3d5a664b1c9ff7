//! Slug derivation for article URLs.

use rand::Rng;

const SLUG_MAX: usize = 255;
const SUFFIX_LEN: usize = 7;
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Lowercase the title and collapse every non-alphanumeric run to a single
/// dash, trimming leading/trailing dashes.
pub(crate) fn normalize_slug(title: &str) -> String {
    let mut slug = String::new();
    let mut prev_dash = false;
    for ch in title.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    let truncated: String = trimmed.chars().take(SLUG_MAX).collect();
    let normalized = truncated.trim_matches('-').to_string();
    if normalized.is_empty() {
        "article".to_string()
    } else {
        normalized
    }
}

/// Random lowercase-alphanumeric suffix appended on slug collision.
pub(crate) fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| {
            let index = rng.gen_range(0..SUFFIX_CHARSET.len());
            SUFFIX_CHARSET[index] as char
        })
        .collect()
}

/// Append a collision suffix, keeping the total length within bounds.
pub(crate) fn with_suffix(base: &str, suffix: &str) -> String {
    let allowed = SLUG_MAX.saturating_sub(suffix.len() + 1);
    let base_part: String = base.chars().take(allowed).collect();
    let base_part = base_part.trim_matches('-');
    format!("{base_part}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_dashes() {
        assert_eq!(normalize_slug("Article 1"), "article-1");
        assert_eq!(normalize_slug("  Hello,   World!  "), "hello-world");
        assert_eq!(normalize_slug("Rust & Friends: a tale"), "rust-friends-a-tale");
    }

    #[test]
    fn normalize_never_returns_empty() {
        assert_eq!(normalize_slug("!!!"), "article");
        assert_eq!(normalize_slug(""), "article");
    }

    #[test]
    fn normalize_caps_length() {
        let long_title = "a".repeat(600);
        assert_eq!(normalize_slug(&long_title).len(), 255);
    }

    #[test]
    fn random_suffix_shape() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 7);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn suffixes_differ_between_draws() {
        // 36^7 possibilities; two equal draws in a row means a broken RNG hookup.
        let draws: Vec<String> = (0..4).map(|_| random_suffix()).collect();
        assert!(draws.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn with_suffix_keeps_total_length_bounded() {
        let base = "b".repeat(255);
        let slug = with_suffix(&base, "abc1234");
        assert!(slug.len() <= 255);
        assert!(slug.ends_with("-abc1234"));
    }
}
