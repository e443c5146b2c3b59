//! Local file naming for generated images.

use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;

/// Longest slug kept from a prompt.
pub const MAX_SLUG_LEN: usize = 64;

/// Upper bound (exclusive) of the random suffix.
pub const SUFFIX_RANGE: u32 = 10_000;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid regex"))
}

/// Filename-safe version of a prompt: runs of anything but ASCII letters and
/// digits become `_`, lowercased and capped at `MAX_SLUG_LEN`.
pub fn slugify(prompt: &str) -> String {
    let slug = unsafe_chars().replace_all(prompt, "_").to_lowercase();
    let slug: String = slug.trim_matches('_').chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "image".to_string()
    } else {
        slug.to_string()
    }
}

/// `<slug>_<suffix>.png` with a random base-4 suffix.
///
/// Two requests with the same prompt usually get different names, but this is
/// not guaranteed: there are only `SUFFIX_RANGE` suffixes.
pub fn image_file_name(prompt: &str, rng: &mut impl Rng) -> String {
    let suffix = rng.gen_range(0..SUFFIX_RANGE);
    format!("{}_{}.png", slugify(prompt), to_base4(suffix))
}

fn to_base4(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(char::from(b'0' + (n % 4) as u8));
        n /= 4;
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn slug_keeps_only_safe_characters() {
        assert_eq!(slugify("A cat, wearing a hat!"), "a_cat_wearing_a_hat");
        assert_eq!(slugify("../../etc/passwd"), "etc_passwd");
        assert_eq!(slugify("  日本 robot 🤖 "), "robot");
    }

    #[test]
    fn empty_slug_falls_back() {
        assert_eq!(slugify(""), "image");
        assert_eq!(slugify("?!"), "image");
    }

    #[test]
    fn slug_is_capped() {
        let slug = slugify(&"word ".repeat(40));
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('_'));
    }

    #[test]
    fn base4_rendering() {
        assert_eq!(to_base4(0), "0");
        assert_eq!(to_base4(3), "3");
        assert_eq!(to_base4(4), "10");
        assert_eq!(to_base4(9999), "2130033");
    }

    #[test]
    fn file_name_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let name = image_file_name("Sunset over Lisbon", &mut rng);
        let rest = name.strip_prefix("sunset_over_lisbon_").unwrap();
        let digits = rest.strip_suffix(".png").unwrap();
        assert!(!digits.is_empty());
        assert!(digits.chars().all(|c| ('0'..='3').contains(&c)));
    }

    #[test]
    fn identical_prompts_mostly_get_distinct_names() {
        let mut rng = StdRng::seed_from_u64(42);
        let names: Vec<String> = (0..200)
            .map(|_| image_file_name("same prompt", &mut rng))
            .collect();
        let distinct: HashSet<&String> = names.iter().collect();
        // 200 draws from 10k suffixes: a couple of collisions are expected, not dozens.
        assert!(distinct.len() >= 190, "only {} distinct names", distinct.len());
    }
}
