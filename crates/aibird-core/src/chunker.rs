//! Splits model output into protocol-sized lines.
//!
//! Lengths are measured in UTF-8 bytes, which is never less than what chat
//! transports count, and splits always land on char boundaries.

/// Smallest usable line length: one UTF-8 scalar of any width fits.
pub const MIN_LINE_LEN: usize = 4;

/// One outgoing fragment and the whitespace that separated it from the next.
///
/// Concatenating `text` + `separator` over all fragments gives back the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub text: &'a str,
    pub separator: &'a str,
}

/// Split `text` into fragments of at most `max_len` bytes.
///
/// Breaks happen at the last whitespace run that keeps the fragment within the
/// limit. A word longer than the limit is hard-split. `max_len` below
/// `MIN_LINE_LEN` is raised to it.
pub fn split_fragments(text: &str, max_len: usize) -> Vec<Fragment<'_>> {
    let max_len = max_len.max(MIN_LINE_LEN);
    let mut out = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.len() <= max_len {
            out.push(Fragment {
                text: rest,
                separator: "",
            });
            break;
        }

        let limit = floor_char_boundary(rest, max_len);
        match last_whitespace_at_or_before(rest, limit) {
            Some(ws) => {
                let start = rest[..ws].trim_end().len();
                let end = rest.len() - rest[ws..].trim_start().len();
                out.push(Fragment {
                    text: &rest[..start],
                    separator: &rest[start..end],
                });
                rest = &rest[end..];
            }
            None => {
                out.push(Fragment {
                    text: &rest[..limit],
                    separator: "",
                });
                rest = &rest[limit..];
            }
        }
    }

    out
}

/// Lines to send, in order. Blank fragments are dropped.
///
/// Every line is at most `max(max_len, MIN_LINE_LEN)` bytes. Limits below
/// `MIN_LINE_LEN` are raised because a smaller limit could not hold a single
/// 4-byte character.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    split_fragments(text, max_len)
        .into_iter()
        .filter(|f| !f.text.trim().is_empty())
        .map(|f| f.text.to_string())
        .collect()
}

/// Largest char boundary `<= max`; positive whenever `s` is non-empty and `max >= 4`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = 0usize;
    for (i, _) in s.char_indices() {
        if i > max {
            break;
        }
        idx = i;
    }
    idx
}

/// Byte index of the last whitespace char starting in `0..=limit`.
fn last_whitespace_at_or_before(s: &str, limit: usize) -> Option<usize> {
    s.char_indices()
        .take_while(|(i, _)| *i <= limit)
        .filter(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .last()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn rejoin(fragments: &[Fragment<'_>]) -> String {
        fragments
            .iter()
            .map(|f| format!("{}{}", f.text, f.separator))
            .collect()
    }

    fn assert_invariants(text: &str, max_len: usize) {
        let fragments = split_fragments(text, max_len);
        assert_eq!(rejoin(&fragments), text, "round trip, max_len={max_len}");

        for f in &fragments {
            assert!(f.text.len() <= max_len, "{:?} longer than {max_len}", f.text);
            assert!(f.separator.chars().all(char::is_whitespace));
        }

        let tokens: HashSet<&str> = fragments
            .iter()
            .flat_map(|f| f.text.split_whitespace())
            .collect();
        for word in text.split_whitespace().filter(|w| w.len() <= max_len) {
            assert!(tokens.contains(word), "word {word:?} was broken");
        }
    }

    #[test]
    fn short_text_is_a_single_line() {
        assert_eq!(chunk("hello world", 400), vec!["hello world"]);
    }

    #[test]
    fn breaks_between_words() {
        assert_eq!(
            chunk("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
    }

    #[test]
    fn keeps_original_separators() {
        let text = "alpha  beta\n\ngamma";
        let fragments = split_fragments(text, 6);
        assert_eq!(
            fragments,
            vec![
                Fragment {
                    text: "alpha",
                    separator: "  "
                },
                Fragment {
                    text: "beta",
                    separator: "\n\n"
                },
                Fragment {
                    text: "gamma",
                    separator: ""
                },
            ]
        );
    }

    #[test]
    fn hard_splits_words_longer_than_the_limit() {
        let word = "a".repeat(25);
        assert_eq!(
            chunk(&format!("hi {word} yo"), 10),
            vec!["hi", "aaaaaaaaaa", "aaaaaaaaaa", "aaaaa yo"]
        );
    }

    #[test]
    fn never_splits_inside_a_multibyte_char() {
        let text = "éééééééééé"; // 20 bytes
        let lines = chunk(text, 5);
        assert!(lines.iter().all(|l| l.len() <= 5));
        assert_eq!(lines.concat(), text);
    }

    #[test]
    fn blank_input_produces_nothing_to_send() {
        assert!(chunk("", 10).is_empty());
        assert!(chunk("   \n  ", 10).is_empty());
    }

    #[test]
    fn tiny_limits_are_raised() {
        assert_eq!(chunk("abcdefgh", 1), vec!["abcd", "efgh"]);
        for max_len in 0..MIN_LINE_LEN {
            assert!(chunk("🦜🦜 hi", max_len)
                .iter()
                .all(|l| l.len() <= MIN_LINE_LEN));
        }
    }

    #[test]
    fn invariants_hold_for_known_shapes() {
        let long_word = "x".repeat(90);
        let cases = [
            "",
            " leading space",
            "trailing space ",
            "     ",
            "one",
            "multiple   spaces   between   words",
            "tabs\tand\nnewlines\r\nmixed",
            long_word.as_str(),
            "naïve café, déjà vu, 日本語のテキスト",
        ];
        for text in cases {
            for max_len in [4, 5, 7, 10, 16, 33, 400] {
                assert_invariants(text, max_len);
            }
        }
    }

    #[test]
    fn invariants_hold_for_random_text() {
        const ALPHABET: &[&str] = &["a", "b", "c", "é", "日", " ", " ", "  ", "\n", "\t"];
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..500 {
            let len = rng.gen_range(0..200);
            let text: String = (0..len)
                .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
                .collect();
            let max_len = rng.gen_range(MIN_LINE_LEN..64);
            assert_invariants(&text, max_len);
        }
    }
}
