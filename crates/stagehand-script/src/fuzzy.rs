//! Token-set and partial-token-sort similarity ratios, in the style of the
//! `thefuzz` ratios the original matcher was built against. There is no
//! off-the-shelf `thefuzz`-equivalent crate in the Rust ecosystem, so these
//! are built on top of `strsim::levenshtein` rather than a full
//! `difflib`-style `SequenceMatcher`. Scores land in 0..=100, same range
//! and same rank ordering the matcher's thresholds (50/60) were tuned for.

use std::collections::BTreeSet;

/// Levenshtein-distance-based similarity, scaled to 0..=100. Plays the role
/// of `thefuzz.fuzz.ratio`.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100;
    }
    let distance = strsim::levenshtein(a, b);
    let similarity = 1.0 - (distance as f64 / max_len as f64);
    (similarity.max(0.0) * 100.0).round() as u8
}

/// Best `ratio` of `shorter` against any equal-length window of `longer`.
/// Plays the role of `thefuzz.fuzz.partial_ratio`.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };

    let longer_chars: Vec<char> = longer.chars().collect();
    let shorter_len = shorter.chars().count();

    if shorter_len == 0 {
        return ratio(a, b);
    }
    if longer_chars.len() <= shorter_len {
        return ratio(a, b);
    }

    let mut best = 0u8;
    for start in 0..=(longer_chars.len() - shorter_len) {
        let window: String = longer_chars[start..start + shorter_len].iter().collect();
        let score = ratio(shorter, &window);
        if score > best {
            best = score;
        }
    }
    best
}

fn tokenize(s: &str) -> BTreeSet<String> {
    s.split_whitespace().map(|w| w.to_string()).collect()
}

/// `thefuzz.fuzz.token_set_ratio`: compares the intersection of the two
/// token sets against each side's token-set union, taking the best of the
/// three pairwise `ratio`s. Order-insensitive and duplicate-insensitive.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let t1 = tokenize(a);
    let t2 = tokenize(b);

    let intersection: BTreeSet<&String> = t1.intersection(&t2).collect();
    let diff_1_to_2: BTreeSet<&String> = t1.difference(&t2).collect();
    let diff_2_to_1: BTreeSet<&String> = t2.difference(&t1).collect();

    let sorted_sect: Vec<&str> = intersection.iter().map(|s| s.as_str()).collect();
    let mut combined_1_to_2: Vec<&str> = sorted_sect.clone();
    combined_1_to_2.extend(diff_1_to_2.iter().map(|s| s.as_str()));
    let mut combined_2_to_1: Vec<&str> = sorted_sect.clone();
    combined_2_to_1.extend(diff_2_to_1.iter().map(|s| s.as_str()));

    let sect_str = sorted_sect.join(" ");
    let combined_1_to_2_str = combined_1_to_2.join(" ");
    let combined_2_to_1_str = combined_2_to_1.join(" ");

    ratio(&sect_str, &combined_1_to_2_str)
        .max(ratio(&sect_str, &combined_2_to_1_str))
        .max(ratio(&combined_1_to_2_str, &combined_2_to_1_str))
}

/// `thefuzz.fuzz.partial_token_sort_ratio`: alphabetically sorts each
/// string's tokens, then runs `partial_ratio` over the sorted forms.
pub fn partial_token_sort_ratio(a: &str, b: &str) -> u8 {
    let sort_tokens = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    partial_ratio(&sort_tokens(a), &sort_tokens(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_of_identical_strings_is_100() {
        assert_eq!(ratio("to be or not to be", "to be or not to be"), 100);
    }

    #[test]
    fn ratio_of_empty_strings_is_100() {
        assert_eq!(ratio("", ""), 100);
    }

    #[test]
    fn token_set_ratio_ignores_word_order() {
        let a = "to be or not to be";
        let b = "not to be or to be";
        assert_eq!(token_set_ratio(a, b), 100);
    }

    #[test]
    fn token_set_ratio_rewards_shared_vocabulary_over_order() {
        let a = "the quick brown fox";
        let b = "brown the fox quick jumps";
        assert!(token_set_ratio(a, b) > 70);
    }

    #[test]
    fn partial_ratio_finds_best_matching_substring() {
        let needle = "brown fox";
        let haystack = "the quick brown fox jumps over";
        assert_eq!(partial_ratio(needle, haystack), 100);
    }

    #[test]
    fn partial_token_sort_ratio_is_order_insensitive() {
        let a = "fox brown quick the";
        let b = "the quick brown fox jumps over the lazy dog";
        assert!(partial_token_sort_ratio(a, b) >= 60);
    }
}
