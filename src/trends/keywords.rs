//! Keyword frequency ranking over a title batch

use super::stop_words::is_stop_word;
use super::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Bracketed and parenthesized spans, usually episode or quality metadata
static METADATA_SPAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[.*?\]|\(.*?\)").expect("valid metadata span regex"));

/// Tokens this short are never keywords
const MIN_TOKEN_CHARS: usize = 3;

/// Ranking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordOptions {
    /// Maximum number of keywords returned
    pub top_n: usize,
    /// Minimum occurrences across the whole batch
    pub min_occurrences: usize,
}

impl Default for KeywordOptions {
    fn default() -> Self {
        Self {
            top_n: 15,
            min_occurrences: 2,
        }
    }
}

impl KeywordOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_min_occurrences(mut self, min_occurrences: usize) -> Self {
        self.min_occurrences = min_occurrences;
        self
    }
}

/// Extract trending keywords with the default options (top 15, seen at least twice)
pub fn extract_keywords<S: AsRef<str>>(titles: &[S], lang: Language) -> Vec<String> {
    extract_keywords_with(titles, lang, &KeywordOptions::default())
}

/// Extract trending keywords
///
/// Counts surviving tokens across the whole batch, keeps those seen at least
/// `min_occurrences` times and ranks them by descending count. Ties keep the
/// order in which tokens were first seen. Degenerate input yields an empty
/// list.
pub fn extract_keywords_with<S: AsRef<str>>(
    titles: &[S],
    lang: Language,
    options: &KeywordOptions,
) -> Vec<String> {
    // Insertion-ordered frequency table
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for title in titles {
        for token in tokenize(title.as_ref()) {
            if token.chars().count() < MIN_TOKEN_CHARS || is_stop_word(lang, &token) {
                continue;
            }
            match positions.get(&token) {
                Some(&pos) => counts[pos].1 += 1,
                None => {
                    positions.insert(token.clone(), counts.len());
                    counts.push((token, 1));
                }
            }
        }
    }

    counts.retain(|(_, count)| *count >= options.min_occurrences);
    // Stable: equal counts keep first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .take(options.top_n)
        .map(|(token, _)| token)
        .collect()
}

/// Lowercase, delete metadata spans and every non-letter, split on whitespace
fn tokenize(title: &str) -> Vec<String> {
    let lowered = title.to_lowercase();
    let stripped = METADATA_SPAN_RE.replace_all(&lowered, "");

    // Deleted, not replaced: "m-tp" reads as "mtp"
    let cleaned: String = stripped
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();

    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Letters plus combining diacritics, so decomposed Vietnamese stays intact
fn is_word_char(c: char) -> bool {
    c.is_alphabetic() || ('\u{0300}'..='\u{036F}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_token_ranks_first() {
        let titles = ["Du lịch Sapa mùa đông", "Đi Sapa mùa hè", "Review Sapa"];
        let keywords = extract_keywords(&titles, Language::Vi);
        assert_eq!(keywords, vec!["sapa", "mùa"]);
    }

    #[test]
    fn test_empty_corpus() {
        let titles: [&str; 0] = [];
        assert!(extract_keywords(&titles, Language::Vi).is_empty());
        assert!(extract_keywords(&titles, Language::En).is_empty());
    }

    #[test]
    fn test_singletons_are_dropped() {
        let titles = ["Minecraft survival", "Fortnite battle"];
        assert!(extract_keywords(&titles, Language::En).is_empty());
    }

    #[test]
    fn test_counts_across_titles_not_per_title() {
        let titles = ["Minecraft house", "Minecraft castle", "Castle tour"];
        let keywords = extract_keywords(&titles, Language::En);
        assert_eq!(keywords, vec!["minecraft", "castle"]);
    }

    #[test]
    fn test_repeats_within_one_title_count() {
        let titles = ["Giang Giang"];
        assert_eq!(extract_keywords(&titles, Language::Vi), vec!["giang"]);
    }

    #[test]
    fn test_metadata_spans_are_removed() {
        let titles = [
            "Cách nấu phở (Full HD) [2024]",
            "Nấu phở bò (Full HD) [2024]",
        ];
        let keywords = extract_keywords(&titles, Language::Vi);

        assert_eq!(keywords, vec!["nấu", "phở"]);
        assert!(!keywords.contains(&"full".to_string()));
        assert!(!keywords.contains(&"hd".to_string()));
        assert!(!keywords.contains(&"2024".to_string()));
    }

    #[test]
    fn test_spans_are_matched_lazily() {
        let tokens = tokenize("[Tập 1] Running Man [Vietsub]");
        assert_eq!(tokens, vec!["running", "man"]);
    }

    #[test]
    fn test_punctuation_and_digits_stripped() {
        let tokens = tokenize("BLACKPINK - 'Jump' M/V #1 | 2025!!!");
        assert_eq!(tokens, vec!["blackpink", "jump", "mv"]);
    }

    #[test]
    fn test_hyphenated_names_stay_whole() {
        let titles = ["Sơn Tùng M-TP live", "Sơn Tùng M-TP remix"];
        let keywords = extract_keywords(&titles, Language::Vi);
        assert_eq!(keywords, vec!["sơn", "tùng", "mtp"]);

        assert_eq!(tokenize("K-pop"), vec!["kpop"]);
        assert_eq!(tokenize("abc[x]def"), vec!["abcdef"]);
    }

    #[test]
    fn test_ranking_ignores_title_order() {
        let titles = [
            "guitar piano drums",
            "piano drums",
            "drums violin",
            "guitar drums",
            "piano violin",
        ];
        // drums 4, piano 3, guitar 2, violin 2 (guitar seen first)
        let expected = vec!["drums", "piano", "guitar", "violin"];
        assert_eq!(extract_keywords(&titles, Language::En), expected);

        let mut reversed = titles;
        reversed.reverse();
        let keywords = extract_keywords(&reversed, Language::En);
        assert_eq!(&keywords[..2], &["drums", "piano"]);
        assert_eq!(keywords.len(), 4);

        let rotated = [titles[2], titles[4], titles[0], titles[3], titles[1]];
        let keywords = extract_keywords(&rotated, Language::En);
        assert_eq!(&keywords[..2], &["drums", "piano"]);
        assert_eq!(keywords.len(), 4);
    }

    #[test]
    fn test_token_first_seen_in_later_title_is_counted() {
        let titles = ["Minecraft house", "Minecraft castle", "Roblox obby", "Roblox tycoon"];
        let keywords = extract_keywords(&titles, Language::En);
        assert_eq!(keywords, vec!["minecraft", "roblox"]);

        let options = KeywordOptions::new().with_min_occurrences(1);
        let all = extract_keywords_with(&titles, Language::En, &options);
        assert_eq!(all[1], "roblox");
    }

    #[test]
    fn test_stop_words_only() {
        let titles = ["The official trailer", "Official music video trailer"];
        assert!(extract_keywords(&titles, Language::En).is_empty());
    }

    #[test]
    fn test_short_tokens_dropped_by_char_count() {
        // "đi" is two letters but three bytes
        let titles = ["Đi Đà Lạt", "đi Đà Lạt"];
        let keywords = extract_keywords(&titles, Language::Vi);
        assert_eq!(keywords, vec!["lạt"]);
    }

    #[test]
    fn test_tie_break_keeps_first_seen_order() {
        let titles = ["zebra apple", "apple zebra", "mango mango"];
        let keywords = extract_keywords(&titles, Language::En);
        assert_eq!(keywords, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_top_n_limit() {
        let titles: Vec<String> = (0..20)
            .map(|i| {
                let word: String = std::iter::repeat(char::from(b'a' + i as u8)).take(4).collect();
                format!("{} {}", word, word)
            })
            .collect();

        assert_eq!(extract_keywords(&titles, Language::En).len(), 15);

        let options = KeywordOptions::new().with_top_n(3);
        assert_eq!(
            extract_keywords_with(&titles, Language::En, &options),
            vec!["aaaa", "bbbb", "cccc"]
        );
    }

    #[test]
    fn test_custom_min_occurrences() {
        let titles = ["Minecraft house", "Minecraft castle"];
        let options = KeywordOptions::new().with_min_occurrences(1);
        assert_eq!(
            extract_keywords_with(&titles, Language::En, &options),
            vec!["minecraft", "house", "castle"]
        );
    }

    #[test]
    fn test_input_is_not_mutated() {
        let titles = vec!["Review Sapa".to_string(), "Sapa".to_string()];
        let _ = extract_keywords(&titles, Language::Vi);
        assert_eq!(titles, vec!["Review Sapa", "Sapa"]);
    }
}
