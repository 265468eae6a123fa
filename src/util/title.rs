use std::collections::HashMap;

/// Function words ignored by the token-based scorers.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be",
    "been", "being", "between", "both", "but", "by", "can", "could", "did", "do", "does",
    "each", "for", "from", "had", "has", "have", "how", "if", "in", "into", "is", "it", "its",
    "may", "more", "most", "no", "not", "of", "on", "or", "other", "our", "over", "shall",
    "should", "so", "some", "such", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "to", "under", "upon", "very", "via", "was",
    "were", "what", "when", "where", "which", "while", "who", "will", "with", "within",
    "would",
];

/// Checked in declaration order; the first suffix the token ends with wins.
const SUFFIXES: &[&str] = &[
    "ing", "ed", "ly", "tion", "sion", "ment", "ness", "able", "ible", "ful", "less", "ous",
    "ive", "ity", "er", "est", "es", "s",
];

const MIN_TOKEN_CHARS: usize = 3;

/// Lowercase a title and replace everything that is not a word character or
/// whitespace with a space.
pub fn clean_title(title: &str) -> String {
    let mut cleaned = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() {
            for lower in ch.to_lowercase() {
                cleaned.push(lower);
            }
        } else {
            cleaned.push(' ');
        }
    }
    cleaned
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Strip at most one suffix. Only the first suffix the token ends with is
/// considered, and it is removed only when the remaining stem is longer than
/// the suffix plus two characters.
pub fn simple_stem(token: &str) -> String {
    let Some(suffix) = SUFFIXES.iter().find(|suffix| token.ends_with(*suffix)) else {
        return token.to_string();
    };

    let stem = &token[..token.len() - suffix.len()];
    if stem.chars().count() > suffix.chars().count() + 2 {
        stem.to_string()
    } else {
        token.to_string()
    }
}

/// Tokenize a title into stemmed, stopword-free tokens of at least three characters.
pub fn normalize_tokens(title: &str) -> Vec<String> {
    clean_title(title)
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS && !is_stopword(token))
        .map(simple_stem)
        .collect()
}

/// Raw lowercased words split on whitespace, with punctuation left in place.
pub fn raw_words(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Most frequent normalized tokens across `titles`, ties kept in first-seen order.
pub fn top_keywords<'a, I>(titles: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for title in titles {
        for token in normalize_tokens(title) {
            let count = counts.entry(token.clone()).or_insert(0);
            if *count == 0 {
                order.push(token);
            }
            *count += 1;
        }
    }

    // stable sort keeps encounter order among equal counts
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(limit);
    order
}
