/// Query terms shorter than this (in chars) are ignored for scoring.
pub const MIN_SCORING_TERM_CHARS: usize = 4;

/// Maximum number of keywords joined into the phrase lookup.
const PHRASE_KEYWORDS: usize = 4;

/// French and English function words that never drive a lookup or a score.
const STOP_WORDS: &[&str] = &[
    // French
    "a", "au", "aux", "avec", "ce", "ces", "cette", "dans", "de", "des", "du", "elle", "en",
    "entre", "est", "et", "il", "ils", "je", "la", "le", "les", "leur", "leurs", "lui", "l",
    "d", "qu", "mais", "me", "mes", "mon", "ne", "nos", "notre", "nous", "on", "ou", "où",
    "par", "pas", "pour", "qui", "que", "quel", "quelle", "quels", "quelles", "sa", "se",
    "ses", "son", "sont", "sur", "ta", "te", "tes", "ton", "un", "une", "vos", "votre",
    "vous", "comme", "comment", "plus", "sans", "sous", "être", "avoir", "faire", "fait",
    "tout", "tous", "toute", "toutes", "très", "aussi", "donc", "alors", "ainsi",
    "rédiger", "document", "rapport",
    // English
    "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "into", "is",
    "it", "its", "of", "on", "or", "over", "that", "the", "their", "this", "to", "was",
    "what", "when", "where", "which", "who", "why", "with", "about", "write", "report",
    "please", "should", "would", "could", "does", "than", "then", "these", "those",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercase words split on every non-alphanumeric char (apostrophes included,
/// so "l'IA" yields "l" and "ia").
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Distinct scoring terms of a query, in query order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in tokenize(query) {
        if word.chars().count() >= MIN_SCORING_TERM_CHARS
            && !is_stop_word(&word)
            && !terms.contains(&word)
        {
            terms.push(word);
        }
    }
    terms
}

/// Salient keywords, most specific first.
///
/// Longer words rank first; ties keep query order.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut keywords = salient_words(query);
    keywords.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    keywords
}

/// Search terms for the reference service: the keyword phrase first, then the
/// most specific single keywords, capped at `max_lookups`.
pub fn lookup_terms(query: &str, max_lookups: usize) -> Vec<String> {
    if max_lookups == 0 {
        return Vec::new();
    }
    let in_order = salient_words(query);
    if in_order.is_empty() {
        return Vec::new();
    }

    let mut terms = Vec::new();
    if in_order.len() > 1 {
        terms.push(
            in_order
                .iter()
                .take(PHRASE_KEYWORDS)
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
        );
    }
    for keyword in extract_keywords(query) {
        if terms.len() >= max_lookups {
            break;
        }
        if !terms.contains(&keyword) {
            terms.push(keyword);
        }
    }
    terms.truncate(max_lookups);
    terms
}

fn salient_words(query: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in tokenize(query) {
        if word.chars().count() >= 2 && !is_stop_word(&word) && !words.contains(&word) {
            words.push(word);
        }
    }
    words
}
