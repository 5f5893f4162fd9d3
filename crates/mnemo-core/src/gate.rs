//! Pure predicates over free-form text: the noise filter (is this text
//! worth storing?) and the adaptive gate (does this query warrant a
//! retrieval round-trip at all?). Both are pure functions of their input
//! and a config bundle; neither touches the store or network.

/// Minimum length, in characters, below which text is always noise.
pub const NOISE_MIN_LEN: usize = 5;

/// Minimum length for a non-CJK query to be worth retrieving on.
pub const GATE_MIN_LEN_DEFAULT: usize = 15;

/// Minimum length for a CJK-heavy query to be worth retrieving on.
pub const GATE_MIN_LEN_CJK: usize = 6;

#[derive(Debug, Clone)]
pub struct NoiseFilterConfig {
    /// Phrases indicating the text is a denial/refusal ("i don't know", ...).
    pub denial_patterns: Vec<String>,
    /// Phrases indicating the text is a meta-question about the
    /// conversation itself rather than a fact worth remembering.
    pub meta_question_patterns: Vec<String>,
    /// Boilerplate greeting/closing phrases.
    pub boilerplate_patterns: Vec<String>,
    pub min_len: usize,
}

impl Default for NoiseFilterConfig {
    fn default() -> Self {
        Self {
            denial_patterns: [
                "i don't know",
                "i do not know",
                "not sure",
                "no idea",
                "i can't help",
                "i cannot help",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            meta_question_patterns: [
                "what did i just say",
                "what did you say",
                "can you repeat",
                "what were we talking about",
                "what was my last message",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            boilerplate_patterns: [
                "thanks for",
                "thank you for",
                "have a nice day",
                "let me know if",
                "hope this helps",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            min_len: NOISE_MIN_LEN,
        }
    }
}

/// True if `text` is low-information: too short, or matching a denial,
/// meta-question, or boilerplate pattern family. Pure and idempotent —
/// `is_noise(t) == is_noise(t)` always holds (property 7 in the testable
/// properties).
#[must_use]
pub fn is_noise(text: &str, config: &NoiseFilterConfig) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < config.min_len {
        return true;
    }
    let lower = trimmed.to_lowercase();
    config
        .denial_patterns
        .iter()
        .chain(config.meta_question_patterns.iter())
        .chain(config.boilerplate_patterns.iter())
        .any(|pattern| lower.contains(pattern.as_str()))
}

#[derive(Debug, Clone)]
pub struct AdaptiveGateConfig {
    pub min_len_default: usize,
    pub min_len_cjk: usize,
    pub command_prefixes: Vec<String>,
    pub greeting_patterns: Vec<String>,
    pub memory_intent_patterns: Vec<String>,
}

impl Default for AdaptiveGateConfig {
    fn default() -> Self {
        Self {
            min_len_default: GATE_MIN_LEN_DEFAULT,
            min_len_cjk: GATE_MIN_LEN_CJK,
            command_prefixes: ["/", "!", "$", "sudo ", "git ", "cd "]
                .into_iter()
                .map(String::from)
                .collect(),
            greeting_patterns: ["hi", "hello", "hey", "yo", "ok", "okay", "thanks", "bye"]
                .into_iter()
                .map(String::from)
                .collect(),
            memory_intent_patterns: [
                "remember",
                "last time",
                "you told me",
                "we talked about",
                "记得",
                "你记得",
                "上次",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// True if the proportion of CJK (CJK Unified Ideographs, Hiragana,
/// Katakana, Hangul) characters among non-whitespace characters exceeds
/// half: the string is "CJK-heavy" for the purposes of the gate's
/// length threshold.
#[must_use]
pub fn is_cjk_heavy(text: &str) -> bool {
    let mut total = 0usize;
    let mut cjk = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        let code = c as u32;
        let is_cjk = (0x4E00..=0x9FFF).contains(&code)
            || (0x3040..=0x30FF).contains(&code)
            || (0xAC00..=0xD7A3).contains(&code);
        if is_cjk {
            cjk += 1;
        }
    }
    total > 0 && cjk * 2 >= total
}

/// True if every non-whitespace character is an emoji/pictographic
/// symbol — a string like "👍👍" with no ASCII-alphanumeric content.
#[must_use]
pub fn is_emoji_only(text: &str) -> bool {
    let mut saw_any = false;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        saw_any = true;
        let code = c as u32;
        let is_symbol = (0x1F300..=0x1FAFF).contains(&code)
            || (0x2600..=0x27BF).contains(&code)
            || (0x2190..=0x21FF).contains(&code);
        if !is_symbol {
            return false;
        }
    }
    saw_any
}

/// True if the adaptive gate should *skip* retrieval for `query`: it is
/// short, command/greeting-like, or emoji-only, and does not match a
/// memory-intent override pattern.
#[must_use]
pub fn should_skip_retrieval(query: &str, config: &AdaptiveGateConfig) -> bool {
    let trimmed = query.trim();
    let lower = trimmed.to_lowercase();

    let forced = config
        .memory_intent_patterns
        .iter()
        .any(|pattern| lower.contains(pattern.as_str()));
    if forced {
        return false;
    }

    if trimmed.chars().count() < 5 {
        return true;
    }

    let min_len = if is_cjk_heavy(trimmed) {
        config.min_len_cjk
    } else {
        config.min_len_default
    };
    let has_question_mark = trimmed.contains('?') || trimmed.contains('\u{FF1F}');
    if trimmed.chars().count() < min_len && !has_question_mark {
        return true;
    }

    if config
        .command_prefixes
        .iter()
        .any(|prefix| trimmed.starts_with(prefix.as_str()))
    {
        return true;
    }
    if config
        .greeting_patterns
        .iter()
        .any(|pattern| lower == *pattern)
    {
        return true;
    }
    if is_emoji_only(trimmed) {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_noise() {
        assert!(is_noise("hi", &NoiseFilterConfig::default()));
    }

    #[test]
    fn denial_is_noise() {
        assert!(is_noise(
            "I don't know, sorry about that",
            &NoiseFilterConfig::default()
        ));
    }

    #[test]
    fn substantive_text_is_not_noise() {
        assert!(!is_noise(
            "User prefers dark mode in the editor",
            &NoiseFilterConfig::default()
        ));
    }

    #[test]
    fn noise_filter_is_idempotent() {
        let config = NoiseFilterConfig::default();
        let samples = ["hi", "User prefers dark mode", "thanks for the help today"];
        for s in samples {
            assert_eq!(is_noise(s, &config), is_noise(s, &config));
        }
    }

    #[test]
    fn greeting_is_skipped() {
        assert!(should_skip_retrieval("hey", &AdaptiveGateConfig::default()));
    }

    #[test]
    fn memory_intent_overrides_skip() {
        assert!(!should_skip_retrieval(
            "remember",
            &AdaptiveGateConfig::default()
        ));
    }

    #[test]
    fn long_query_is_not_skipped() {
        assert!(!should_skip_retrieval(
            "what is the user's preferred color scheme for the editor",
            &AdaptiveGateConfig::default()
        ));
    }

    #[test]
    fn cjk_heavy_uses_lower_threshold() {
        assert!(is_cjk_heavy("你记得我上次说的话吗"));
        assert!(!should_skip_retrieval(
            "你记得我上次说的话吗",
            &AdaptiveGateConfig::default()
        ));
    }

    #[test]
    fn emoji_only_is_skipped() {
        assert!(is_emoji_only("👍👍👍"));
        assert!(should_skip_retrieval("👍👍👍👍👍", &AdaptiveGateConfig::default()));
    }

    #[test]
    fn command_prefix_is_skipped() {
        assert!(should_skip_retrieval(
            "/help with something",
            &AdaptiveGateConfig::default()
        ));
    }
}
