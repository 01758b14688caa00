use quorum_core::types::Language;

/// Count ASCII-letter words vs Cyrillic words; ≥70% ASCII and ≥3 words is
/// treated as English. The threshold is a named Open Question (see
/// DESIGN.md) — kept as a tunable constant rather than buried in the
/// comparison so a future review can change it in one place.
pub const ENGLISH_ASCII_THRESHOLD: f64 = 0.70;
const MIN_WORDS_FOR_DETECTION: usize = 3;

fn is_ascii_word(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_alphabetic())
        && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '\'')
}

fn is_cyrillic_word(word: &str) -> bool {
    word.chars().any(|c| matches!(c as u32, 0x0400..=0x04FF))
}

/// Detect whether `text` reads as English under the ASCII-word-ratio
/// heuristic. Returns `(language, confident)`; `confident` is false when
/// there are too few words to trust the ratio.
pub fn detect_language(text: &str) -> (Language, bool) {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < MIN_WORDS_FOR_DETECTION {
        return (Language::Ru, false);
    }

    let ascii_count = words.iter().filter(|w| is_ascii_word(w)).count();
    let cyrillic_count = words.iter().filter(|w| is_cyrillic_word(w)).count();
    let relevant = ascii_count + cyrillic_count;
    if relevant == 0 {
        return (Language::Ru, false);
    }

    let ascii_ratio = ascii_count as f64 / relevant as f64;
    if ascii_ratio >= ENGLISH_ASCII_THRESHOLD {
        (Language::En, true)
    } else {
        (Language::Ru, true)
    }
}

/// Build the non-negotiable language directive prepended to Reduce prompts.
/// The model is told explicitly to ignore the source language.
pub fn language_directive(language: Language) -> &'static str {
    match language {
        Language::En => {
            "Respond in English. Ignore the language of the source material — \
             translate facts into English regardless of how they were written."
        }
        Language::Ru => {
            "Отвечай на русском языке. Игнорируй язык исходных материалов — \
             переводи факты на русский вне зависимости от исходного языка."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_english_query() {
        let (lang, confident) = detect_language("what is prompt caching?");
        assert_eq!(lang, Language::En);
        assert!(confident);
    }

    #[test]
    fn detects_russian_query() {
        let (lang, confident) = detect_language("что такое кэширование промптов?");
        assert_eq!(lang, Language::Ru);
        assert!(confident);
    }

    #[test]
    fn too_few_words_is_unconfident() {
        let (_, confident) = detect_language("hi");
        assert!(!confident);
    }
}
