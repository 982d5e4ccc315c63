use crate::config::LanguageConfig;

/// Detect the dominant language of a text by script ranges.
///
/// Counts Hangul, kana, and CJK ideograph characters; anything else
/// alphabetic counts toward Latin. Chinese is only reported when ideographs
/// appear without kana, since Japanese text mixes both.
pub fn detect_language(text: &str) -> &'static str {
    let mut hangul = 0usize;
    let mut kana = 0usize;
    let mut ideographs = 0usize;
    let mut latin = 0usize;

    for c in text.chars() {
        match c as u32 {
            0xAC00..=0xD7A3 | 0x1100..=0x11FF => hangul += 1,
            0x3040..=0x30FF => kana += 1,
            0x4E00..=0x9FFF => ideographs += 1,
            _ if c.is_ascii_alphabetic() => latin += 1,
            _ => {}
        }
    }

    if kana > 0 && kana + ideographs >= hangul.max(latin) {
        return "ja";
    }

    let scores = [("ko", hangul), ("zh", ideographs), ("en", latin)];
    scores
        .iter()
        .max_by_key(|(_, count)| *count)
        .filter(|(_, count)| *count > 0)
        .map(|(code, _)| *code)
        .unwrap_or("en")
}

/// Resolve a requested or detected language against the configured list,
/// falling back to the default.
pub fn resolve_language(config: &LanguageConfig, requested: Option<&str>, text: &str) -> String {
    if let Some(code) = requested {
        let code = code.trim().to_lowercase();
        if config.supported.contains(&code) {
            return code;
        }
    }

    let detected = detect_language(text);
    if config.supported.iter().any(|s| s == detected) {
        detected.to_string()
    } else {
        config.default.clone()
    }
}

/// TTS voice for a language
pub fn voice_for_language(language: &str) -> &'static str {
    match language {
        "ko" => "nova",
        "ja" => "shimmer",
        "zh" => "alloy",
        _ => "alloy",
    }
}

/// Instruction appended to chat prompts so the model answers in the
/// caller's language
pub fn answer_language_instruction(language: &str) -> &'static str {
    match language {
        "ko" => "Answer in Korean.",
        "ja" => "Answer in Japanese.",
        "zh" => "Answer in Chinese.",
        _ => "Answer in English.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LanguageConfig {
        LanguageConfig {
            supported: vec!["ko".into(), "en".into(), "ja".into(), "zh".into()],
            default: "en".into(),
        }
    }

    #[test]
    fn detects_major_scripts() {
        assert_eq!(detect_language("안녕하세요, 오늘 강의입니다"), "ko");
        assert_eq!(detect_language("こんにちは、今日の講義です"), "ja");
        assert_eq!(detect_language("今天讲第三章"), "zh");
        assert_eq!(detect_language("Welcome to today's lecture"), "en");
    }

    #[test]
    fn explicit_request_wins_over_detection() {
        let cfg = config();
        assert_eq!(resolve_language(&cfg, Some("ko"), "plain english text"), "ko");
    }

    #[test]
    fn unsupported_request_falls_back_to_detection_then_default() {
        let cfg = config();
        assert_eq!(resolve_language(&cfg, Some("fr"), "bonjour tout le monde"), "en");
        assert_eq!(resolve_language(&cfg, None, ""), "en");
    }
}
