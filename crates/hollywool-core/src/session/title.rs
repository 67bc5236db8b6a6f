//! Deterministic session title derived from a prompt.

use once_cell::sync::Lazy;
use regex::Regex;

use super::model::DEFAULT_SESSION_NAME;

const MAX_TITLE_CHARS: usize = 50;
const TITLE_WORDS: usize = 4;

/// Boilerplate that style presets prepend to prompts.
static STYLE_PREFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)cinematic film still,?\s*dramatic lighting,?\s*",
        r"(?i)anime style,?\s*vibrant colors,?\s*detailed illustration,?\s*",
        r"(?i)professional photography,?\s*8k uhd,?\s*dslr,?\s*",
        r"(?i)digital art,?\s*highly detailed,?\s*artstation,?\s*",
        r"(?i)oil painting,?\s*classical art style,?\s*textured brushstrokes,?\s*",
        r"(?i)^a photo of\s+",
        r"(?i)^an image of\s+",
        r"(?i)^a picture of\s+",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Builds a title from the first few words of `prompt`.
///
/// Never fails and never returns an empty string.
pub fn fallback_title(prompt: &str) -> String {
    let mut cleaned = prompt.trim().to_string();
    for prefix in STYLE_PREFIXES.iter() {
        cleaned = prefix.replace_all(&cleaned, "").trim().to_string();
    }

    let words: Vec<&str> = cleaned
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| c == ',' || c == '.'))
        .filter(|w| !w.is_empty())
        .take(TITLE_WORDS)
        .collect();
    if words.is_empty() {
        return DEFAULT_SESSION_NAME.to_string();
    }

    let title = capitalize(&words.join(" "));
    if title.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        format!("{}...", truncated.trim_end())
    } else {
        title
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_four_words_capitalized() {
        assert_eq!(
            fallback_title("a lighthouse on a cliff at sunset, dramatic sky"),
            "A lighthouse on a"
        );
    }

    #[test]
    fn test_style_prefixes_are_stripped() {
        assert_eq!(
            fallback_title("Cinematic film still, dramatic lighting, old man fishing in the rain"),
            "Old man fishing in"
        );
        assert_eq!(fallback_title("a photo of tiny robots repairing a watch"), "Tiny robots repairing a");
    }

    #[test]
    fn test_empty_prompt_gets_default_name() {
        assert_eq!(fallback_title("   "), DEFAULT_SESSION_NAME);
        assert_eq!(fallback_title(", . ,"), DEFAULT_SESSION_NAME);
    }

    #[test]
    fn test_long_words_are_capped() {
        let prompt = "supercalifragilisticexpialidocious antidisestablishmentarianism pneumonoultramicroscopic floccinaucinihilipilification";
        let title = fallback_title(prompt);
        assert!(title.chars().count() <= MAX_TITLE_CHARS);
        assert!(title.ends_with("..."));
    }
}
