// src/rewrite/style.rs
use std::fmt;

/// Brand voice, sent as the system instruction for every call in both languages.
pub const PERSONA: &str = "You are the copywriter of a small applied-AI studio. \
Voice: direct, practical, technically literate, grounded and free of hype, professionally informal. \
Frame posts around a concrete problem and its solution and the real-world use. \
Dry wit and skepticism towards hype are fine. \
Never use hashtags, emojis in place of words, corporate buzzwords, marketing clichés \
(revolutionary, game-changer, unlock, supercharge) or vague platitudes. Prefer short sentences and the active voice. \
Separate ideas with paragraph breaks. Output only the rewritten post.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    En,
    Ru,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ru => "ru",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ru => "Russian",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// User turn for one language. The source text is fenced so the model treats
/// it as material, not instructions.
pub fn prompt_for(lang: Language, body: &str) -> String {
    format!(
        "Rewrite the raw input below (notes, a post or a thread) as one polished post in {}. \
Keep every fact and link that matters; drop filler.\n\n---\n{}\n---",
        lang.name(),
        body.trim()
    )
}
