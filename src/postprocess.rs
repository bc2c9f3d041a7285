//! Cleanup of raw model output into a presentable story.
//!
//! [`PostProcessor::process_story`] runs five stages in a fixed order:
//! encoding repair, ending repair, gendered-word consistency, whitespace and
//! punctuation cleanup, and finally restoring the mandated opening words.
//! A failing stage never loses the story: the caller gets the untouched input
//! back inside [`ProcessedStory::Fallback`].

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

pub(crate) static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?] ").expect("valid regex"));
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));
static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" +([,.!?])").expect("valid regex"));
static DOT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").expect("valid regex"));
static MISSING_SPACE_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])([A-Za-z])").expect("valid regex"));

const ENCODING_FIXES: &[(&str, &str)] = &[
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€œ", "\""),
    ("â€", "\""),
    ("\u{2019}", "'"),
    ("\u{2018}", "'"),
    ("\u{201c}", "\""),
    ("\u{201d}", "\""),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("\\n", " "),
];

pub const GENDER_PAIRS: &[(&str, &str)] = &[
    ("he", "she"),
    ("him", "her"),
    ("his", "her"),
    ("boy", "girl"),
    ("man", "woman"),
    ("son", "daughter"),
    ("brother", "sister"),
    ("prince", "princess"),
    ("king", "queen"),
    ("father", "mother"),
];

const MIN_SENTENCES_FOR_CONSISTENCY: usize = 5;
const DOMINANCE_FACTOR: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encoding,
    Ending,
    CharacterConsistency,
    Cleanup,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PostProcessError {
    #[error("stage {0:?} produced an empty story")]
    Emptied(Stage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessedStory {
    Cleaned(String),
    /// Processing failed; `story` is the input exactly as received.
    Fallback {
        story: String,
        error: PostProcessError,
    },
}

impl ProcessedStory {
    pub fn text(&self) -> &str {
        match self {
            ProcessedStory::Cleaned(story) => story,
            ProcessedStory::Fallback { story, .. } => story,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ProcessedStory::Cleaned(story) => story,
            ProcessedStory::Fallback { story, .. } => story,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ProcessedStory::Fallback { .. })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostProcessor;

impl PostProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process_story(&self, story: &str, prefix: &str) -> ProcessedStory {
        match self.run_stages(story) {
            Ok(mut cleaned) => {
                if !cleaned.starts_with(prefix) {
                    cleaned.insert_str(0, prefix);
                }
                ProcessedStory::Cleaned(cleaned)
            }
            Err(error) => ProcessedStory::Fallback {
                story: story.to_string(),
                error,
            },
        }
    }

    fn run_stages(&self, story: &str) -> Result<String, PostProcessError> {
        let text = checked(story, self.fix_encoding_issues(story), Stage::Encoding)?;
        let text = checked(&text, self.fix_story_ending(&text), Stage::Ending)?;
        let text = checked(
            &text,
            self.ensure_character_consistency(&text),
            Stage::CharacterConsistency,
        )?;
        checked(&text, self.clean_text(&text), Stage::Cleanup)
    }

    pub fn fix_encoding_issues(&self, text: &str) -> String {
        let mut fixed = text.to_string();
        for (broken, replacement) in ENCODING_FIXES {
            if fixed.contains(broken) {
                fixed = fixed.replace(broken, replacement);
            }
        }
        fixed
    }

    /// Truncates after the last `.`, `!` or `?` when the story stops mid-sentence.
    pub fn fix_story_ending(&self, story: &str) -> String {
        let trimmed = story.trim_end();
        if trimmed.is_empty() || trimmed.ends_with(['.', '!', '?']) {
            return story.to_string();
        }
        match story.rfind(['.', '!', '?']) {
            Some(idx) if idx > 0 => story[..=idx].to_string(),
            _ => story.to_string(),
        }
    }

    /// Recurring characters keyed by name, with the sentence indices they
    /// appear in.
    pub fn extract_characters(&self, story: &str) -> HashMap<String, Vec<usize>> {
        recurring_characters(story).into_iter().collect()
    }

    /// Rewrites a gendered word toward the dominant form of its pair when a
    /// story with recurring characters mixes both forms.
    pub fn ensure_character_consistency(&self, story: &str) -> String {
        if self.extract_characters(story).is_empty() {
            return story.to_string();
        }
        if SENTENCE_BREAK.split(story).count() < MIN_SENTENCES_FOR_CONSISTENCY {
            return story.to_string();
        }

        let mut text = story.to_string();
        for &(male, female) in GENDER_PAIRS {
            let male_count = count_word(&text, male);
            let female_count = count_word(&text, female);
            if male_count == 0 || female_count == 0 {
                continue;
            }
            if male_count > female_count * DOMINANCE_FACTOR {
                text = replace_word(&text, female, male);
            } else if female_count > male_count * DOMINANCE_FACTOR {
                text = replace_word(&text, male, female);
            }
        }
        text
    }

    /// Whitespace and punctuation normalization. Applying it twice gives the
    /// same result as applying it once.
    pub fn clean_text(&self, text: &str) -> String {
        let text = SPACE_RUN.replace_all(text, " ");
        let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
        let text = DOT_RUN.replace_all(&text, "...");
        let text = MISSING_SPACE_AFTER.replace_all(&text, "$1 $2");
        text.trim().to_string()
    }
}

fn checked(input: &str, output: String, stage: Stage) -> Result<String, PostProcessError> {
    if output.trim().is_empty() && !input.trim().is_empty() {
        return Err(PostProcessError::Emptied(stage));
    }
    Ok(output)
}

/// Capitalized alphabetic words (longer than two letters, not opening the
/// story) mentioned more than once, in order of first mention.
pub(crate) fn recurring_characters(story: &str) -> Vec<(String, Vec<usize>)> {
    let mut mentions: Vec<(String, Vec<usize>)> = Vec::new();
    for (sentence_idx, sentence) in SENTENCE_BREAK.split(story).enumerate() {
        for (word_idx, word) in sentence.split_whitespace().enumerate() {
            if (sentence_idx > 0 || word_idx > 0) && is_name_like(word) {
                match mentions.iter_mut().find(|(name, _)| name == word) {
                    Some((_, at)) => at.push(sentence_idx),
                    None => mentions.push((word.to_string(), vec![sentence_idx])),
                }
            }
        }
    }
    mentions.retain(|(_, at)| at.len() > 1);
    mentions
}

fn is_name_like(word: &str) -> bool {
    let Some(first) = word.chars().next() else {
        return false;
    };
    first.is_uppercase() && word.chars().count() > 2 && word.chars().all(char::is_alphabetic)
}

/// Occurrences of `word` as a whole token, allowing a trailing comma or period.
fn count_word(text: &str, word: &str) -> usize {
    text.split_whitespace()
        .map(|token| token.to_lowercase())
        .filter(|token| {
            let token = token.strip_suffix([',', '.']).unwrap_or(token);
            token == word
        })
        .count()
}

fn replace_word(text: &str, from: &str, to: &str) -> String {
    let pattern = match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(from))) {
        Ok(pattern) => pattern,
        Err(_) => return text.to_string(),
    };
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            let matched = &caps[0];
            if matched.starts_with(char::is_uppercase) {
                capitalize(to)
            } else {
                to.to_string()
            }
        })
        .into_owned()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
