//! Heuristic quality scoring for finished stories.

use std::collections::HashMap;

use serde::Serialize;

use crate::postprocess::{SENTENCE_BREAK, recurring_characters};

const MOJIBAKE_MARKERS: &[&str] = &["â€™", "â€œ", "â€"];
const SETTING_MARKERS: &[&str] = &["was", "were", "lived", "once", "upon", "time", "long ago", "far away"];
const PROBLEM_MARKERS: &[&str] = &["but", "however", "suddenly", "problem", "couldn't", "wanted", "needed"];
const RESOLUTION_MARKERS: &[&str] = &["finally", "solved", "learned", "happy", "together", "end", "from then on"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl Classification {
    fn from_score(score: i32) -> Self {
        match score {
            s if s >= 9 => Classification::Excellent,
            s if s >= 7 => Classification::Good,
            s if s >= 5 => Classification::Acceptable,
            _ => Classification::Poor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub score: i32,
    pub issues: Vec<String>,
    pub word_count: usize,
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QualityChecker;

impl QualityChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn check_story_quality(&self, story: &str) -> QualityReport {
        let word_count = story.split_whitespace().count();
        let mut score = 10;
        let mut issues = Vec::new();

        if word_count < 50 {
            score -= 3;
            issues.push("Story is too short".to_string());
        } else if word_count < 100 {
            score -= 1;
            issues.push("Story could be longer".to_string());
        }

        if MOJIBAKE_MARKERS.iter().any(|marker| story.contains(marker)) {
            score -= 1;
            issues.push("Contains encoding issues".to_string());
        }

        if !story.trim_end().ends_with(['.', '!', '?']) {
            score -= 1;
            issues.push("Missing proper ending".to_string());
        }

        if let Some(issue) = self.check_repetition(story) {
            score -= 2;
            issues.push(issue);
        }

        if let Err(issue) = self.check_character_consistency(story) {
            score -= 2;
            issues.push(issue);
        }

        if let Err(issue) = self.check_narrative_structure(story) {
            score -= 1;
            issues.push(issue);
        }

        if issues.is_empty() {
            issues.push("No issues detected".to_string());
        }

        QualityReport {
            score,
            issues,
            word_count,
            classification: Classification::from_score(score),
        }
    }

    pub fn check_repetition(&self, story: &str) -> Option<String> {
        let sentences = trimmed_sentences(story);

        if sentences.windows(2).any(|pair| pair[0] == pair[1]) {
            return Some("Contains consecutive repeated sentences".to_string());
        }

        let mut openings: Vec<(String, usize)> = Vec::new();
        for sentence in &sentences {
            let words: Vec<&str> = sentence.split_whitespace().take(3).collect();
            if words.len() < 3 {
                continue;
            }
            let opening = words.join(" ");
            match openings.iter_mut().find(|(o, _)| *o == opening) {
                Some((_, count)) => *count += 1,
                None => openings.push((opening, 1)),
            }
        }
        if let Some((opening, _)) = openings.iter().find(|(_, count)| *count >= 3) {
            return Some(format!("Repetitive sentence beginnings: '{opening}...'"));
        }

        let lower = story.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();
        let threshold = 5usize.max(words.len() / 20);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for &word in &words {
            if word.chars().count() > 3 {
                let count = counts.entry(word).or_insert(0);
                if *count == 0 {
                    order.push(word);
                }
                *count += 1;
            }
        }
        order
            .into_iter()
            .find(|word| counts[word] >= threshold)
            .map(|word| format!("Overuse of word: '{word}'"))
    }

    /// Flags recurring characters that appear early and late but vanish from
    /// the middle third of the story.
    pub fn check_character_consistency(&self, story: &str) -> Result<&'static str, String> {
        let sentences: Vec<&str> = SENTENCE_BREAK.split(story).collect();
        if sentences.len() < 5 {
            return Ok("Story too short for character analysis");
        }

        let mentions = recurring_characters(story);
        if mentions.is_empty() {
            return Ok("No recurring characters detected");
        }

        let first_cut = sentences.len() / 3;
        let second_cut = 2 * sentences.len() / 3;
        let abandoned: Vec<&str> = mentions
            .iter()
            .filter(|(_, at)| {
                let begin = at.iter().any(|&i| i < first_cut);
                let middle = at.iter().any(|&i| (first_cut..second_cut).contains(&i));
                let end = at.iter().any(|&i| i >= second_cut);
                begin && end && !middle
            })
            .map(|(word, _)| word.as_str())
            .collect();

        if abandoned.is_empty() {
            Ok("Character consistency maintained")
        } else {
            Err(format!("Characters abandoned in middle: {}", abandoned.join(", ")))
        }
    }

    pub fn check_narrative_structure(&self, story: &str) -> Result<&'static str, String> {
        if story.split_whitespace().count() < 75 {
            return Err("Story too short for proper structure".to_string());
        }

        let sentences = trimmed_sentences(story);
        if sentences.len() < 6 {
            return Err("Too few sentences for proper structure".to_string());
        }

        let third = sentences.len() / 3;
        let section = |range: std::ops::Range<usize>| sentences[range].join(" ").to_lowercase();
        let has = |text: &str, markers: &[&str]| markers.iter().any(|m| text.contains(m));

        let has_setting = has(&section(0..third), SETTING_MARKERS);
        let has_problem = has(&section(third..2 * third), PROBLEM_MARKERS);
        let has_resolution = has(&section(2 * third..sentences.len()), RESOLUTION_MARKERS);

        if has_setting && has_problem && has_resolution {
            return Ok("Complete narrative structure");
        }
        if has_setting && has_resolution {
            return Ok("Basic narrative structure present");
        }

        let mut missing = Vec::new();
        if !has_setting {
            missing.push("clear setting");
        }
        if !has_problem {
            missing.push("conflict/problem");
        }
        if !has_resolution {
            missing.push("resolution");
        }
        Err(format!("Missing narrative elements: {}", missing.join(", ")))
    }
}

fn trimmed_sentences(story: &str) -> Vec<&str> {
    SENTENCE_BREAK
        .split(story)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
