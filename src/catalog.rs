//! Themes and genres a story can be requested for.

pub const AVAILABLE_THEMES: &[&str] = &[
    "animals",
    "friendship",
    "family",
    "space",
    "ocean",
    "forest",
    "magic",
    "seasons",
    "weather",
    "toys",
];

pub const AVAILABLE_GENRES: &[&str] = &[
    "adventure",
    "fantasy",
    "mystery",
    "educational",
    "funny",
    "bedtime",
    "fairy tale",
    "fable",
];

pub fn is_known_theme(theme: &str) -> bool {
    AVAILABLE_THEMES.contains(&theme)
}

pub fn is_known_genre(genre: &str) -> bool {
    AVAILABLE_GENRES.contains(&genre)
}
