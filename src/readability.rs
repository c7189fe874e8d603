// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Text readability scoring.
//!
//! Scores grow with reading difficulty. Degenerate input without any word
//! scores positive infinity; callers decide what to do with such values.

use std::sync::LazyLock;

use regex::Regex;

static WORD: LazyLock<Regex,> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z']*",).expect("valid word pattern",),);
static SENTENCE_BREAK: LazyLock<Regex,> =
    LazyLock::new(|| Regex::new(r"[.!?]+",).expect("valid sentence pattern",),);

/// Maps text to a readability score, larger meaning harder to read.
pub trait ReadabilityScorer: Send + Sync
{
    fn score(&self, text: &str,) -> f64;
}

/// Word, sentence, and complex-word counts of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default,)]
pub struct TextStats
{
    pub words:         usize,
    pub sentences:     usize,
    /// Words with three or more syllables.
    pub complex_words: usize,
}

impl TextStats
{
    pub fn analyze(text: &str,) -> Self
    {
        let mut stats = Self::default();

        for segment in SENTENCE_BREAK.split(text,) {
            let mut has_word = false;
            for word in WORD.find_iter(segment,) {
                has_word = true;
                stats.words += 1;
                if count_syllables(word.as_str(),) >= 3 {
                    stats.complex_words += 1;
                }
            }
            if has_word {
                stats.sentences += 1;
            }
        }

        stats
    }
}

/// Gunning fog index: `0.4 * (words / sentences + 100 * complex / words)`.
#[derive(Debug, Clone, Copy, Default,)]
pub struct GunningFog;

impl ReadabilityScorer for GunningFog
{
    fn score(&self, text: &str,) -> f64
    {
        let stats = TextStats::analyze(text,);
        if stats.words == 0 {
            return f64::INFINITY;
        }

        let words = stats.words as f64;
        let sentences = stats.sentences as f64;
        let complex = stats.complex_words as f64;

        0.4 * (words / sentences + 100.0 * complex / words)
    }
}

/// Estimates syllables by counting vowel groups.
///
/// A trailing silent `e` is not counted unless it is the only vowel group or
/// follows an `l` ("table").
pub fn count_syllables(word: &str,) -> usize
{
    let lower = word.to_ascii_lowercase();
    let mut groups = 0;
    let mut previous_vowel = false;

    for ch in lower.chars() {
        let vowel = matches!(ch, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !previous_vowel {
            groups += 1;
        }
        previous_vowel = vowel;
    }

    if groups > 1 && lower.ends_with('e',) && !lower.ends_with("le",) && !lower.ends_with("ee",) {
        groups -= 1;
    }

    groups.max(1,)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn assert_close(actual: f64, expected: f64,)
    {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn syllable_heuristic_handles_common_words()
    {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("matters"), 2);
        assert_eq!(count_syllables("readability"), 5);
        assert_eq!(count_syllables("the"), 1);
        assert_eq!(count_syllables("rhythm"), 1);
    }

    #[test]
    fn stats_count_sentences_without_trailing_terminator()
    {
        let stats = TextStats::analyze("The cat sat. The dog ran",);

        assert_eq!(stats.words, 6);
        assert_eq!(stats.sentences, 2);
        assert_eq!(stats.complex_words, 0);
    }

    #[test]
    fn stats_ignore_punctuation_only_segments()
    {
        let stats = TextStats::analyze("Wait... what?! ## --- !!!",);

        assert_eq!(stats.words, 2);
        assert_eq!(stats.sentences, 2);
    }

    #[test]
    fn gunning_fog_simple_text()
    {
        assert_close(GunningFog.score("The cat sat. The dog ran.",), 1.2,);
    }

    #[test]
    fn gunning_fog_counts_complex_words()
    {
        // 2 words, 1 sentence, 1 complex word
        assert_close(GunningFog.score("Readability matters.",), 20.8,);
    }

    #[test]
    fn gunning_fog_is_infinite_for_degenerate_input()
    {
        assert_eq!(GunningFog.score(""), f64::INFINITY);
        assert_eq!(GunningFog.score("```\n42 + 7\n```"), f64::INFINITY);
    }

    #[test]
    fn gunning_fog_scores_are_non_negative()
    {
        let score = GunningFog.score("# Title\n\nInstall the package, then configure it.",);

        assert!(score.is_finite());
        assert!(score >= 0.0);
    }
}
