//! Lexicon-based polarity scoring for short product feedback.
//!
//! Word valences use a `[-4.0, 4.0]` scale. A text's valences are adjusted for
//! boosters ("very"), negation ("not"), contrast ("but") and exclamation
//! emphasis, summed, and squashed into a compound score in `[-1.0, 1.0]`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

/// Compound score at or above which text is labelled positive.
pub const POSITIVE_THRESHOLD: f32 = 0.05;
/// Compound score at or below which text is labelled negative.
pub const NEGATIVE_THRESHOLD: f32 = -0.05;

/// Normalization constant for the compound squash, `x / sqrt(x² + ALPHA)`.
const ALPHA: f32 = 15.0;
/// Multiplier applied to a valence when a negation precedes it.
const NEGATION_SCALAR: f32 = -0.74;
const BOOSTER_INCREMENT: f32 = 0.293;
const CAPS_INCREMENT: f32 = 0.733;
const EXCLAMATION_INCREMENT: f32 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
/// How many preceding tokens are inspected for boosters and negations.
const LOOKBACK: usize = 3;

pub(crate) const LEXICON: &[(&str, f32)] = &[
    // Positive
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("beautiful", 2.9),
    ("best", 3.2),
    ("better", 1.9),
    ("brilliant", 2.8),
    ("cheap", 0.6),
    ("clean", 1.7),
    ("comfortable", 1.9),
    ("cool", 1.3),
    ("decent", 1.2),
    ("delicious", 2.7),
    ("durable", 1.6),
    ("easy", 1.9),
    ("efficient", 1.8),
    ("enjoy", 2.2),
    ("excellent", 2.7),
    ("fantastic", 2.6),
    ("fast", 1.2),
    ("favorite", 2.0),
    ("fine", 0.8),
    ("fresh", 1.3),
    ("fun", 2.3),
    ("good", 1.9),
    ("great", 3.1),
    ("happy", 2.7),
    ("impressed", 2.2),
    ("impressive", 2.3),
    ("like", 1.5),
    ("liked", 1.8),
    ("love", 3.2),
    ("loved", 2.9),
    ("loving", 2.9),
    ("nice", 1.8),
    ("perfect", 2.7),
    ("pleased", 2.1),
    ("powerful", 1.8),
    ("quality", 1.2),
    ("recommend", 1.5),
    ("recommended", 1.6),
    ("reliable", 1.9),
    ("satisfied", 1.8),
    ("smooth", 1.4),
    ("solid", 1.4),
    ("stunning", 2.9),
    ("superb", 3.1),
    ("tasty", 2.2),
    ("value", 1.0),
    ("win", 2.8),
    ("wonderful", 2.7),
    ("worth", 0.9),
    ("wow", 2.8),
    // Negative
    ("annoying", -1.9),
    ("awful", -2.0),
    ("bad", -2.5),
    ("broke", -1.8),
    ("broken", -2.1),
    ("bug", -1.5),
    ("buggy", -2.0),
    ("complain", -1.8),
    ("complaint", -1.7),
    ("crash", -2.0),
    ("crashes", -2.0),
    ("defective", -2.2),
    ("disappointed", -2.2),
    ("disappointing", -2.2),
    ("expensive", -0.9),
    ("fail", -2.2),
    ("failed", -2.3),
    ("faulty", -2.1),
    ("hate", -2.7),
    ("hated", -3.2),
    ("horrible", -2.5),
    ("issue", -0.9),
    ("issues", -1.0),
    ("lag", -1.3),
    ("laggy", -1.6),
    ("leak", -1.4),
    ("leaks", -1.4),
    ("mediocre", -1.0),
    ("noisy", -1.3),
    ("overpriced", -1.9),
    ("pathetic", -2.7),
    ("poor", -2.1),
    ("problem", -1.7),
    ("problems", -1.7),
    ("regret", -2.3),
    ("slow", -1.1),
    ("sour", -1.3),
    ("spoiled", -2.0),
    ("terrible", -2.5),
    ("trash", -2.3),
    ("ugly", -2.3),
    ("useless", -1.8),
    ("vibration", -0.7),
    ("vibrations", -0.7),
    ("waste", -1.8),
    ("weak", -1.9),
    ("worse", -2.1),
    ("worst", -3.1),
];

const BOOSTERS: &[(&str, f32)] = &[
    ("absolutely", BOOSTER_INCREMENT),
    ("completely", BOOSTER_INCREMENT),
    ("extremely", BOOSTER_INCREMENT),
    ("highly", BOOSTER_INCREMENT),
    ("incredibly", BOOSTER_INCREMENT),
    ("really", BOOSTER_INCREMENT),
    ("so", BOOSTER_INCREMENT),
    ("super", BOOSTER_INCREMENT),
    ("totally", BOOSTER_INCREMENT),
    ("very", BOOSTER_INCREMENT),
    ("barely", -BOOSTER_INCREMENT),
    ("hardly", -BOOSTER_INCREMENT),
    ("kinda", -BOOSTER_INCREMENT),
    ("slightly", -BOOSTER_INCREMENT),
    ("somewhat", -BOOSTER_INCREMENT),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "cannot", "without",
    "dont", "doesnt", "didnt", "isnt", "wasnt", "arent", "wont", "cant", "shouldnt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Fixed-threshold mapping from a compound score to a label.
    #[must_use]
    pub fn from_compound(compound: f32) -> Self {
        if compound >= POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if compound <= NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    /// Polarity in `[-1.0, 1.0]`.
    pub compound: f32,
    pub label: SentimentLabel,
}

impl SentimentScore {
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            compound: 0.0,
            label: SentimentLabel::Neutral,
        }
    }
}

/// Stateless polarity scorer backed by an in-memory lexicon.
///
/// Building the lookup tables is the only setup cost; [`SentimentAnalyzer::shared`]
/// does it once per process and hands out the same instance.
#[derive(Debug)]
pub struct SentimentAnalyzer {
    lexicon: HashMap<&'static str, f32>,
    boosters: HashMap<&'static str, f32>,
}

static SHARED: OnceLock<Arc<SentimentAnalyzer>> = OnceLock::new();

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lexicon: LEXICON.iter().copied().collect(),
            boosters: BOOSTERS.iter().copied().collect(),
        }
    }

    /// The process-wide analyzer, initialized on first use.
    #[must_use]
    pub fn shared() -> Arc<SentimentAnalyzer> {
        Arc::clone(SHARED.get_or_init(|| {
            tracing::debug!(words = LEXICON.len(), "initializing sentiment lexicon");
            Arc::new(SentimentAnalyzer::new())
        }))
    }

    /// Score a text. Empty or lexicon-free text is neutral with compound `0.0`.
    #[must_use]
    pub fn analyze(&self, text: &str) -> SentimentScore {
        let raw: Vec<&str> = text.split_whitespace().collect();
        if raw.is_empty() {
            return SentimentScore::neutral();
        }

        let tokens: Vec<String> = raw.iter().map(|w| clean_token(w)).collect();
        let mixed_case = has_mixed_case(&raw);

        let mut valences = vec![0.0_f32; tokens.len()];
        for (i, token) in tokens.iter().enumerate() {
            let Some(&base) = self.lexicon.get(token.as_str()) else {
                continue;
            };
            let mut valence = base;

            if mixed_case && is_shouted(raw[i]) {
                valence += CAPS_INCREMENT.copysign(base);
            }

            for distance in 1..=LOOKBACK.min(i) {
                let prev = tokens[i - distance].as_str();
                if let Some(&boost) = self.boosters.get(prev) {
                    #[allow(clippy::cast_precision_loss)]
                    let scalar = boost * (1.0 - 0.05 * (distance - 1) as f32);
                    valence += if base < 0.0 { -scalar } else { scalar };
                }
            }

            if (1..=LOOKBACK.min(i)).any(|d| is_negation(&tokens[i - d], raw[i - d])) {
                valence *= NEGATION_SCALAR;
            }

            valences[i] = valence;
        }

        if let Some(but_idx) = tokens.iter().position(|t| t == "but") {
            for (i, v) in valences.iter_mut().enumerate() {
                if i < but_idx {
                    *v *= 0.5;
                } else if i > but_idx {
                    *v *= 1.5;
                }
            }
        }

        let mut sum: f32 = valences.iter().sum();
        if sum != 0.0 {
            let exclamations = text.matches('!').count().min(MAX_EXCLAMATIONS);
            #[allow(clippy::cast_precision_loss)]
            let emphasis = EXCLAMATION_INCREMENT * exclamations as f32;
            sum += emphasis.copysign(sum);
        }

        let compound = squash(sum);
        SentimentScore {
            compound,
            label: SentimentLabel::from_compound(compound),
        }
    }
}

fn squash(sum: f32) -> f32 {
    if sum == 0.0 {
        return 0.0;
    }
    let compound = sum / (sum * sum + ALPHA).sqrt();
    // Four decimals keeps scores stable across platforms and in payloads.
    ((compound * 10_000.0).round() / 10_000.0).clamp(-1.0, 1.0)
}

fn clean_token(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .collect::<String>()
        .to_lowercase()
}

fn is_negation(token: &str, raw: &str) -> bool {
    if NEGATIONS.contains(&token) {
        return true;
    }
    let raw = raw.to_lowercase();
    raw.contains("n't") || raw.contains("n\u{2019}t")
}

fn is_shouted(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() > 1 && letters.iter().all(|c| c.is_uppercase())
}

fn has_mixed_case(words: &[&str]) -> bool {
    let shouted = words.iter().filter(|w| is_shouted(w)).count();
    shouted > 0 && shouted < words.len()
}
