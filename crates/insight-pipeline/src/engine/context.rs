//! Retrieval context assembly: one line per hit plus aggregate statistics.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::sentiment::{SentimentAnalyzer, SentimentLabel};
use crate::types::ScoredPoint;

/// One retrieved feedback item as the synthesizer will see it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub label: SentimentLabel,
    pub rating: Option<f32>,
    pub content: String,
    pub source_label: &'static str,
}

impl ContextEntry {
    /// `[POSITIVE] (4★) content — Reddit`; the rating segment only when present.
    #[must_use]
    pub fn line(&self) -> String {
        let label = self.label.as_str().to_uppercase();
        match self.rating {
            Some(rating) => format!(
                "[{label}] ({}★) {} — {}",
                format_rating(rating),
                self.content,
                self.source_label
            ),
            None => format!("[{label}] {} — {}", self.content, self.source_label),
        }
    }
}

/// The bounded context handed to synthesis for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalContext {
    /// Entries that fit the budget, nearest first.
    pub entries: Vec<ContextEntry>,
    /// Hits dropped to respect the character budget.
    pub dropped: usize,
}

impl RetrievalContext {
    /// Keep hits nearest-first while their lines plus the statistics block
    /// fit in `max_chars`.
    ///
    /// Sentiment is recomputed from content so stale payload labels never
    /// reach the prompt. Once a line does not fit, it and every less similar
    /// hit are dropped; lines are never cut.
    pub fn build(mut hits: Vec<ScoredPoint>, analyzer: &SentimentAnalyzer, max_chars: usize) -> Self {
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut entries = Vec::with_capacity(hits.len());
        let mut used = 0usize;
        for hit in &hits {
            let entry = ContextEntry {
                label: analyzer.analyze(&hit.payload.content).label,
                rating: hit.payload.rating,
                content: hit.payload.content.clone(),
                source_label: hit.payload.source.label(),
            };
            // +1 for the joining newline.
            let cost = entry.line().chars().count() + usize::from(!entries.is_empty());
            if used + cost > max_chars {
                break;
            }
            used += cost;
            entries.push(entry);
        }

        let mut context = Self {
            entries,
            dropped: 0,
        };
        // Statistics shrink as entries go, so re-measure after each drop.
        while !context.entries.is_empty() && context.footprint() > max_chars {
            context.entries.pop();
        }
        context.dropped = hits.len() - context.entries.len();
        context
    }

    /// Characters taken by the lines, a separating newline and the statistics.
    #[must_use]
    pub fn footprint(&self) -> usize {
        self.text().chars().count() + 1 + self.statistics().chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Context lines joined by newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(ContextEntry::line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Sentiment distribution and, when ratings exist, rating distribution.
    #[must_use]
    pub fn statistics(&self) -> String {
        let total = self.entries.len();
        let mut out = format!("Sentiment distribution ({total} items):");
        if total == 0 {
            return out;
        }

        for label in [
            SentimentLabel::Positive,
            SentimentLabel::Negative,
            SentimentLabel::Neutral,
        ] {
            let count = self.entries.iter().filter(|e| e.label == label).count();
            if count == 0 {
                continue;
            }
            let _ = write!(
                out,
                "\n- {label}: {count} ({:.1}%)",
                percentage(count, total)
            );
        }

        // Keyed by tenths so 4.5 and 4.0 stay distinct; highest first.
        let mut ratings: BTreeMap<i64, usize> = BTreeMap::new();
        for rating in self.entries.iter().filter_map(|e| e.rating) {
            #[allow(clippy::cast_possible_truncation)]
            let key = (f64::from(rating) * 10.0).round() as i64;
            *ratings.entry(key).or_default() += 1;
        }
        if !ratings.is_empty() {
            let rated: usize = ratings.values().sum();
            let _ = write!(out, "\nRating distribution ({rated} rated):");
            for (key, count) in ratings.iter().rev() {
                #[allow(clippy::cast_precision_loss)]
                let rating = *key as f32 / 10.0;
                let _ = write!(
                    out,
                    "\n- {}★: {count} ({:.1}%)",
                    format_rating(rating),
                    percentage(*count, rated)
                );
            }
        }
        out
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(count: usize, total: usize) -> f64 {
    count as f64 * 100.0 / total as f64
}

fn format_rating(rating: f32) -> String {
    if rating.fract() == 0.0 {
        format!("{rating:.0}")
    } else {
        format!("{rating:.1}")
    }
}
