//! Aggregation over stored records. Everything here is recomputed from the
//! full record list on demand; nothing is cached or incremental.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{FeedbackRecord, PollResponseRecord};
use crate::poll::POLL_QUESTIONS;

/// Integer percentage with half-up rounding, 0 when `total` is 0.
#[must_use]
pub fn percentage(count: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        (200 * count + total) / (2 * total)
    }
}

/// Distribution counts over the stored feedback records.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FeedbackStats {
    pub total_feedback: usize,
    pub category_distribution: BTreeMap<String, usize>,
    pub priority_distribution: BTreeMap<String, usize>,
    /// Records with priority dringend or hoch.
    pub urgent_issues: usize,
}

impl FeedbackStats {
    #[must_use]
    pub fn from_records(records: &[FeedbackRecord]) -> Self {
        let mut category_distribution = BTreeMap::new();
        let mut priority_distribution = BTreeMap::new();
        let mut urgent_issues = 0;
        for record in records {
            *category_distribution
                .entry(record.category.as_str().to_string())
                .or_insert(0) += 1;
            *priority_distribution
                .entry(record.priority.as_str().to_string())
                .or_insert(0) += 1;
            if record.priority.is_urgent() {
                urgent_issues += 1;
            }
        }
        Self {
            total_feedback: records.len(),
            category_distribution,
            priority_distribution,
            urgent_issues,
        }
    }

    #[must_use]
    pub fn category_percentage(&self, category: &str) -> usize {
        let count = self.category_distribution.get(category).copied().unwrap_or(0);
        percentage(count, self.total_feedback)
    }

    #[must_use]
    pub fn priority_percentage(&self, priority: &str) -> usize {
        let count = self.priority_distribution.get(priority).copied().unwrap_or(0);
        percentage(count, self.total_feedback)
    }
}

/// Per-question option tallies over the stored poll responses. The domain
/// is seeded from the catalog; responses referencing unknown question ids
/// or options are ignored rather than widening it.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct PollStats {
    pub total_submissions: usize,
    /// question id -> option -> count, covering every catalog option.
    pub tallies: BTreeMap<String, BTreeMap<String, usize>>,
}

impl PollStats {
    #[must_use]
    pub fn from_records(records: &[PollResponseRecord]) -> Self {
        let mut tallies: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for question in POLL_QUESTIONS {
            let options = question
                .options
                .iter()
                .map(|option| ((*option).to_string(), 0))
                .collect();
            tallies.insert(question.id.to_string(), options);
        }
        for record in records {
            for (question_id, option) in &record.responses {
                if let Some(options) = tallies.get_mut(question_id) {
                    if let Some(count) = options.get_mut(option) {
                        *count += 1;
                    }
                }
            }
        }
        Self { total_submissions: records.len(), tallies }
    }

    /// Number of counted answers for one question. Not the same as
    /// `total_submissions`: a submission may skip questions or carry
    /// answers outside the catalog.
    #[must_use]
    pub fn total_responses(&self, question_id: &str) -> usize {
        self.tallies
            .get(question_id)
            .map_or(0, |options| options.values().sum())
    }

    #[must_use]
    pub fn count(&self, question_id: &str, option: &str) -> usize {
        self.tallies
            .get(question_id)
            .and_then(|options| options.get(option))
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn percentage(&self, question_id: &str, option: &str) -> usize {
        percentage(self.count(question_id, option), self.total_responses(question_id))
    }
}
