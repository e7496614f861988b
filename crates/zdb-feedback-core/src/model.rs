use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identity fields are replaced with this marker when a submission is
/// flagged anonymous, before anything is written durably.
pub const ANONYMOUS_NAME: &str = "Anonym";

/// The seven Bavarian administrative districts offered by the feedback form.
pub const DISTRICTS: [&str; 7] = [
    "Oberbayern",
    "Niederbayern",
    "Oberpfalz",
    "Oberfranken",
    "Mittelfranken",
    "Unterfranken",
    "Schwaben",
];

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),
}

/// The fixed set of feedback topics. Serialized as the full German labels
/// the platform has always stored, so existing data round-trips unchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FeedbackCategory {
    #[serde(rename = "Digitale Infrastruktur und Technik")]
    Infrastruktur,
    #[serde(rename = "Digitale Lernplattformen und Software")]
    Lernplattformen,
    #[serde(rename = "Digitale Unterrichtsmethoden")]
    Unterrichtsmethoden,
    #[serde(rename = "Digitale Medien und Ressourcen")]
    MedienRessourcen,
    #[serde(rename = "Digitale Bewertung und Prüfungen")]
    BewertungPruefungen,
    #[serde(rename = "Digitale Fortbildung für Lehrkräfte")]
    Fortbildung,
    #[serde(rename = "Digitale Kommunikation und Zusammenarbeit")]
    Kommunikation,
    #[serde(rename = "Technischer Support und Wartung")]
    TechnischerSupport,
    #[serde(rename = "Datenschutz und Sicherheit")]
    Datenschutz,
    #[serde(rename = "Sonstiges zur Digitalisierung")]
    Sonstiges,
}

impl FeedbackCategory {
    pub const ALL: [Self; 10] = [
        Self::Infrastruktur,
        Self::Lernplattformen,
        Self::Unterrichtsmethoden,
        Self::MedienRessourcen,
        Self::BewertungPruefungen,
        Self::Fortbildung,
        Self::Kommunikation,
        Self::TechnischerSupport,
        Self::Datenschutz,
        Self::Sonstiges,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Infrastruktur => "Digitale Infrastruktur und Technik",
            Self::Lernplattformen => "Digitale Lernplattformen und Software",
            Self::Unterrichtsmethoden => "Digitale Unterrichtsmethoden",
            Self::MedienRessourcen => "Digitale Medien und Ressourcen",
            Self::BewertungPruefungen => "Digitale Bewertung und Prüfungen",
            Self::Fortbildung => "Digitale Fortbildung für Lehrkräfte",
            Self::Kommunikation => "Digitale Kommunikation und Zusammenarbeit",
            Self::TechnischerSupport => "Technischer Support und Wartung",
            Self::Datenschutz => "Datenschutz und Sicherheit",
            Self::Sonstiges => "Sonstiges zur Digitalisierung",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == value)
    }
}

impl Display for FeedbackCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical urgency domain. The statistics dashboard, the urgent-issue
/// counter and the distribution keys all speak this set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Dringend,
    Hoch,
    Mittel,
    Niedrig,
}

impl Priority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dringend => "dringend",
            Self::Hoch => "hoch",
            Self::Mittel => "mittel",
            Self::Niedrig => "niedrig",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dringend" => Some(Self::Dringend),
            "hoch" => Some(Self::Hoch),
            "mittel" => Some(Self::Mittel),
            "niedrig" => Some(Self::Niedrig),
            _ => None,
        }
    }

    /// Whether records of this priority count towards the urgent-issue total.
    #[must_use]
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::Dringend | Self::Hoch)
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle tag of a stored record. Only one state exists today; the core
/// defines no transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum RecordStatus {
    #[serde(rename = "Eingereicht")]
    Eingereicht,
}

impl RecordStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eingereicht => "Eingereicht",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Eingereicht" => Some(Self::Eingereicht),
            _ => None,
        }
    }
}

/// A feedback submission as handed over by the form, before the store has
/// assigned id, timestamp and status.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FeedbackSubmission {
    pub name: String,
    pub email: String,
    pub school: String,
    pub district: String,
    pub category: FeedbackCategory,
    pub priority: Priority,
    pub subject: String,
    pub message: String,
    pub anonymous: bool,
}

impl FeedbackSubmission {
    /// Check the required fields before anything is persisted.
    ///
    /// # Errors
    /// Returns [`CoreError::Validation`] when subject or message is empty
    /// after trimming. Category and priority are enforced by the type.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.subject.trim().is_empty() {
            return Err(CoreError::Validation("subject must not be empty".to_string()));
        }
        if self.message.trim().is_empty() {
            return Err(CoreError::Validation("message must not be empty".to_string()));
        }
        Ok(())
    }

    /// Strip identity fields when the submission is anonymous. The store
    /// applies this before the durable write, so the original values are
    /// never recoverable.
    #[must_use]
    pub fn redacted(mut self) -> Self {
        if self.anonymous {
            self.name = ANONYMOUS_NAME.to_string();
            self.email = String::new();
        }
        self
    }
}

/// One stored feedback record; append-only, never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FeedbackRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub school: String,
    pub district: String,
    pub category: FeedbackCategory,
    pub priority: Priority,
    pub subject: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub status: RecordStatus,
    pub anonymous: bool,
    /// Poll answers attached for display alongside the feedback entry.
    /// Not written by the feedback submission path itself.
    #[serde(default)]
    pub poll_responses: BTreeMap<String, String>,
}

/// A poll submission before the store has assigned id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct PollSubmission {
    pub responses: BTreeMap<String, String>,
    pub anonymous: bool,
}

impl PollSubmission {
    /// # Errors
    /// Returns [`CoreError::Validation`] when no question was answered.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.responses.is_empty() {
            return Err(CoreError::Validation(
                "at least one poll question must be answered".to_string(),
            ));
        }
        Ok(())
    }
}

/// One stored poll response. Carries no identity fields; the anonymous
/// flag is recorded as submitted but redacts nothing.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct PollResponseRecord {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub responses: BTreeMap<String, String>,
    pub anonymous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> FeedbackSubmission {
        FeedbackSubmission {
            name: "Maria Huber".to_string(),
            email: "maria.huber@schule.bayern.de".to_string(),
            school: "Gymnasium Freising".to_string(),
            district: "Oberbayern".to_string(),
            category: FeedbackCategory::Infrastruktur,
            priority: Priority::Hoch,
            subject: "WLAN im Altbau".to_string(),
            message: "Das WLAN fällt im Altbau täglich aus.".to_string(),
            anonymous: false,
        }
    }

    #[test]
    fn validate_accepts_complete_submission() {
        assert_eq!(submission().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_blank_subject() {
        let mut s = submission();
        s.subject = "   ".to_string();
        let err = match s.validate() {
            Ok(()) => panic!("blank subject should be rejected"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn validate_rejects_blank_message() {
        let mut s = submission();
        s.message = String::new();
        assert!(s.validate().is_err());
    }

    #[test]
    fn redacted_strips_identity_when_anonymous() {
        let mut s = submission();
        s.anonymous = true;
        let redacted = s.redacted();
        assert_eq!(redacted.name, ANONYMOUS_NAME);
        assert_eq!(redacted.email, "");
        assert_eq!(redacted.school, "Gymnasium Freising");
    }

    #[test]
    fn redacted_keeps_identity_when_not_anonymous() {
        let redacted = submission().redacted();
        assert_eq!(redacted.name, "Maria Huber");
        assert_eq!(redacted.email, "maria.huber@schule.bayern.de");
    }

    #[test]
    fn poll_submission_requires_an_answer() {
        let empty = PollSubmission { responses: BTreeMap::new(), anonymous: false };
        assert!(empty.validate().is_err());

        let mut responses = BTreeMap::new();
        responses.insert("workload_2024".to_string(), "Zu hoch".to_string());
        let filled = PollSubmission { responses, anonymous: true };
        assert_eq!(filled.validate(), Ok(()));
    }

    #[test]
    fn category_labels_round_trip_through_parse() {
        for category in FeedbackCategory::ALL {
            assert_eq!(FeedbackCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(FeedbackCategory::parse("Mensa-Essen"), None);
    }

    #[test]
    fn priority_parse_covers_the_urgency_domain() {
        assert_eq!(Priority::parse("dringend"), Some(Priority::Dringend));
        assert_eq!(Priority::parse("niedrig"), Some(Priority::Niedrig));
        assert_eq!(Priority::parse("unterricht"), None);
        assert!(Priority::Dringend.is_urgent());
        assert!(Priority::Hoch.is_urgent());
        assert!(!Priority::Mittel.is_urgent());
        assert!(!Priority::Niedrig.is_urgent());
    }

    #[test]
    fn district_catalog_has_no_duplicates() {
        for (i, a) in DISTRICTS.iter().enumerate() {
            for b in &DISTRICTS[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(DISTRICTS.contains(&"Oberbayern"));
    }

    #[test]
    fn category_serializes_as_full_label() {
        let json = match serde_json::to_string(&FeedbackCategory::Datenschutz) {
            Ok(json) => json,
            Err(err) => panic!("category should serialize: {err}"),
        };
        assert_eq!(json, "\"Datenschutz und Sicherheit\"");
    }
}
