//! The fixed poll catalog. Question ids and option texts are stable
//! identifiers; stored responses reference them verbatim.

/// One poll question with its closed answer set.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PollQuestion {
    pub id: &'static str,
    pub question: &'static str,
    pub options: [&'static str; 5],
}

pub const POLL_QUESTIONS: [PollQuestion; 5] = [
    PollQuestion {
        id: "workload_2024",
        question: "Wie bewerten Sie Ihre aktuelle Arbeitsbelastung im Schuljahr 2024/25?",
        options: ["Deutlich zu niedrig", "Zu niedrig", "Angemessen", "Zu hoch", "Deutlich zu hoch"],
    },
    PollQuestion {
        id: "digital_equipment",
        question: "Wie bewerten Sie die digitale Ausstattung an Ihrer Schule?",
        options: ["Sehr gut", "Gut", "Ausreichend", "Mangelhaft", "Ungenügend"],
    },
    PollQuestion {
        id: "curriculum_changes",
        question: "Wie stehen Sie zu den geplanten Lehrplanänderungen?",
        options: ["Sehr positiv", "Positiv", "Neutral", "Negativ", "Sehr negativ"],
    },
    PollQuestion {
        id: "remote_teaching",
        question: "Wie bewerten Sie die Fortschritte beim digitalen Unterricht seit 2020?",
        options: [
            "Sehr große Fortschritte",
            "Große Fortschritte",
            "Moderate Fortschritte",
            "Geringe Fortschritte",
            "Keine Fortschritte",
        ],
    },
    PollQuestion {
        id: "support_systems",
        question: "Welche Unterstützung benötigen Sie am dringendsten?",
        options: [
            "Mehr Personal",
            "Bessere Ausstattung",
            "Weniger Bürokratie",
            "Mehr Fortbildungen",
            "Höhere Bezahlung",
        ],
    },
];

/// Look up a catalog question by id.
#[must_use]
pub fn poll_question(id: &str) -> Option<&'static PollQuestion> {
    POLL_QUESTIONS.iter().find(|q| q.id == id)
}
