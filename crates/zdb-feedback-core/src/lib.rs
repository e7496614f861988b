//! Domain core for the Zukunft Digitale Bildung teacher feedback platform:
//! record types and validation, the aggregation engine, the (stubbed)
//! insight generator, and the credential/session rules. Everything in this
//! crate is pure; durable persistence lives in `zdb-feedback-store-sqlite`.

pub mod auth;
pub mod insight;
pub mod model;
pub mod poll;
pub mod session;
pub mod stats;

pub use auth::{
    authenticate_backend, validate_registration, Registration, RegistrationError,
    TeacherIdentity, BACKEND_USERNAME, EMAIL_DOMAIN_SUFFIX, MIN_PASSWORD_LEN,
};
pub use insight::{analyze, InsightSource, InsightSummary, StaticInsightSource};
pub use model::{
    CoreError, FeedbackCategory, FeedbackRecord, FeedbackSubmission, PollResponseRecord,
    PollSubmission, Priority, RecordStatus, ANONYMOUS_NAME, DISTRICTS,
};
pub use poll::{poll_question, PollQuestion, POLL_QUESTIONS};
pub use session::{
    BackendSession, SessionDomain, SessionEvent, SessionWatch, TeacherSession,
};
pub use stats::{percentage, FeedbackStats, PollStats};
