//! Session snapshots and in-process change notification. Persistence of
//! the flags lives in the store; this module only models the two session
//! domains and lets components react to login/logout without re-polling.

use serde::{Deserialize, Serialize};

use crate::auth::TeacherIdentity;

/// The two independent session domains. A teacher session confers no
/// backend access and vice versa.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SessionDomain {
    Teacher,
    Backend,
}

/// Snapshot of the teacher session, as persisted by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct TeacherSession {
    pub authenticated: bool,
    pub identity: Option<TeacherIdentity>,
}

/// Snapshot of the administrative session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct BackendSession {
    pub authenticated: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionEvent {
    TeacherLoggedIn(TeacherIdentity),
    TeacherLoggedOut,
    BackendLoggedIn(String),
    BackendLoggedOut,
}

impl SessionEvent {
    #[must_use]
    pub fn domain(&self) -> SessionDomain {
        match self {
            Self::TeacherLoggedIn(_) | Self::TeacherLoggedOut => SessionDomain::Teacher,
            Self::BackendLoggedIn(_) | Self::BackendLoggedOut => SessionDomain::Backend,
        }
    }
}

/// Fan-out of session changes to in-process subscribers. Listeners are
/// invoked synchronously in subscription order.
#[derive(Default)]
pub struct SessionWatch {
    listeners: Vec<Box<dyn FnMut(&SessionEvent)>>,
}

impl SessionWatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&SessionEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn notify(&mut self, event: &SessionEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for SessionWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWatch")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn events_know_their_domain() {
        assert_eq!(SessionEvent::TeacherLoggedOut.domain(), SessionDomain::Teacher);
        assert_eq!(
            SessionEvent::BackendLoggedIn("admin".to_string()).domain(),
            SessionDomain::Backend
        );
    }

    #[test]
    fn watch_delivers_to_every_subscriber() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut watch = SessionWatch::new();
        for tag in ["a", "b"] {
            let seen = Rc::clone(&seen);
            watch.subscribe(move |event| {
                if matches!(event, SessionEvent::TeacherLoggedOut) {
                    seen.borrow_mut().push(tag);
                }
            });
        }
        watch.notify(&SessionEvent::TeacherLoggedOut);
        watch.notify(&SessionEvent::BackendLoggedOut);
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }
}
