//! Session filter applied before schedule generation.

use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Which kinds of not-immediately-enrollable sessions the generator may use.
///
/// The default excludes both closed and code-required sessions, so a
/// generated schedule is one the student can actually register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Keep sessions that are full or not active.
    #[serde(default)]
    pub include_closed_sessions: bool,
    /// Keep sessions needing an add or faculty code.
    #[serde(default)]
    pub include_courses_requiring_codes: bool,
}

impl GenerationOptions {
    pub fn permissive() -> Self {
        Self {
            include_closed_sessions: true,
            include_courses_requiring_codes: true,
        }
    }

    pub fn admits(&self, session: &Session) -> bool {
        if !self.include_closed_sessions && session.is_closed() {
            return false;
        }
        if !self.include_courses_requiring_codes && session.requires_code() {
            return false;
        }
        true
    }
}

/// Sessions `options` admits, in input order.
pub fn filter_sessions(sessions: &[Session], options: &GenerationOptions) -> Vec<Session> {
    sessions
        .iter()
        .filter(|s| options.admits(s))
        .cloned()
        .collect()
}
