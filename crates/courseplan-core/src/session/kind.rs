//! Primary / secondary session classification.
//!
//! A session code with exactly one letter (`"A"`) is a primary session; a code
//! with two or more letters (`"AA"`, `"AB"`) is a secondary session linked to
//! the primary whose letter matches its first letter. Non-letter characters are
//! ignored when counting letters. Codes without any letters are standalone
//! primaries: they are kept, but no secondary can ever link to them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Session;

/// Which per-course slot a session occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Slot {
    /// Single-letter code.
    Primary,
    /// Double-letter code.
    Secondary,
}

impl Slot {
    pub fn label(self) -> &'static str {
        match self {
            Slot::Primary => "single-letter",
            Slot::Secondary => "double-letter",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tagged form of a session code, derived once from the raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionKind {
    Primary { code: String },
    Secondary { code: String, parent: String },
}

impl SessionKind {
    pub fn from_code(raw: &str) -> Self {
        let letters: Vec<char> = raw
            .chars()
            .filter(char::is_ascii_alphabetic)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match letters.as_slice() {
            [] => SessionKind::Primary {
                code: raw.trim().to_string(),
            },
            [single] => SessionKind::Primary {
                code: single.to_string(),
            },
            [first, ..] => SessionKind::Secondary {
                code: letters.iter().collect(),
                parent: first.to_string(),
            },
        }
    }

    pub fn slot(&self) -> Slot {
        match self {
            SessionKind::Primary { .. } => Slot::Primary,
            SessionKind::Secondary { .. } => Slot::Secondary,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            SessionKind::Primary { code } | SessionKind::Secondary { code, .. } => code,
        }
    }

    pub fn parent(&self) -> Option<&str> {
        match self {
            SessionKind::Secondary { parent, .. } => Some(parent),
            SessionKind::Primary { .. } => None,
        }
    }

    /// Whether `self` is a secondary whose parent letter is `primary`'s code.
    pub fn links_to(&self, primary: &SessionKind) -> bool {
        match (self, primary) {
            (SessionKind::Secondary { parent, .. }, SessionKind::Primary { code }) => parent == code,
            _ => false,
        }
    }
}

/// Sessions of one course offering, split by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionGroups {
    /// Primary sessions in input order.
    pub primaries: Vec<Session>,
    /// Secondaries keyed by the id of each primary they link to, in input order.
    pub linked: BTreeMap<String, Vec<Session>>,
    /// Secondaries whose parent letter matches no primary.
    pub unlinked: Vec<Session>,
}

impl SessionGroups {
    pub fn secondaries_for(&self, primary_id: &str) -> &[Session] {
        self.linked.get(primary_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_secondaries(&self, primary_id: &str) -> bool {
        !self.secondaries_for(primary_id).is_empty()
    }

    /// First primary a secondary links to.
    pub fn parent_of(&self, secondary: &Session) -> Option<&Session> {
        let kind = secondary.kind();
        self.primaries.iter().find(|p| kind.links_to(p.kind()))
    }
}

/// Classify the sessions of one course offering.
///
/// When several primaries share a letter, a matching secondary is linked to
/// each of them.
pub fn classify(sessions: &[Session]) -> SessionGroups {
    let mut groups = SessionGroups::default();
    let kinds: Vec<&SessionKind> = sessions.iter().map(Session::kind).collect();

    for (session, kind) in sessions.iter().zip(&kinds) {
        if kind.slot() == Slot::Primary {
            groups.primaries.push(session.clone());
        }
    }

    for (session, kind) in sessions.iter().zip(&kinds) {
        if kind.slot() != Slot::Secondary {
            continue;
        }
        let mut linked = false;
        for (primary, primary_kind) in sessions.iter().zip(&kinds) {
            if kind.links_to(primary_kind) {
                groups
                    .linked
                    .entry(primary.id.clone())
                    .or_default()
                    .push(session.clone());
                linked = true;
            }
        }
        if !linked {
            groups.unlinked.push(session.clone());
        }
    }

    groups
}
