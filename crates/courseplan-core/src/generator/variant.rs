//! Generated schedule variants and the board that holds them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CourseInfo;
use crate::session::{conflicts, EnrollState, Session};

/// One course's sessions within a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAssignment {
    pub course: CourseInfo,
    pub primary: Session,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Session>,
}

impl CourseAssignment {
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        std::iter::once(&self.primary).chain(self.secondary.as_ref())
    }

    pub fn conflicts_with(&self, other: &CourseAssignment) -> bool {
        self.sessions()
            .any(|a| other.sessions().any(|b| conflicts(a, b)))
    }

    pub fn conflicts_with_session(&self, session: &Session) -> bool {
        self.sessions().any(|a| conflicts(a, session))
    }

    /// "A" or "A/AB".
    pub fn label(&self) -> String {
        match &self.secondary {
            Some(secondary) => format!("{}/{}", self.primary.code, secondary.code),
            None => self.primary.code.clone(),
        }
    }
}

/// A conflict-free choice of sessions, one assignment per requested course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleVariant {
    /// `variant-N`, by rank.
    pub id: String,
    pub assignments: Vec<CourseAssignment>,
    pub score: i64,
}

impl ScheduleVariant {
    pub fn new(assignments: Vec<CourseAssignment>) -> Self {
        Self {
            id: String::new(),
            assignments,
            score: 0,
        }
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.assignments.iter().flat_map(CourseAssignment::sessions)
    }

    /// Chosen session ids in course order.
    pub fn session_ids(&self) -> Vec<&str> {
        self.sessions().map(|s| s.id.as_str()).collect()
    }

    pub fn assignment(&self, course_code: &str) -> Option<&CourseAssignment> {
        self.assignments
            .iter()
            .find(|a| a.course.course_code.eq_ignore_ascii_case(course_code))
    }

    /// Open sessions minus `code_penalty` per code-required session.
    pub fn compute_score(&self, code_penalty: i64) -> i64 {
        self.sessions()
            .map(|s| {
                let open = i64::from(s.enroll_state() == EnrollState::Open);
                let coded = i64::from(s.requires_code());
                open - code_penalty * coded
            })
            .sum()
    }

    pub fn is_conflict_free(&self) -> bool {
        let sessions: Vec<&Session> = self.sessions().collect();
        sessions.iter().enumerate().all(|(i, a)| {
            sessions[i + 1..].iter().all(|b| !conflicts(a, b))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("unknown variant: {0}")]
    UnknownVariant(String),
    #[error("at most {max} variants can be pinned")]
    LimitReached { max: usize },
}

pub const DEFAULT_MAX_PINNED: usize = 3;

/// Latest generated variants plus the ones the student pinned to compare.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantBoard {
    variants: Vec<ScheduleVariant>,
    pinned: BTreeSet<String>,
    max_pinned: usize,
}

impl Default for VariantBoard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PINNED)
    }
}

impl VariantBoard {
    pub fn new(max_pinned: usize) -> Self {
        Self {
            variants: Vec::new(),
            pinned: BTreeSet::new(),
            max_pinned,
        }
    }

    pub fn variants(&self) -> &[ScheduleVariant] {
        &self.variants
    }

    pub fn get(&self, id: &str) -> Option<&ScheduleVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Replace the variants. Pins survive when their id is still present.
    pub fn set_variants(&mut self, variants: Vec<ScheduleVariant>) {
        self.pinned
            .retain(|id| variants.iter().any(|v| &v.id == id));
        self.variants = variants;
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.pinned.contains(id)
    }

    /// Pinned variants in rank order.
    pub fn pinned(&self) -> impl Iterator<Item = &ScheduleVariant> {
        self.variants.iter().filter(move |v| self.pinned.contains(&v.id))
    }

    /// Pin or unpin a variant. Returns whether it is pinned afterwards.
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool, PinError> {
        if self.pinned.remove(id) {
            return Ok(false);
        }
        if self.get(id).is_none() {
            return Err(PinError::UnknownVariant(id.to_string()));
        }
        if self.pinned.len() >= self.max_pinned {
            return Err(PinError::LimitReached {
                max: self.max_pinned,
            });
        }
        self.pinned.insert(id.to_string());
        Ok(true)
    }

    pub fn clear_pins(&mut self) {
        self.pinned.clear();
    }

    pub fn clear(&mut self) {
        self.variants.clear();
        self.pinned.clear();
    }
}
