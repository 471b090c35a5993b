//! Outcomes of selection checks and commands.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Slot;

/// Short machine-readable reason codes, as shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationReason {
    SingleLetterExists,
    DoubleLetterExists,
    TimeConflict,
    SwitchSingleLetter,
    SwitchDoubleLetter,
    DoubleLetterPrefixMismatch,
    LinkedPrimaryMissing,
}

impl ViolationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationReason::SingleLetterExists => "single-letter-exists",
            ViolationReason::DoubleLetterExists => "double-letter-exists",
            ViolationReason::TimeConflict => "time-conflict",
            ViolationReason::SwitchSingleLetter => "switch-single-letter",
            ViolationReason::SwitchDoubleLetter => "switch-double-letter",
            ViolationReason::DoubleLetterPrefixMismatch => "double-letter-prefix-mismatch",
            ViolationReason::LinkedPrimaryMissing => "linked-primary-missing",
        }
    }

    pub fn is_switch(self) -> bool {
        matches!(
            self,
            ViolationReason::SwitchSingleLetter | ViolationReason::SwitchDoubleLetter
        )
    }

    /// User-facing hint text.
    pub fn message(self) -> &'static str {
        match self {
            ViolationReason::SingleLetterExists => {
                "Single-letter session already added for this course"
            }
            ViolationReason::DoubleLetterExists => {
                "Double-letter session already added for this course"
            }
            ViolationReason::TimeConflict => "Time conflict with your schedule",
            ViolationReason::SwitchSingleLetter | ViolationReason::SwitchDoubleLetter => {
                "Switch to this session"
            }
            ViolationReason::DoubleLetterPrefixMismatch => {
                "Choose a double-letter session that starts with your selected single-letter session"
            }
            ViolationReason::LinkedPrimaryMissing => {
                "Add the matching single-letter session first"
            }
        }
    }

    fn switch_for(slot: Slot) -> Self {
        match slot {
            Slot::Primary => ViolationReason::SwitchSingleLetter,
            Slot::Secondary => ViolationReason::SwitchDoubleLetter,
        }
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a selection command did not change the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "rejection", rename_all = "kebab-case")]
pub enum Rejection {
    #[error("a {slot} session is already added for this course")]
    AlreadyAttached { slot: Slot },

    #[error("time conflict with {course_code} {session_code}")]
    TimeConflict {
        course_id: String,
        course_code: String,
        session_id: String,
        session_code: String,
    },

    /// Soft rejection: the slot holds another session and the caller may
    /// switch to the candidate instead.
    #[error("{existing} already occupies the {slot} slot; switch instead")]
    SwitchRequired { slot: Slot, existing: String },

    #[error("double-letter session {found} does not belong to single-letter session {expected}")]
    PrefixMismatch { expected: String, found: String },

    #[error("single-letter session {parent} must be added first")]
    LinkedPrimaryMissing { parent: String },

    #[error("session {session_id} is not attached to course {course_id}")]
    NotAttached { course_id: String, session_id: String },

    #[error("cannot switch a {from} session for a {to} session")]
    SlotMismatch { from: Slot, to: Slot },

    #[error("course {course_code} already has sessions")]
    CourseAlreadyScheduled { course_code: String },
}

impl Rejection {
    pub fn reason(&self) -> Option<ViolationReason> {
        match self {
            Rejection::AlreadyAttached { slot: Slot::Primary } => {
                Some(ViolationReason::SingleLetterExists)
            }
            Rejection::AlreadyAttached { slot: Slot::Secondary } => {
                Some(ViolationReason::DoubleLetterExists)
            }
            Rejection::TimeConflict { .. } => Some(ViolationReason::TimeConflict),
            Rejection::SwitchRequired { slot, .. } => Some(ViolationReason::switch_for(*slot)),
            Rejection::PrefixMismatch { .. } => Some(ViolationReason::DoubleLetterPrefixMismatch),
            Rejection::LinkedPrimaryMissing { .. } => Some(ViolationReason::LinkedPrimaryMissing),
            Rejection::NotAttached { .. }
            | Rejection::SlotMismatch { .. }
            | Rejection::CourseAlreadyScheduled { .. } => None,
        }
    }

    /// Everything except a switch opportunity.
    pub fn is_hard(&self) -> bool {
        !matches!(self, Rejection::SwitchRequired { .. })
    }
}

/// Result of asking whether a session can be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    /// The course already holds a different session in this slot; adding
    /// means replacing `existing` (see `ScheduleSelection::switch`).
    SwitchAvailable { slot: Slot, existing: String },
    Rejected(Rejection),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }

    pub fn can_switch(&self) -> bool {
        matches!(self, Eligibility::SwitchAvailable { .. })
    }

    pub fn reason(&self) -> Option<ViolationReason> {
        match self {
            Eligibility::Allowed => None,
            Eligibility::SwitchAvailable { slot, .. } => Some(ViolationReason::switch_for(*slot)),
            Eligibility::Rejected(r) => r.reason(),
        }
    }

    /// Turn anything but `Allowed` into a rejection.
    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Eligibility::Allowed => Ok(()),
            Eligibility::SwitchAvailable { slot, existing } => {
                Err(Rejection::SwitchRequired { slot, existing })
            }
            Eligibility::Rejected(r) => Err(r),
        }
    }
}
