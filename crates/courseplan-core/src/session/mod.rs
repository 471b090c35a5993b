//! Session model and the time-conflict predicate.
//!
//! A [`Session`] is one concrete meeting pattern of a course offering (lecture
//! "A", quiz section "AA", ...). Sessions are read-only snapshots from the
//! course data provider; nothing in the engine mutates them.

pub mod kind;
pub mod meeting;

use serde::{Deserialize, Serialize};

pub use kind::{classify, SessionGroups, SessionKind, Slot};
pub use meeting::{Meeting, MeetingDays, TimeRange, Weekday};

/// Lifecycle state of a session offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKey {
    #[default]
    Active,
    Cancelled,
    Suspended,
    Withdrawn,
    #[serde(other)]
    Other,
}

/// Enrollment status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnrollStatus {
    #[default]
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "closed")]
    Closed,
    #[serde(rename = "add code required")]
    AddCodeRequired,
    #[serde(rename = "faculty code required")]
    FacultyCodeRequired,
    #[serde(other, rename = "other")]
    Other,
}

/// Effective enrollment state, derived from state key, seat counts and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrollState {
    Open,
    Closed,
    AddCodeRequired,
    FacultyCodeRequired,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SessionRecord")]
pub struct Session {
    pub id: String,
    /// Raw provider code. `kind()` is tagged from it at construction.
    pub code: String,
    #[serde(skip)]
    tag: SessionKind,
    pub term_id: String,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
    #[serde(default)]
    pub enroll_count: u32,
    #[serde(default)]
    pub enroll_maximum: u32,
    #[serde(default)]
    pub state_key: StateKey,
    #[serde(default)]
    pub enroll_status: EnrollStatus,
    /// Free-form session type ("lecture", "quiz", "lab").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_code: Option<String>,
}

/// Wire shape of a session; deserialising tags the code once.
#[derive(Deserialize)]
struct SessionRecord {
    id: String,
    code: String,
    term_id: String,
    #[serde(default)]
    meetings: Vec<Meeting>,
    #[serde(default)]
    enroll_count: u32,
    #[serde(default)]
    enroll_maximum: u32,
    #[serde(default)]
    state_key: StateKey,
    #[serde(default)]
    enroll_status: EnrollStatus,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    instructor: Option<String>,
    #[serde(default)]
    registration_code: Option<String>,
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Self {
            tag: SessionKind::from_code(&record.code),
            id: record.id,
            code: record.code,
            term_id: record.term_id,
            meetings: record.meetings,
            enroll_count: record.enroll_count,
            enroll_maximum: record.enroll_maximum,
            state_key: record.state_key,
            enroll_status: record.enroll_status,
            kind: record.kind,
            instructor: record.instructor,
            registration_code: record.registration_code,
        }
    }
}

impl Session {
    /// An active, open session with no meetings yet.
    pub fn new(id: impl Into<String>, code: impl Into<String>, term_id: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            id: id.into(),
            tag: SessionKind::from_code(&code),
            code,
            term_id: term_id.into(),
            meetings: Vec::new(),
            enroll_count: 0,
            enroll_maximum: 0,
            state_key: StateKey::Active,
            enroll_status: EnrollStatus::Open,
            kind: None,
            instructor: None,
            registration_code: None,
        }
    }

    pub fn with_meeting(mut self, meeting: Meeting) -> Self {
        self.meetings.push(meeting);
        self
    }

    pub fn meets(self, days: MeetingDays, time: TimeRange) -> Self {
        self.with_meeting(Meeting::new(days, time))
    }

    pub fn with_enrollment(mut self, count: u32, maximum: u32) -> Self {
        self.enroll_count = count;
        self.enroll_maximum = maximum;
        self
    }

    pub fn with_state(mut self, state_key: StateKey) -> Self {
        self.state_key = state_key;
        self
    }

    pub fn with_status(mut self, status: EnrollStatus) -> Self {
        self.enroll_status = status;
        self
    }

    pub fn kind(&self) -> &SessionKind {
        &self.tag
    }

    pub fn slot(&self) -> Slot {
        self.tag.slot()
    }

    /// True when no meeting has both days and a time.
    pub fn is_tba(&self) -> bool {
        self.meetings.iter().all(Meeting::is_tba)
    }

    /// Closed when not active, or when every seat is taken.
    pub fn is_closed(&self) -> bool {
        self.state_key != StateKey::Active
            || (self.enroll_maximum > 0 && self.enroll_count >= self.enroll_maximum)
    }

    /// Requires an add or faculty code, independent of open/closed.
    pub fn requires_code(&self) -> bool {
        matches!(
            self.enroll_status,
            EnrollStatus::AddCodeRequired | EnrollStatus::FacultyCodeRequired
        )
    }

    pub fn enroll_state(&self) -> EnrollState {
        if self.state_key != StateKey::Active {
            return EnrollState::Inactive;
        }
        if self.is_closed() {
            return EnrollState::Closed;
        }
        match self.enroll_status {
            EnrollStatus::AddCodeRequired => EnrollState::AddCodeRequired,
            EnrollStatus::FacultyCodeRequired => EnrollState::FacultyCodeRequired,
            _ => EnrollState::Open,
        }
    }

    pub fn seats_remaining(&self) -> Option<u32> {
        (self.enroll_maximum > 0).then(|| self.enroll_maximum.saturating_sub(self.enroll_count))
    }

    pub fn conflicts_with(&self, other: &Session) -> bool {
        conflicts(self, other)
    }
}

/// Whether two sessions meet at the same time on a shared day.
///
/// TBA meetings never conflict, back-to-back meetings never conflict, and a
/// session never conflicts with itself (same id).
pub fn conflicts(a: &Session, b: &Session) -> bool {
    if a.id == b.id {
        return false;
    }
    a.meetings
        .iter()
        .any(|ma| b.meetings.iter().any(|mb| ma.overlaps(mb)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(id: &str, days: &str, time: &str) -> Session {
        Session::new(id, "A", "2025-au").with_meeting(Meeting::parse(days, time).unwrap())
    }

    #[test]
    fn overlapping_sessions_on_shared_day_conflict() {
        let a = at("a", "M", "09:00-09:50");
        let b = at("b", "M", "09:40-10:30");
        assert!(conflicts(&a, &b));
        assert!(conflicts(&b, &a));
    }

    #[test]
    fn back_to_back_sessions_do_not_conflict() {
        let a = at("a", "M", "09:00-09:50");
        let c = at("c", "M", "09:50-10:40");
        assert!(!conflicts(&a, &c));
    }

    #[test]
    fn disjoint_days_never_conflict() {
        let a = at("a", "MWF", "09:00-09:50");
        let b = at("b", "TTh", "09:00-10:20");
        assert!(!conflicts(&a, &b));
    }

    #[test]
    fn session_does_not_conflict_with_itself() {
        let a = at("a", "MWF", "09:00-09:50");
        assert!(!conflicts(&a, &a.clone()));
    }

    #[test]
    fn tba_sessions_never_conflict() {
        let a = at("a", "MWF", "09:00-09:50");
        let tba = Session::new("t", "B", "2025-au").with_meeting(Meeting::tba());
        let empty = Session::new("e", "C", "2025-au");
        assert!(tba.is_tba() && empty.is_tba());
        assert!(!conflicts(&a, &tba));
        assert!(!conflicts(&empty, &a));
    }

    #[test]
    fn any_meeting_pair_can_conflict() {
        let lecture_and_lab = Session::new("x", "A", "2025-au")
            .with_meeting(Meeting::parse("MWF", "10:30-11:20").unwrap())
            .with_meeting(Meeting::parse("Th", "13:30-15:20").unwrap());
        let other = at("y", "TTh", "14:30-15:50");
        assert!(conflicts(&lecture_and_lab, &other));
    }

    #[test]
    fn closed_when_full_or_inactive() {
        let base = Session::new("a", "A", "t");
        assert!(!base.is_closed());
        assert!(base.clone().with_enrollment(30, 30).is_closed());
        assert!(!base.clone().with_enrollment(29, 30).is_closed());
        // No cap means never full.
        assert!(!base.clone().with_enrollment(500, 0).is_closed());
        assert!(base.clone().with_state(StateKey::Cancelled).is_closed());
    }

    #[test]
    fn code_requirement_is_independent_of_closed() {
        let s = Session::new("a", "A", "t")
            .with_status(EnrollStatus::FacultyCodeRequired)
            .with_enrollment(10, 10);
        assert!(s.requires_code());
        assert!(s.is_closed());
        assert_eq!(s.enroll_state(), EnrollState::Closed);
    }

    #[test]
    fn enroll_state_precedence() {
        let s = Session::new("a", "A", "t");
        assert_eq!(s.enroll_state(), EnrollState::Open);
        assert_eq!(
            s.clone().with_status(EnrollStatus::AddCodeRequired).enroll_state(),
            EnrollState::AddCodeRequired
        );
        assert_eq!(
            s.clone().with_state(StateKey::Suspended).enroll_state(),
            EnrollState::Inactive
        );
        assert_eq!(s.with_enrollment(5, 20).seats_remaining(), Some(15));
    }

    #[test]
    fn deserializes_provider_shape() {
        let json = serde_json::json!({
            "id": "12345",
            "code": "AA",
            "term_id": "2025-au",
            "meetings": [{ "days": "Th", "time": "8:30 AM - 9:20 AM", "building": "SAV", "room": "130" }],
            "enroll_count": 18,
            "enroll_maximum": 25,
            "state_key": "active",
            "enroll_status": "add code required"
        });
        let s: Session = serde_json::from_value(json).unwrap();
        assert_eq!(s.slot(), Slot::Secondary);
        assert!(s.requires_code());
        assert_eq!(s.meetings[0].time.unwrap().start(), 510);
    }

    #[test]
    fn unknown_states_fall_back_to_other() {
        let json = serde_json::json!({
            "id": "1", "code": "A", "term_id": "t",
            "state_key": "deleted", "enroll_status": "waitlist"
        });
        let s: Session = serde_json::from_value(json).unwrap();
        assert_eq!(s.state_key, StateKey::Other);
        assert_eq!(s.enroll_status, EnrollStatus::Other);
        assert!(s.is_closed());
    }

    #[test]
    fn code_is_tagged_when_loaded() {
        let json = serde_json::json!({ "id": "2", "code": "ab", "term_id": "t" });
        let s: Session = serde_json::from_value(json).unwrap();
        assert_eq!(
            s.kind(),
            &SessionKind::Secondary {
                code: "AB".to_string(),
                parent: "A".to_string()
            }
        );
        assert_eq!(s, Session::new("2", "ab", "t"));

        let written = serde_json::to_value(&s).unwrap();
        assert!(written.get("tag").is_none());
        let reloaded: Session = serde_json::from_value(written).unwrap();
        assert_eq!(reloaded.slot(), Slot::Secondary);
    }
}
