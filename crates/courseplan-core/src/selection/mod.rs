//! The student's committed schedule.
//!
//! [`ScheduleSelection`] keeps one [`ScheduledCourse`] per course id, each
//! holding at most one primary and at most one secondary session. Every
//! command validates against the current state first and only then commits,
//! so a rejected command leaves the schedule exactly as it was.

pub mod eligibility;
pub mod shared;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::{CourseInfo, CourseOffering, SessionProvider};
use crate::generator::{FixedSession, GenerationRequest, ScheduleVariant};
use crate::session::{Session, Slot, Weekday};

pub use eligibility::{Eligibility, Rejection, ViolationReason};
pub use shared::SharedSelection;

/// A course the student tracks, with the sessions attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCourse {
    pub course_id: String,
    pub course_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_credit: Option<String>,
    pub term_id: String,
    /// Student-entered credit value, used instead of `course_credit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_overwrite: Option<f32>,
    /// Primary first, then its secondary.
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl ScheduledCourse {
    pub fn new(course: &CourseInfo) -> Self {
        Self {
            course_id: course.course_id.clone(),
            course_code: course.course_code.clone(),
            course_title: course.course_title.clone(),
            course_credit: course.course_credit.clone(),
            term_id: course.term_id.clone(),
            credit_overwrite: None,
            sessions: Vec::new(),
        }
    }

    pub fn info(&self) -> CourseInfo {
        CourseInfo {
            course_id: self.course_id.clone(),
            course_code: self.course_code.clone(),
            course_title: self.course_title.clone(),
            course_credit: self.course_credit.clone(),
            term_id: self.term_id.clone(),
        }
    }

    pub fn session_in(&self, slot: Slot) -> Option<&Session> {
        self.sessions.iter().find(|s| s.slot() == slot)
    }

    pub fn primary(&self) -> Option<&Session> {
        self.session_in(Slot::Primary)
    }

    pub fn secondary(&self) -> Option<&Session> {
        self.session_in(Slot::Secondary)
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.iter().any(|s| s.id == session_id)
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Credit override if set, otherwise the leading number of `course_credit`.
    pub fn credits(&self) -> Option<f32> {
        self.credit_overwrite.or_else(|| self.info().credit_value())
    }

    fn insert(&mut self, session: Session) {
        self.sessions.retain(|s| s.slot() != session.slot());
        self.sessions.push(session);
        self.sessions.sort_by_key(Session::slot);
    }

    fn take(&mut self, session_id: &str) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.id == session_id)?;
        Some(self.sessions.remove(index))
    }
}

/// Persisted form of a selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    #[serde(default)]
    pub courses: Vec<ScheduledCourse>,
    /// `None` means every term is live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_terms: Option<BTreeSet<String>>,
}

/// Session ids a committed command attached and detached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionChange {
    pub attached: Vec<String>,
    pub detached: Vec<String>,
    pub created_course: bool,
}

impl SelectionChange {
    pub fn is_noop(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty() && !self.created_course
    }

    fn merge(mut self, other: SelectionChange) -> Self {
        self.attached.extend(other.attached);
        self.detached.extend(other.detached);
        self.created_course |= other.created_course;
        self
    }
}

/// One session meeting placed on a weekday, for calendar rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarBlock {
    pub course_id: String,
    pub course_code: String,
    pub session_id: String,
    pub session_code: String,
    /// Minutes since midnight.
    pub start: u16,
    pub end: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// Live sessions per weekday, each day ordered by start time.
pub type Calendar = BTreeMap<Weekday, Vec<CalendarBlock>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleSelection {
    courses: BTreeMap<String, ScheduledCourse>,
    active_terms: Option<BTreeSet<String>>,
    stale: BTreeSet<String>,
}

impl ScheduleSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: PlanSnapshot) -> Self {
        let courses = snapshot
            .courses
            .into_iter()
            .map(|mut course| {
                course.sessions.sort_by_key(Session::slot);
                (course.course_id.clone(), course)
            })
            .collect();
        Self {
            courses,
            active_terms: snapshot.active_terms,
            stale: BTreeSet::new(),
        }
    }

    pub fn to_snapshot(&self) -> PlanSnapshot {
        PlanSnapshot {
            courses: self.courses.values().cloned().collect(),
            active_terms: self.active_terms.clone(),
        }
    }

    pub fn active_terms(&self) -> Option<&BTreeSet<String>> {
        self.active_terms.as_ref()
    }

    pub fn set_active_terms(&mut self, terms: Option<BTreeSet<String>>) {
        self.active_terms = terms;
    }

    pub fn is_live_term(&self, term_id: &str) -> bool {
        self.active_terms
            .as_ref()
            .map_or(true, |terms| terms.contains(term_id))
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn course(&self, course_id: &str) -> Option<&ScheduledCourse> {
        self.courses.get(course_id)
    }

    pub fn courses(&self) -> impl Iterator<Item = &ScheduledCourse> {
        self.courses.values()
    }

    pub fn is_scheduled(&self, session_id: &str) -> bool {
        self.courses.values().any(|c| c.has_session(session_id))
    }

    pub fn is_stale(&self, session_id: &str) -> bool {
        self.stale.contains(session_id)
    }

    /// Sessions that take part in conflict checks: live term, not stale.
    pub fn live_sessions(&self) -> impl Iterator<Item = (&ScheduledCourse, &Session)> {
        self.courses
            .values()
            .filter(move |c| self.is_live_term(&c.term_id))
            .flat_map(|c| c.sessions.iter().map(move |s| (c, s)))
            .filter(move |(_, s)| !self.stale.contains(&s.id))
    }

    pub fn stale_sessions(&self) -> impl Iterator<Item = (&ScheduledCourse, &Session)> {
        self.courses
            .values()
            .flat_map(|c| c.sessions.iter().map(move |s| (c, s)))
            .filter(move |(_, s)| self.stale.contains(&s.id))
    }

    /// Sum of credits over courses in live terms.
    pub fn total_credits(&self) -> f32 {
        self.courses
            .values()
            .filter(|c| self.is_live_term(&c.term_id))
            .filter_map(ScheduledCourse::credits)
            .sum()
    }

    pub fn calendar(&self) -> Calendar {
        let mut calendar = Calendar::new();
        for (course, session) in self.live_sessions() {
            for meeting in &session.meetings {
                let Some(time) = meeting.time else { continue };
                for day in meeting.days.iter() {
                    calendar.entry(day).or_default().push(CalendarBlock {
                        course_id: course.course_id.clone(),
                        course_code: course.course_code.clone(),
                        session_id: session.id.clone(),
                        session_code: session.code.clone(),
                        start: time.start(),
                        end: time.end(),
                        building: meeting.building.clone(),
                        room: meeting.room.clone(),
                    });
                }
            }
        }
        for blocks in calendar.values_mut() {
            blocks.sort_by(|a, b| (a.start, a.end, &a.course_code).cmp(&(b.start, b.end, &b.course_code)));
        }
        calendar
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Whether `session` may be added to `course`, without changing anything.
    pub fn can_add(&self, session: &Session, course: &CourseInfo) -> Eligibility {
        let entry = self.courses.get(&course.course_id);
        let kind = session.kind();
        let slot = kind.slot();

        if entry.is_some_and(|e| e.has_session(&session.id)) {
            return Eligibility::Rejected(Rejection::AlreadyAttached { slot });
        }

        let displaced = displaced_by(entry, session);
        if let Some(rejection) = self.find_conflict(session, &displaced) {
            return Eligibility::Rejected(rejection);
        }

        if slot == Slot::Secondary {
            match entry.and_then(ScheduledCourse::primary) {
                None => {
                    return Eligibility::Rejected(Rejection::LinkedPrimaryMissing {
                        parent: kind.parent().unwrap_or_default().to_string(),
                    })
                }
                Some(primary) if !kind.links_to(primary.kind()) => {
                    return Eligibility::Rejected(Rejection::PrefixMismatch {
                        expected: primary.code.clone(),
                        found: session.code.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        match entry.and_then(|e| e.session_in(slot)) {
            Some(existing) => Eligibility::SwitchAvailable {
                slot,
                existing: existing.id.clone(),
            },
            None => Eligibility::Allowed,
        }
    }

    fn find_conflict(&self, candidate: &Session, excluded: &[&str]) -> Option<Rejection> {
        self.live_sessions()
            .filter(|(_, s)| !excluded.contains(&s.id.as_str()))
            .find(|(_, s)| candidate.conflicts_with(s))
            .map(|(course, s)| Rejection::TimeConflict {
                course_id: course.course_id.clone(),
                course_code: course.course_code.clone(),
                session_id: s.id.clone(),
                session_code: s.code.clone(),
            })
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Attach `session` to `course`. Only an `Allowed` check commits; an
    /// occupied slot yields [`Rejection::SwitchRequired`].
    pub fn add(&mut self, session: &Session, course: &CourseInfo) -> Result<SelectionChange, Rejection> {
        self.can_add(session, course).into_result()?;
        Ok(self.attach(session.clone(), course))
    }

    /// Like [`add`](Self::add), but a secondary whose primary is not attached
    /// brings its linked primary from `offering` along. Both are attached or
    /// neither is.
    pub fn add_with_parent(
        &mut self,
        session: &Session,
        course: &CourseInfo,
        offering: &CourseOffering,
    ) -> Result<SelectionChange, Rejection> {
        let has_primary = self
            .courses
            .get(&course.course_id)
            .is_some_and(|e| e.primary().is_some());
        if session.slot() == Slot::Primary || has_primary {
            return self.add(session, course);
        }

        let groups = offering.groups();
        let parent = groups
            .parent_of(session)
            .ok_or_else(|| Rejection::LinkedPrimaryMissing {
                parent: session.kind().parent().unwrap_or_default().to_string(),
            })?;

        let mut staged = self.clone();
        let change = staged
            .add(parent, course)?
            .merge(staged.add(session, course)?);
        *self = staged;
        Ok(change)
    }

    /// Remove the session if attached, otherwise add it (with its parent).
    pub fn toggle(
        &mut self,
        session: &Session,
        course: &CourseInfo,
        offering: &CourseOffering,
    ) -> Result<SelectionChange, Rejection> {
        let attached = self
            .courses
            .get(&course.course_id)
            .is_some_and(|e| e.has_session(&session.id));
        if attached {
            Ok(self.remove(&course.course_id, &session.id))
        } else {
            self.add_with_parent(session, course, offering)
        }
    }

    /// Detach a session. Removing a primary also detaches its secondary.
    /// Absent course or session is a no-op.
    pub fn remove(&mut self, course_id: &str, session_id: &str) -> SelectionChange {
        let mut change = SelectionChange::default();
        let Some(entry) = self.courses.get_mut(course_id) else {
            return change;
        };
        let Some(removed) = entry.take(session_id) else {
            return change;
        };
        if removed.slot() == Slot::Primary {
            if let Some(secondary) = entry.secondary().map(|s| s.id.clone()) {
                entry.take(&secondary);
                change.detached.push(secondary);
            }
        }
        change.detached.insert(0, removed.id);
        for id in &change.detached {
            self.stale.remove(id);
        }
        change
    }

    /// Delete the course entry with all its sessions.
    pub fn remove_course(&mut self, course_id: &str) -> Option<ScheduledCourse> {
        let course = self.courses.remove(course_id)?;
        for session in &course.sessions {
            self.stale.remove(&session.id);
        }
        Some(course)
    }

    /// Replace `old_session_id` with `new_session` in the same slot.
    ///
    /// The new session is checked against every other committed session; on
    /// rejection nothing changes. Switching the primary also detaches a
    /// secondary that does not link to the new primary.
    pub fn switch(
        &mut self,
        course: &CourseInfo,
        old_session_id: &str,
        new_session: &Session,
    ) -> Result<SelectionChange, Rejection> {
        let not_attached = || Rejection::NotAttached {
            course_id: course.course_id.clone(),
            session_id: old_session_id.to_string(),
        };
        let entry = self.courses.get(&course.course_id).ok_or_else(not_attached)?;
        let old = entry
            .sessions
            .iter()
            .find(|s| s.id == old_session_id)
            .ok_or_else(not_attached)?;
        if old.slot() != new_session.slot() {
            return Err(Rejection::SlotMismatch {
                from: old.slot(),
                to: new_session.slot(),
            });
        }
        if old.id == new_session.id {
            return Ok(SelectionChange::default());
        }

        match self.can_add(new_session, course) {
            Eligibility::SwitchAvailable { existing, .. } if existing == old_session_id => {}
            Eligibility::SwitchAvailable { slot, existing } => {
                return Err(Rejection::SwitchRequired { slot, existing })
            }
            Eligibility::Allowed => return Err(not_attached()),
            Eligibility::Rejected(rejection) => return Err(rejection),
        }

        let mut change = SelectionChange::default();
        let new_kind = new_session.kind();
        let Some(entry) = self.courses.get_mut(&course.course_id) else {
            return Err(not_attached());
        };
        if new_session.slot() == Slot::Primary {
            let orphan = entry
                .secondary()
                .filter(|s| !s.kind().links_to(new_kind))
                .map(|s| s.id.clone());
            if let Some(orphan) = orphan {
                entry.take(&orphan);
                change.detached.push(orphan);
            }
        }
        entry.take(old_session_id);
        entry.insert(new_session.clone());
        change.detached.insert(0, old_session_id.to_string());
        change.attached.push(new_session.id.clone());
        for id in &change.detached {
            self.stale.remove(id);
        }
        tracing::debug!(
            course = %course.course_code,
            from = old_session_id,
            to = %new_session.id,
            "switched session"
        );
        Ok(change)
    }

    /// Track a course without sessions. Returns false when already tracked.
    pub fn track_course(&mut self, course: &CourseInfo) -> bool {
        if self.courses.contains_key(&course.course_id) {
            return false;
        }
        self.courses
            .insert(course.course_id.clone(), ScheduledCourse::new(course));
        true
    }

    /// Commit every assignment of a generated variant. Target courses must be
    /// empty (or untracked); all assignments commit or none do.
    pub fn apply_variant(&mut self, variant: &ScheduleVariant) -> Result<SelectionChange, Rejection> {
        let mut staged = self.clone();
        let mut change = SelectionChange::default();
        for assignment in &variant.assignments {
            let course = &assignment.course;
            if staged
                .courses
                .get(&course.course_id)
                .is_some_and(|e| !e.is_empty())
            {
                return Err(Rejection::CourseAlreadyScheduled {
                    course_code: course.course_code.clone(),
                });
            }
            for session in assignment.sessions() {
                change = change.merge(staged.add(session, course)?);
            }
        }
        *self = staged;
        Ok(change)
    }

    pub fn set_credit_overwrite(&mut self, course_id: &str, credits: Option<f32>) -> bool {
        match self.courses.get_mut(course_id) {
            Some(course) => {
                course.credit_overwrite = credits;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.courses.clear();
        self.stale.clear();
    }

    /// Refresh stored session copies from `provider`.
    ///
    /// Sessions the provider no longer knows (or that changed slot) are kept
    /// but flagged stale, which excludes them from conflict checks. Returns
    /// the ids of every stale session.
    pub fn reconcile(&mut self, provider: &dyn SessionProvider) -> Vec<String> {
        let mut stale = BTreeSet::new();
        for course in self.courses.values_mut() {
            for session in &mut course.sessions {
                match provider.session(&session.id) {
                    Some(fresh) if fresh.slot() == session.slot() => *session = fresh,
                    _ => {
                        tracing::warn!(
                            course = %course.course_code,
                            session = %session.id,
                            "scheduled session no longer offered"
                        );
                        stale.insert(session.id.clone());
                    }
                }
            }
        }
        self.stale = stale;
        self.stale.iter().cloned().collect()
    }

    /// Request for generating the tracked courses that have no sessions yet.
    /// Every live session of the other courses becomes a fixed session.
    pub fn generation_request(&self, provider: &dyn SessionProvider) -> GenerationRequest {
        let courses = self
            .courses
            .values()
            .filter(|c| c.is_empty() && self.is_live_term(&c.term_id))
            .map(|c| {
                provider
                    .offering(&c.course_code, Some(&c.term_id))
                    .unwrap_or_else(|| CourseOffering::new(c.info(), Vec::new()))
            })
            .collect();
        let fixed = self
            .live_sessions()
            .map(|(course, session)| FixedSession {
                course_code: course.course_code.clone(),
                session: session.clone(),
            })
            .collect();
        GenerationRequest::new(courses).with_fixed(fixed)
    }

    fn attach(&mut self, session: Session, course: &CourseInfo) -> SelectionChange {
        let mut change = SelectionChange::default();
        let entry = self
            .courses
            .entry(course.course_id.clone())
            .or_insert_with(|| {
                change.created_course = true;
                ScheduledCourse::new(course)
            });
        self.stale.remove(&session.id);
        change.attached.push(session.id.clone());
        entry.insert(session);
        change
    }
}

/// Sessions of the candidate's own course that attaching it would replace.
fn displaced_by<'a>(entry: Option<&'a ScheduledCourse>, candidate: &Session) -> Vec<&'a str> {
    let Some(entry) = entry else {
        return Vec::new();
    };
    let kind = candidate.kind();
    let mut displaced = Vec::new();
    if let Some(existing) = entry.session_in(kind.slot()) {
        displaced.push(existing.id.as_str());
    }
    if kind.slot() == Slot::Primary {
        if let Some(secondary) = entry.secondary() {
            if !secondary.kind().links_to(kind) {
                displaced.push(secondary.id.as_str());
            }
        }
    }
    displaced
}
