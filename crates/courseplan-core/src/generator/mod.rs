//! Automatic schedule generation.
//!
//! Given the courses a student wants, the generator enumerates conflict-free
//! combinations of one primary (plus a linked secondary where the course has
//! them) per course:
//! - Candidates come from the sessions the [`GenerationOptions`] admit
//! - A depth-first search assigns courses in input order and backtracks as
//!   soon as the newest assignment clashes with a fixed session or an earlier
//!   course
//! - The search stops at the variant limit, on exhaustion, when the node or
//!   time budget runs out, or when cancelled
//! - Found variants are ranked by score, ties broken by chosen session ids

pub mod variant;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CourseOffering;
use crate::filter::{filter_sessions, GenerationOptions};
use crate::session::{classify, Session};

pub use variant::{CourseAssignment, PinError, ScheduleVariant, VariantBoard, DEFAULT_MAX_PINNED};

pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_NODE_BUDGET: u64 = 200_000;
pub const DEFAULT_CODE_PENALTY: i64 = 1;

/// Cooperative cancellation flag shared with a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// An already-committed session every variant has to avoid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedSession {
    pub course_code: String,
    pub session: Session,
}

/// Everything one generation run needs. Build with [`GenerationRequest::new`]
/// and the `with_*` methods.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub courses: Vec<CourseOffering>,
    pub fixed: Vec<FixedSession>,
    pub options: GenerationOptions,
    pub limit: usize,
    /// Maximum candidate placements tried; `None` for unbounded.
    pub node_budget: Option<u64>,
    pub time_budget: Option<Duration>,
    pub code_penalty: i64,
    pub cancel: CancelToken,
}

impl GenerationRequest {
    pub fn new(courses: Vec<CourseOffering>) -> Self {
        Self {
            courses,
            fixed: Vec::new(),
            options: GenerationOptions::default(),
            limit: DEFAULT_LIMIT,
            node_budget: Some(DEFAULT_NODE_BUDGET),
            time_budget: None,
            code_penalty: DEFAULT_CODE_PENALTY,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_fixed(mut self, fixed: Vec<FixedSession>) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_node_budget(mut self, budget: Option<u64>) -> Self {
        self.node_budget = budget;
        self
    }

    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_code_penalty(mut self, penalty: i64) -> Self {
        self.code_penalty = penalty;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn course_codes(&self) -> Vec<&str> {
        self.courses.iter().map(CourseOffering::course_code).collect()
    }
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    Limit,
    NodeBudget,
    TimeBudget,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub stop: StopReason,
    /// Candidate placements tried.
    pub nodes: u64,
    /// True only when every combination was explored.
    pub exhaustive: bool,
}

impl GenerationReport {
    /// Cut short by a budget or cancellation rather than by the limit.
    pub fn is_partial(&self) -> bool {
        matches!(
            self.stop,
            StopReason::NodeBudget | StopReason::TimeBudget | StopReason::Cancelled
        )
    }
}

/// Two courses (or a course and a fixed session's course) whose candidates
/// collided during the search.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CourseConflict {
    pub course_code: String,
    pub other_course_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "infeasible", rename_all = "snake_case")]
pub enum Infeasibility {
    #[error("no candidate sessions for {course_code}")]
    NoCandidates { course_code: String },
    #[error("no conflict-free schedule exists ({} conflicting course pairs)", .conflicts.len())]
    NoConflictFreeSchedule { conflicts: Vec<CourseConflict> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Generated {
        variants: Vec<ScheduleVariant>,
        report: GenerationReport,
    },
    Infeasible(Infeasibility),
}

impl GenerationOutcome {
    pub fn variants(&self) -> &[ScheduleVariant] {
        match self {
            GenerationOutcome::Generated { variants, .. } => variants,
            GenerationOutcome::Infeasible(_) => &[],
        }
    }

    pub fn into_variants(self) -> Vec<ScheduleVariant> {
        match self {
            GenerationOutcome::Generated { variants, .. } => variants,
            GenerationOutcome::Infeasible(_) => Vec::new(),
        }
    }

    pub fn is_infeasible(&self) -> bool {
        matches!(self, GenerationOutcome::Infeasible(_))
    }
}

/// Candidate (primary, secondary) pairs for one course.
///
/// Only sessions the options admit are grouped. A primary with surviving
/// linked secondaries is paired with each one that does not clash with it;
/// a primary whose secondaries were all filtered out stands alone.
pub fn candidates(offering: &CourseOffering, options: &GenerationOptions) -> Vec<CourseAssignment> {
    let groups = classify(&filter_sessions(&offering.sessions, options));
    let mut out = Vec::new();
    for primary in &groups.primaries {
        let linked = groups.secondaries_for(&primary.id);
        if linked.is_empty() {
            out.push(CourseAssignment {
                course: offering.course.clone(),
                primary: primary.clone(),
                secondary: None,
            });
            continue;
        }
        for secondary in linked.iter().filter(|s| !primary.conflicts_with(s)) {
            out.push(CourseAssignment {
                course: offering.course.clone(),
                primary: primary.clone(),
                secondary: Some(secondary.clone()),
            });
        }
    }
    out
}

/// Run one generation synchronously.
pub fn generate(request: &GenerationRequest) -> GenerationOutcome {
    let started = Instant::now();
    if request.courses.is_empty() {
        return GenerationOutcome::Generated {
            variants: Vec::new(),
            report: GenerationReport {
                stop: StopReason::Exhausted,
                nodes: 0,
                exhaustive: true,
            },
        };
    }

    let mut per_course = Vec::with_capacity(request.courses.len());
    for offering in &request.courses {
        let all = candidates(offering, &request.options);
        if all.is_empty() {
            tracing::debug!(course = %offering.course_code(), "no candidates after filtering");
            return GenerationOutcome::Infeasible(Infeasibility::NoCandidates {
                course_code: offering.course_code().to_string(),
            });
        }
        per_course.push(all);
    }

    // Candidates clashing with a fixed session can never be placed.
    let mut collisions = BTreeSet::new();
    for (offering, all) in request.courses.iter().zip(per_course.iter_mut()) {
        all.retain(|candidate| {
            let blocking = request
                .fixed
                .iter()
                .find(|f| candidate.conflicts_with_session(&f.session));
            if let Some(fixed) = blocking {
                collisions.insert(CourseConflict {
                    course_code: offering.course_code().to_string(),
                    other_course_code: fixed.course_code.clone(),
                });
            }
            blocking.is_none()
        });
    }

    tracing::debug!(
        courses = request.courses.len(),
        fixed = request.fixed.len(),
        candidates = ?per_course.iter().map(Vec::len).collect::<Vec<_>>(),
        "starting schedule search"
    );

    let mut search = Search {
        courses: &per_course,
        limit: request.limit,
        node_budget: request.node_budget,
        deadline: request.time_budget.map(|budget| started + budget),
        cancel: &request.cancel,
        nodes: 0,
        found: Vec::new(),
        stop: None,
        collisions: BTreeSet::new(),
    };
    if search.limit == 0 {
        search.stop = Some(StopReason::Limit);
    } else {
        let mut chosen = Vec::with_capacity(per_course.len());
        search.descend(&mut chosen);
    }

    let stop = search.stop.unwrap_or(StopReason::Exhausted);
    let report = GenerationReport {
        stop,
        nodes: search.nodes,
        exhaustive: stop == StopReason::Exhausted,
    };

    if search.found.is_empty() && stop == StopReason::Exhausted {
        for (a, b) in &search.collisions {
            collisions.insert(CourseConflict {
                course_code: request.courses[*a].course_code().to_string(),
                other_course_code: request.courses[*b].course_code().to_string(),
            });
        }
        tracing::info!(
            nodes = report.nodes,
            conflicts = collisions.len(),
            "no conflict-free schedule"
        );
        return GenerationOutcome::Infeasible(Infeasibility::NoConflictFreeSchedule {
            conflicts: collisions.into_iter().collect(),
        });
    }

    if report.is_partial() {
        tracing::warn!(
            stop = ?report.stop,
            nodes = report.nodes,
            found = search.found.len(),
            "schedule search stopped early"
        );
    }

    let variants = rank(
        search
            .found
            .iter()
            .map(|picks| {
                ScheduleVariant::new(
                    picks
                        .iter()
                        .enumerate()
                        .map(|(course, &pick)| per_course[course][pick].clone())
                        .collect(),
                )
            })
            .collect(),
        request.code_penalty,
    );

    tracing::info!(
        variants = variants.len(),
        nodes = report.nodes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "schedule generation finished"
    );
    GenerationOutcome::Generated { variants, report }
}

/// Convenience wrapper with default budgets and no fixed sessions.
pub fn generate_variants(
    courses: Vec<CourseOffering>,
    options: GenerationOptions,
    limit: usize,
) -> GenerationOutcome {
    generate(
        &GenerationRequest::new(courses)
            .with_options(options)
            .with_limit(limit),
    )
}

fn rank(mut variants: Vec<ScheduleVariant>, code_penalty: i64) -> Vec<ScheduleVariant> {
    for variant in &mut variants {
        variant.score = variant.compute_score(code_penalty);
    }
    variants.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.session_ids().cmp(&b.session_ids()))
    });
    for (index, variant) in variants.iter_mut().enumerate() {
        variant.id = format!("variant-{}", index + 1);
    }
    variants
}

struct Search<'a> {
    courses: &'a [Vec<CourseAssignment>],
    limit: usize,
    node_budget: Option<u64>,
    deadline: Option<Instant>,
    cancel: &'a CancelToken,
    nodes: u64,
    /// Candidate index per course for each complete assignment.
    found: Vec<Vec<usize>>,
    stop: Option<StopReason>,
    /// Course index pairs (earlier, later) whose candidates clashed.
    collisions: BTreeSet<(usize, usize)>,
}

impl Search<'_> {
    /// Returns false once the search must stop.
    fn descend(&mut self, chosen: &mut Vec<usize>) -> bool {
        let courses = self.courses;
        let depth = chosen.len();
        if depth == courses.len() {
            self.found.push(chosen.clone());
            if self.found.len() >= self.limit {
                self.stop = Some(StopReason::Limit);
                return false;
            }
            return true;
        }
        if self.cancel.is_cancelled() {
            self.stop = Some(StopReason::Cancelled);
            return false;
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            self.stop = Some(StopReason::TimeBudget);
            return false;
        }

        for (index, candidate) in courses[depth].iter().enumerate() {
            if self.node_budget.is_some_and(|budget| self.nodes >= budget) {
                self.stop = Some(StopReason::NodeBudget);
                return false;
            }
            self.nodes += 1;

            let clash = chosen
                .iter()
                .enumerate()
                .find(|(course, pick)| courses[*course][**pick].conflicts_with(candidate))
                .map(|(course, _)| course);
            if let Some(earlier) = clash {
                self.collisions.insert((earlier, depth));
                continue;
            }

            chosen.push(index);
            let keep_going = self.descend(chosen);
            chosen.pop();
            if !keep_going {
                return false;
            }
        }
        true
    }
}

/// A generation running on a blocking worker.
pub struct GenerationHandle {
    cancel: CancelToken,
    join: tokio::task::JoinHandle<GenerationOutcome>,
}

impl GenerationHandle {
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Ask the search to stop at its next course expansion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the outcome.
    ///
    /// # Errors
    /// Returns an error if the worker panicked or was aborted.
    pub async fn join(self) -> Result<GenerationOutcome, tokio::task::JoinError> {
        self.join.await
    }
}

/// Run [`generate`] on tokio's blocking pool. Must be called from within a
/// tokio runtime.
pub fn generate_in_background(request: GenerationRequest) -> GenerationHandle {
    let cancel = request.cancel.clone();
    tracing::debug!(courses = ?request.course_codes(), "spawning background generation");
    let join = tokio::task::spawn_blocking(move || generate(&request));
    GenerationHandle { cancel, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CourseInfo;
    use crate::session::Meeting;

    fn session(id: &str, code: &str, days: &str, time: &str) -> Session {
        Session::new(id, code, "t").with_meeting(Meeting::parse(days, time).unwrap())
    }

    fn offering(code: &str, sessions: Vec<Session>) -> CourseOffering {
        CourseOffering::new(CourseInfo::new(code, code, "t"), sessions)
    }

    #[test]
    fn primaries_with_sections_require_one() {
        let course = offering(
            "X",
            vec![
                session("a", "A", "MWF", "09:00-09:50"),
                session("aa", "AA", "Th", "09:00-09:50"),
                session("ab", "AB", "M", "09:30-10:20"),
                session("b", "B", "MWF", "10:00-10:50"),
            ],
        );
        let labels: Vec<_> = candidates(&course, &GenerationOptions::default())
            .iter()
            .map(CourseAssignment::label)
            .collect();
        // AB clashes with its own primary.
        assert_eq!(labels, vec!["A/AA", "B"]);
    }

    #[test]
    fn primary_stands_alone_when_its_sections_are_filtered_out() {
        let course = offering(
            "X",
            vec![
                session("a", "A", "MWF", "09:00-09:50"),
                session("aa", "AA", "Th", "09:00-09:50").with_enrollment(20, 20),
            ],
        );
        let labels: Vec<_> = candidates(&course, &GenerationOptions::default())
            .iter()
            .map(CourseAssignment::label)
            .collect();
        assert_eq!(labels, vec!["A"]);
        let labels: Vec<_> = candidates(&course, &GenerationOptions::permissive())
            .iter()
            .map(CourseAssignment::label)
            .collect();
        assert_eq!(labels, vec!["A/AA"]);

        let outcome = generate_variants(vec![course], GenerationOptions::default(), 10);
        assert_eq!(outcome.variants().len(), 1);
        assert_eq!(outcome.variants()[0].session_ids(), vec!["a"]);
    }

    #[test]
    fn fixed_sessions_block_candidates() {
        let request = GenerationRequest::new(vec![offering(
            "X",
            vec![
                session("a", "A", "M", "09:00-09:50"),
                session("b", "B", "T", "09:00-09:50"),
            ],
        )])
        .with_fixed(vec![FixedSession {
            course_code: "Y".into(),
            session: session("y", "A", "M", "09:00-09:50"),
        }]);
        let outcome = generate(&request);
        let ids: Vec<_> = outcome.variants().iter().map(|v| v.session_ids()).collect();
        assert_eq!(ids, vec![vec!["b"]]);
    }

    #[test]
    fn all_candidates_fixed_out_is_infeasible() {
        let request = GenerationRequest::new(vec![offering(
            "X",
            vec![session("a", "A", "M", "09:00-09:50")],
        )])
        .with_fixed(vec![FixedSession {
            course_code: "Y".into(),
            session: session("y", "A", "M", "09:00-09:50"),
        }]);
        match generate(&request) {
            GenerationOutcome::Infeasible(Infeasibility::NoConflictFreeSchedule { conflicts }) => {
                assert_eq!(
                    conflicts,
                    vec![CourseConflict {
                        course_code: "X".into(),
                        other_course_code: "Y".into()
                    }]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn limit_caps_results() {
        let courses = vec![
            offering(
                "X",
                vec![
                    session("x1", "A", "M", "09:00-09:50"),
                    session("x2", "B", "T", "09:00-09:50"),
                ],
            ),
            offering(
                "Y",
                vec![
                    session("y1", "A", "W", "09:00-09:50"),
                    session("y2", "B", "F", "09:00-09:50"),
                ],
            ),
        ];
        let outcome = generate_variants(courses, GenerationOptions::default(), 3);
        match outcome {
            GenerationOutcome::Generated { variants, report } => {
                assert_eq!(variants.len(), 3);
                assert_eq!(report.stop, StopReason::Limit);
                assert!(!report.is_partial());
                let ids: Vec<_> = variants.iter().map(|v| v.id.as_str()).collect();
                assert_eq!(ids, vec!["variant-1", "variant-2", "variant-3"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn node_budget_returns_partial_result() {
        let courses = vec![
            offering(
                "X",
                vec![
                    session("x1", "A", "M", "09:00-09:50"),
                    session("x2", "B", "T", "09:00-09:50"),
                ],
            ),
            offering("Y", vec![session("y1", "A", "W", "09:00-09:50")]),
        ];
        let request = GenerationRequest::new(courses).with_node_budget(Some(2));
        match generate(&request) {
            GenerationOutcome::Generated { variants, report } => {
                assert_eq!(report.stop, StopReason::NodeBudget);
                assert!(report.is_partial());
                assert_eq!(report.nodes, 2);
                assert_eq!(variants.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    /// `courses` offerings of `per_course` primaries, no two of which overlap.
    fn spread_courses(courses: usize, per_course: usize) -> Vec<CourseOffering> {
        const DAYS: [&str; 7] = ["M", "T", "W", "Th", "F", "Sa", "Su"];
        (0..courses)
            .map(|c| {
                let sessions = (0..per_course)
                    .map(|k| {
                        let slot = c * per_course + k;
                        let hour = 7 + slot / DAYS.len();
                        let code = char::from(b'A' + k as u8).to_string();
                        session(
                            &format!("s{slot}"),
                            &code,
                            DAYS[slot % DAYS.len()],
                            &format!("{hour:02}:00-{hour:02}:50"),
                        )
                    })
                    .collect();
                offering(&format!("C{c}"), sessions)
            })
            .collect()
    }

    #[test]
    fn time_budget_returns_partial_result() {
        let request = GenerationRequest::new(spread_courses(6, 4))
            .with_node_budget(None)
            .with_time_budget(Some(Duration::ZERO));
        match generate(&request) {
            GenerationOutcome::Generated { variants, report } => {
                assert_eq!(report.stop, StopReason::TimeBudget);
                assert!(!report.exhaustive);
                assert!(report.is_partial());
                assert!(variants.len() < 4usize.pow(6));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cancelled_search_stops_immediately() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let request = GenerationRequest::new(vec![offering(
            "X",
            vec![session("x1", "A", "M", "09:00-09:50")],
        )])
        .with_cancel(cancel);
        match generate(&request) {
            GenerationOutcome::Generated { variants, report } => {
                assert!(variants.is_empty());
                assert_eq!(report.stop, StopReason::Cancelled);
                assert!(!report.exhaustive);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ranking_prefers_open_sessions() {
        let course = offering(
            "X",
            vec![
                session("a", "A", "M", "09:00-09:50")
                    .with_status(crate::session::EnrollStatus::AddCodeRequired),
                session("b", "B", "T", "09:00-09:50"),
            ],
        );
        let outcome = generate_variants(vec![course], GenerationOptions::permissive(), 10);
        let ranked: Vec<_> = outcome
            .variants()
            .iter()
            .map(|v| (v.session_ids()[0].to_string(), v.score))
            .collect();
        assert_eq!(ranked, vec![("b".to_string(), 1), ("a".to_string(), -1)]);
    }

    #[test]
    fn empty_course_list_generates_nothing() {
        let outcome = generate(&GenerationRequest::new(Vec::new()));
        match outcome {
            GenerationOutcome::Generated { variants, report } => {
                assert!(variants.is_empty());
                assert_eq!(report.stop, StopReason::Exhausted);
                assert!(report.exhaustive);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn background_generation_completes() {
        let request = GenerationRequest::new(vec![offering(
            "X",
            vec![session("x1", "A", "M", "09:00-09:50")],
        )]);
        let handle = generate_in_background(request);
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.variants().len(), 1);
    }

    #[tokio::test]
    async fn background_generation_can_be_cancelled() {
        // 8^12 conflict-free combinations: far too many to finish first.
        let request = GenerationRequest::new(spread_courses(12, 8))
            .with_limit(usize::MAX)
            .with_node_budget(None);
        let handle = generate_in_background(request);
        handle.cancel();
        match handle.join().await.unwrap() {
            GenerationOutcome::Generated { report, .. } => {
                assert_eq!(report.stop, StopReason::Cancelled);
                assert!(!report.exhaustive);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
