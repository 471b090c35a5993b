//! Helpers shared by the CLI commands.

use std::error::Error;

use courseplan_core::selection::ScheduledCourse;
use courseplan_core::{
    Catalog, Config, CourseOffering, PlanStore, Rejection, ScheduleSelection, Session,
    SqlitePlanStore, StoreError,
};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Attempts before a plan update gives up on version conflicts.
const SAVE_ATTEMPTS: usize = 3;

pub fn load_config() -> CliResult<Config> {
    Ok(Config::load()?)
}

pub fn load_catalog(config: &Config) -> CliResult<Catalog> {
    let path = config.catalog_path()?;
    if !path.exists() {
        return Err(format!(
            "no catalog at {} (set one with `courseplan config set catalog.path <file>`)",
            path.display()
        )
        .into());
    }
    Ok(Catalog::load(&path)?)
}

/// The catalog if one is configured and readable; plan commands that only
/// touch stored sessions work without it.
pub fn try_load_catalog(config: &Config) -> Option<Catalog> {
    let path = config.catalog_path().ok()?;
    if !path.exists() {
        return None;
    }
    match Catalog::load(&path) {
        Ok(catalog) => Some(catalog),
        Err(e) => {
            tracing::warn!(error = %e, "catalog unavailable, skipping reconciliation");
            None
        }
    }
}

pub fn open_store() -> CliResult<SqlitePlanStore> {
    Ok(SqlitePlanStore::open()?)
}

pub fn find_offering<'a>(
    catalog: &'a Catalog,
    course_code: &str,
    term: Option<&str>,
) -> CliResult<&'a CourseOffering> {
    catalog
        .find(course_code, term)
        .ok_or_else(|| format!("unknown course: {course_code}").into())
}

pub fn find_session<'a>(offering: &'a CourseOffering, session: &str) -> CliResult<&'a Session> {
    offering.find_session(session).ok_or_else(|| {
        format!("{} has no session {session}", offering.course_code()).into()
    })
}

/// The tracked course with this code (case-insensitive).
pub fn find_scheduled<'a>(
    selection: &'a ScheduleSelection,
    course_code: &str,
) -> CliResult<&'a ScheduledCourse> {
    selection
        .courses()
        .find(|c| c.course_code.eq_ignore_ascii_case(course_code))
        .ok_or_else(|| format!("{course_code} is not in your plan").into())
}

/// Session of a tracked course, by id or code.
pub fn find_attached<'a>(course: &'a ScheduledCourse, session: &str) -> CliResult<&'a Session> {
    course
        .sessions
        .iter()
        .find(|s| s.id == session || s.code.eq_ignore_ascii_case(session))
        .ok_or_else(|| format!("{} has no attached session {session}", course.course_code).into())
}

/// Load the configured student's plan with the configured active terms,
/// reconciled against `catalog` when one is given.
pub fn load_plan(
    store: &SqlitePlanStore,
    config: &Config,
    catalog: Option<&Catalog>,
) -> CliResult<(ScheduleSelection, u64)> {
    let (mut selection, version) = match store.load(&config.plan.student)? {
        Some(stored) => (ScheduleSelection::from_snapshot(stored.snapshot), stored.version),
        None => (ScheduleSelection::new(), 0),
    };
    selection.set_active_terms(config.plan.active_term_set());
    if let Some(catalog) = catalog {
        selection.reconcile(catalog);
    }
    Ok((selection, version))
}

/// Read the plan, apply `f`, and save. Re-reads and re-applies when another
/// writer saved in between.
pub fn update_plan<R>(
    store: &SqlitePlanStore,
    config: &Config,
    catalog: Option<&Catalog>,
    mut f: impl FnMut(&mut ScheduleSelection) -> CliResult<R>,
) -> CliResult<R> {
    let student = &config.plan.student;
    let mut attempt = 0;
    loop {
        attempt += 1;
        let (mut selection, version) = load_plan(store, config, catalog)?;
        let out = f(&mut selection)?;
        match store.save(student, version, &selection.to_snapshot()) {
            Ok(_) => return Ok(out),
            Err(e @ StoreError::VersionConflict { .. }) if attempt < SAVE_ATTEMPTS => {
                tracing::debug!(error = %e, attempt, "retrying plan update");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Rejection text with its machine-readable reason, if it has one.
pub fn rejection_error(rejection: Rejection) -> Box<dyn Error> {
    let mut message = rejection.to_string();
    if let Some(reason) = rejection.reason() {
        message = format!("{message} [{reason}]");
    }
    if let Rejection::SwitchRequired { existing, .. } = &rejection {
        message = format!("{message}\nhint: use `courseplan plan switch` to replace {existing}");
    }
    message.into()
}

/// "A    MWF 09:30-10:20, T 08:30-09:20    open 10/30"
pub fn describe_session(session: &Session) -> String {
    let times = if session.is_tba() {
        "TBA".to_string()
    } else {
        session
            .meetings
            .iter()
            .filter(|m| !m.is_tba())
            .filter_map(|m| m.time.map(|t| format!("{} {t}", m.days)))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let seats = match session.seats_remaining() {
        Some(_) => format!(" {}/{}", session.enroll_count, session.enroll_maximum),
        None => String::new(),
    };
    let state = serde_json::to_value(session.enroll_state())
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    format!("{:<4} {:<32} {state}{seats}", session.code, times)
}
