use clap::Subcommand;
use courseplan_core::{ScheduleSelection, SelectionChange, Weekday};

use crate::common::{
    describe_session, find_attached, find_offering, find_scheduled, find_session, load_catalog,
    load_config, load_plan, open_store, rejection_error, try_load_catalog, update_plan, CliResult,
};

#[derive(Subcommand)]
pub enum PlanAction {
    /// Show the committed schedule
    List {
        /// Print the weekly calendar instead of the course list
        #[arg(long)]
        calendar: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a session (a double-letter session brings its lecture along)
    Add {
        /// Course code (e.g. "CSE 142")
        course: String,
        /// Session id or code (e.g. "AA")
        session: String,
        /// Term id, when the catalog holds several terms of the course
        #[arg(long)]
        term: Option<String>,
    },
    /// Remove a session (removing a lecture also removes its quiz section)
    Remove {
        course: String,
        session: String,
    },
    /// Drop a course and all its sessions
    Drop {
        course: String,
    },
    /// Replace an attached session with another of the same course
    Switch {
        course: String,
        /// Attached session id or code
        old: String,
        /// Replacement session id or code
        new: String,
    },
    /// Track a course without choosing sessions, for `courseplan generate`
    Track {
        course: String,
        #[arg(long)]
        term: Option<String>,
    },
    /// Show or override course credits
    Credits {
        /// Course to override
        #[arg(long, requires = "set")]
        course: Option<String>,
        /// Credit value; a negative value clears the override
        #[arg(long, allow_hyphen_values = true)]
        set: Option<f32>,
    },
    /// Remove every course from the plan
    Clear,
}

pub fn run(action: PlanAction) -> CliResult {
    let config = load_config()?;
    let store = open_store()?;

    match action {
        PlanAction::List { calendar, json } => {
            let catalog = try_load_catalog(&config);
            let (selection, _) = load_plan(&store, &config, catalog.as_ref())?;
            match (calendar, json) {
                (true, true) => println!("{}", serde_json::to_string_pretty(&selection.calendar())?),
                (false, true) => {
                    println!("{}", serde_json::to_string_pretty(&selection.to_snapshot())?)
                }
                (true, false) => print_calendar(&selection),
                (false, false) => print_plan(&selection),
            }
        }
        PlanAction::Add { course, session, term } => {
            let catalog = load_catalog(&config)?;
            let offering = find_offering(&catalog, &course, term.as_deref())?;
            let session = find_session(offering, &session)?;
            let change = update_plan(&store, &config, Some(&catalog), |selection| {
                selection
                    .add_with_parent(session, &offering.course, offering)
                    .map_err(rejection_error)
            })?;
            print_change(&change);
        }
        PlanAction::Remove { course, session } => {
            let catalog = try_load_catalog(&config);
            let change = update_plan(&store, &config, catalog.as_ref(), |selection| {
                let scheduled = find_scheduled(selection, &course)?;
                let session_id = find_attached(scheduled, &session)?.id.clone();
                let course_id = scheduled.course_id.clone();
                Ok(selection.remove(&course_id, &session_id))
            })?;
            print_change(&change);
        }
        PlanAction::Drop { course } => {
            let dropped = update_plan(&store, &config, None, |selection| {
                let course_id = find_scheduled(selection, &course)?.course_id.clone();
                Ok(selection.remove_course(&course_id))
            })?;
            if let Some(dropped) = dropped {
                println!("dropped {}", dropped.course_code);
            }
        }
        PlanAction::Switch { course, old, new } => {
            let catalog = load_catalog(&config)?;
            let change = update_plan(&store, &config, Some(&catalog), |selection| {
                let scheduled = find_scheduled(selection, &course)?;
                let old_id = find_attached(scheduled, &old)?.id.clone();
                let info = scheduled.info();
                let offering = find_offering(&catalog, &info.course_code, Some(&info.term_id))?;
                let replacement = find_session(offering, &new)?;
                selection
                    .switch(&info, &old_id, replacement)
                    .map_err(rejection_error)
            })?;
            print_change(&change);
        }
        PlanAction::Track { course, term } => {
            let catalog = load_catalog(&config)?;
            let offering = find_offering(&catalog, &course, term.as_deref())?;
            let tracked = update_plan(&store, &config, None, |selection| {
                Ok(selection.track_course(&offering.course))
            })?;
            if tracked {
                println!("tracking {}", offering.course_code());
            } else {
                println!("{} is already in your plan", offering.course_code());
            }
        }
        PlanAction::Credits { course, set } => match (course, set) {
            (Some(course), Some(value)) => {
                let credits = (value >= 0.0).then_some(value);
                update_plan(&store, &config, None, |selection| {
                    let course_id = find_scheduled(selection, &course)?.course_id.clone();
                    Ok(selection.set_credit_overwrite(&course_id, credits))
                })?;
                println!("ok");
            }
            _ => {
                let (selection, _) = load_plan(&store, &config, None)?;
                for course in selection.courses() {
                    let credits = course
                        .credits()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    let marker = if course.credit_overwrite.is_some() { "*" } else { "" };
                    println!("{:<12} {credits}{marker}", course.course_code);
                }
                println!("total        {}", selection.total_credits());
            }
        },
        PlanAction::Clear => {
            update_plan(&store, &config, None, |selection| {
                selection.clear();
                Ok(())
            })?;
            println!("plan cleared");
        }
    }
    Ok(())
}

fn print_change(change: &SelectionChange) {
    if change.is_noop() {
        println!("no change");
        return;
    }
    for id in &change.attached {
        println!("+ {id}");
    }
    for id in &change.detached {
        println!("- {id}");
    }
}

fn print_plan(selection: &ScheduleSelection) {
    let mut empty = true;
    for course in selection.courses() {
        empty = false;
        let live = if selection.is_live_term(&course.term_id) { "" } else { " (inactive term)" };
        println!("{} ({}){live}", course.course_code, course.term_id);
        if course.is_empty() {
            println!("  no sessions yet");
        }
        for session in &course.sessions {
            let stale = if selection.is_stale(&session.id) { "  [stale]" } else { "" };
            println!("  {}{stale}", describe_session(session));
        }
    }
    if empty {
        println!("No courses in plan.");
    } else {
        println!("Total credits: {}", selection.total_credits());
    }
}

fn print_calendar(selection: &ScheduleSelection) {
    let calendar = selection.calendar();
    for day in Weekday::ALL {
        let Some(blocks) = calendar.get(&day) else {
            continue;
        };
        println!("{}", day.token());
        for block in blocks {
            println!(
                "  {:02}:{:02}-{:02}:{:02}  {} {}",
                block.start / 60,
                block.start % 60,
                block.end / 60,
                block.end % 60,
                block.course_code,
                block.session_code
            );
        }
    }
}
