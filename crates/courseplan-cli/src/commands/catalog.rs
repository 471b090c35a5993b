use clap::Subcommand;
use courseplan_core::{CourseOffering, Session};

use crate::common::{describe_session, find_offering, load_catalog, load_config, CliResult};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// Show offerings with their sessions grouped by lecture
    Show {
        /// Only this course code (e.g. "CSE 142")
        #[arg(long)]
        course: Option<String>,
        /// Restrict to a term id
        #[arg(long)]
        term: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: CatalogAction) -> CliResult {
    match action {
        CatalogAction::Show { course, term, json } => {
            let config = load_config()?;
            let catalog = load_catalog(&config)?;
            let offerings: Vec<&CourseOffering> = match &course {
                Some(code) => vec![find_offering(&catalog, code, term.as_deref())?],
                None => catalog
                    .offerings()
                    .iter()
                    .filter(|o| term.as_deref().map_or(true, |t| o.course.term_id == t))
                    .collect(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&offerings)?);
                return Ok(());
            }
            if offerings.is_empty() {
                println!("No courses.");
            }
            for offering in offerings {
                print_offering(offering);
            }
        }
    }
    Ok(())
}

fn print_offering(offering: &CourseOffering) {
    let course = &offering.course;
    let title = course.course_title.as_deref().unwrap_or("");
    let credit = course
        .course_credit
        .as_deref()
        .map(|c| format!(" [{c} cr]"))
        .unwrap_or_default();
    println!("{} ({}) {title}{credit}", course.course_code, course.term_id);

    let groups = offering.groups();
    for primary in &groups.primaries {
        print_session(primary, 2);
        for secondary in groups.secondaries_for(&primary.id) {
            print_session(secondary, 6);
        }
    }
    for orphan in &groups.unlinked {
        print_session(orphan, 2);
    }
}

fn print_session(session: &Session, indent: usize) {
    println!("{:indent$}{}", "", describe_session(session));
}
