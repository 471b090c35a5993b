use clap::Args;
use courseplan_core::{
    generate, GenerationOutcome, GenerationReport, GenerationRequest, Infeasibility,
    ScheduleVariant, VariantBoard,
};
use serde_json::json;

use crate::common::{
    describe_session, find_offering, load_catalog, load_config, load_plan, open_store,
    rejection_error, update_plan, CliResult,
};

#[derive(Args)]
pub struct GenerateArgs {
    /// Course to schedule (repeatable). Without any, schedules the tracked
    /// courses that have no sessions yet around the rest of the plan.
    #[arg(long = "course")]
    courses: Vec<String>,
    /// Consider closed sessions too
    #[arg(long)]
    include_closed: bool,
    /// Consider sessions that need an add or faculty code
    #[arg(long)]
    include_code_required: bool,
    /// Maximum number of variants
    #[arg(long)]
    limit: Option<usize>,
    /// Commit the Nth variant (1-based) into the plan
    #[arg(long, conflicts_with = "courses")]
    apply: Option<usize>,
    /// Pin the Nth variant (repeatable) to list it first for comparison;
    /// at most `plan.max_pinned_variants`
    #[arg(long = "pin")]
    pins: Vec<usize>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: GenerateArgs) -> CliResult {
    let config = load_config()?;
    let catalog = load_catalog(&config)?;

    let request = if args.courses.is_empty() {
        let store = open_store()?;
        let (selection, _) = load_plan(&store, &config, Some(&catalog))?;
        selection.generation_request(&catalog)
    } else {
        let offerings = args
            .courses
            .iter()
            .map(|code| find_offering(&catalog, code, None).cloned())
            .collect::<CliResult<Vec<_>>>()?;
        GenerationRequest::new(offerings)
    };
    if request.courses.is_empty() {
        println!("Nothing to generate: every tracked course already has sessions.");
        return Ok(());
    }

    let mut request = config.generation.apply(request);
    request.options.include_closed_sessions |= args.include_closed;
    request.options.include_courses_requiring_codes |= args.include_code_required;
    if let Some(limit) = args.limit {
        request.limit = limit;
    }

    let outcome = generate(&request);

    if let Some(n) = args.apply {
        let variant = outcome
            .variants()
            .get(n.wrapping_sub(1))
            .ok_or_else(|| format!("no variant {n} (generated {})", outcome.variants().len()))?;
        let store = open_store()?;
        let change = update_plan(&store, &config, Some(&catalog), |selection| {
            selection.apply_variant(variant).map_err(rejection_error)
        })?;
        println!("applied {} ({} sessions)", variant.id, change.attached.len());
        return Ok(());
    }

    let (variants, report) = match outcome {
        GenerationOutcome::Generated { variants, report } => (variants, report),
        GenerationOutcome::Infeasible(infeasibility) => {
            if args.json {
                let json = json!({ "infeasible": infeasibility });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                print_infeasible(&infeasibility);
            }
            return Ok(());
        }
    };

    let mut board = config.plan.variant_board();
    board.set_variants(variants);
    for n in &args.pins {
        let id = format!("variant-{n}");
        if !board.is_pinned(&id) {
            board.toggle_pin(&id)?;
        }
    }

    if args.json {
        let pinned: Vec<&str> = board.pinned().map(|v| v.id.as_str()).collect();
        let json = json!({
            "variants": board.variants(),
            "pinned": pinned,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }
    print_board(&board, &report);
    Ok(())
}

/// Pinned variants first, then the rest in rank order.
fn print_board(board: &VariantBoard, report: &GenerationReport) {
    for variant in board.pinned() {
        print_variant(variant, true);
    }
    for variant in board.variants().iter().filter(|v| !board.is_pinned(&v.id)) {
        print_variant(variant, false);
    }
    println!(
        "{} variant(s), {} nodes searched",
        board.variants().len(),
        report.nodes
    );
    if report.is_partial() {
        println!("search stopped early ({:?}); results may be incomplete", report.stop);
    }
}

fn print_variant(variant: &ScheduleVariant, pinned: bool) {
    let marker = if pinned { " [pinned]" } else { "" };
    println!("{} (score {}){marker}", variant.id, variant.score);
    for assignment in &variant.assignments {
        println!("  {}", assignment.course.course_code);
        for session in assignment.sessions() {
            println!("    {}", describe_session(session));
        }
    }
}

fn print_infeasible(infeasibility: &Infeasibility) {
    println!("No conflict-free schedule.");
    match infeasibility {
        Infeasibility::NoCandidates { course_code } => {
            println!("  {course_code} has no sessions left after filtering");
        }
        Infeasibility::NoConflictFreeSchedule { conflicts } => {
            for conflict in conflicts {
                println!(
                    "  {} conflicts with {}",
                    conflict.course_code, conflict.other_course_code
                );
            }
        }
    }
}
