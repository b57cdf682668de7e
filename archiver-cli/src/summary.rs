//! End-of-run summary printed to stdout

use archiver_core::{RefOutcome, RunReport};

fn archive_names(outcome: &RefOutcome) -> String {
    outcome
        .archives
        .iter()
        .filter_map(|a| a.path.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print one line per ref plus totals
///
/// Failed refs are always listed; successful ones only with `verbose`.
pub fn print(report: &RunReport, verbose: bool) {
    let total = report.outcomes.len();
    let succeeded = report.succeeded().count();

    if total == 0 {
        println!("No branches found in {}; nothing archived.", report.source);
    } else {
        println!(
            "Archived {} of {} refs into {} ({} archives)",
            succeeded,
            total,
            report.out_dir.display(),
            report.archive_count()
        );
    }

    for outcome in &report.outcomes {
        if outcome.is_success() {
            if verbose {
                println!("  ok      {} -> {}", outcome.git_ref, archive_names(outcome));
            }
            continue;
        }

        println!("  FAILED  {}", outcome.git_ref);
        for err in &outcome.errors {
            println!("          {}", err);
        }
    }

    if let Some(path) = &report.manifest {
        println!("Manifest: {}", path.display());
    }
    if let Some(err) = &report.manifest_error {
        println!("Manifest not written: {}", err);
    }
    if let Some(path) = &report.kept_workspace {
        println!("Temporary clone kept at {}", path.display());
    }
}
