pub mod activity;
pub mod sessions;
pub mod submit;
pub mod watch;

use hollywool_core::job::{DerivedJobView, Job};

/// One-line stage strip, e.g. `queued > downloading > [generating 42%] > saving > completed`.
pub fn stage_strip(view: &DerivedJobView) -> String {
    view.stages
        .iter()
        .map(|stage| {
            if stage.is_failed {
                format!("!{}!", stage.label)
            } else if stage.is_cancelled {
                format!("~{}~", stage.label)
            } else if stage.is_current {
                format!("[{} {:.0}%]", stage.label, view.display_progress)
            } else if stage.is_past {
                stage.label.to_uppercase()
            } else {
                stage.label.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" > ")
}

pub fn job_line(job: &Job, view: &DerivedJobView) -> String {
    let mut line = format!("{:<20} {:<38} {}", job.kind().to_string(), job.id(), stage_strip(view));
    if let Some(eta) = view.eta_seconds {
        line.push_str(&format!("  eta {eta:.0}s"));
    }
    if let Some(error) = &job.core().error {
        line.push_str(&format!("  error: {error}"));
    }
    line
}
