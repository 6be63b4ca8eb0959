//! Status summary: per-status counts plus the latest refresh.

use std::sync::Arc;

use serde::Serialize;
use stackwatch_core::{Controller, RefreshSnapshot, StatusTally};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::stacks::short_revision;

#[derive(Serialize)]
struct Summary {
    total: usize,
    counts: StatusTally,
    refresh: Option<Arc<RefreshSnapshot>>,
}

fn detail(summary: &Summary, color: bool) -> String {
    let mut lines = vec![format!("Stacks:   {}", summary.total)];
    for (status, count) in summary.counts.iter() {
        lines.push(format!(
            "  {:<10} {count}",
            output::paint_status(status, color)
        ));
    }
    if let Some(ref r) = summary.refresh {
        lines.push(String::new());
        lines.push(format!(
            "Revision: {} ({} {})",
            short_revision(&r.revision),
            r.ref_type,
            r.git_ref
        ));
        if let Some(ref msg) = r.commit_message {
            lines.push(format!("Commit:   {msg}"));
        }
        lines.push(format!("Refresh:  {} at {}", r.refresh_status, r.refreshed_at));
        if let Some(ref err) = r.refresh_error {
            lines.push(format!("Error:    {err}"));
        }
    }
    lines.join("\n")
}

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    controller.load_initial().await?;

    let counts = controller.tally();
    let summary = Summary {
        total: counts.total(),
        counts,
        refresh: controller.refresh_status(),
    };
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &summary,
        |s| detail(s, color),
        |s| s.total.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
