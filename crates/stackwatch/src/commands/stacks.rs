//! Stack command handlers.

use std::sync::Arc;

use stackwatch_core::{Controller, StackRecord};
use tabled::Tabled;

use crate::cli::{FilterArgs, GlobalOpts, StacksArgs, StacksCommand};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct StackRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Containers")]
    containers: String,
    #[tabled(rename = "Revision")]
    revision: String,
    #[tabled(rename = "Last Sync")]
    last_sync: String,
}

impl StackRow {
    pub(crate) fn new(s: &Arc<StackRecord>, color: bool) -> Self {
        Self {
            path: s.path.clone(),
            status: output::paint_status(s.status, color),
            containers: containers_label(s),
            revision: s
                .synced_revision
                .as_deref()
                .map(short_revision)
                .unwrap_or_default()
                .to_owned(),
            last_sync: s.last_sync_at.clone().unwrap_or_default(),
        }
    }
}

fn containers_label(s: &StackRecord) -> String {
    match (s.containers_running, s.containers_total) {
        (Some(running), Some(total)) => format!("{running}/{total}"),
        (None, Some(total)) => format!("?/{total}"),
        _ => String::new(),
    }
}

/// First 8 characters of a commit hash.
pub(crate) fn short_revision(rev: &str) -> &str {
    rev.get(..8).unwrap_or(rev)
}

fn detail(s: &Arc<StackRecord>) -> String {
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    let mut lines = vec![
        format!("Path:         {}", s.path),
        format!("Status:       {}", s.status),
        format!("Compose file: {}", s.compose_file),
        format!("Compose hash: {}", s.compose_hash),
    ];
    let containers = containers_label(s);
    if !containers.is_empty() {
        lines.push(format!("Containers:   {containers}"));
    }
    lines.push(format!("Synced rev:   {}", opt(&s.synced_revision)));
    if let Some(ref msg) = s.synced_commit_message {
        lines.push(format!("Commit:       {msg}"));
    }
    lines.push(format!("Synced at:    {}", opt(&s.synced_at)));
    lines.push(format!("Last sync:    {}", opt(&s.last_sync_at)));
    if let Some(ref status) = s.last_sync_status {
        lines.push(format!("Sync result:  {status}"));
    }
    if let Some(ref err) = s.last_sync_error {
        lines.push(format!("Sync error:   {err}"));
    }
    lines.join("\n")
}

/// Apply `--status` / `--search` to the store's view filters.
pub(crate) fn apply_filters(controller: &Controller, filter: FilterArgs) {
    controller.set_filter_status(filter.status);
    controller.set_search_query(filter.search.unwrap_or_default());
}

/// Render the current filtered view.
pub(crate) fn render_view(controller: &Controller, global: &GlobalOpts) -> Result<String, CliError> {
    let color = output::should_color(&global.color);
    let view = controller.filtered_view();
    output::render_list(
        &global.output,
        &view,
        |s| StackRow::new(s, color),
        |s| s.path.clone(),
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: StacksArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.load_initial().await?;

    match args.command {
        StacksCommand::List(filter) => {
            apply_filters(controller, filter);
            let out = render_view(controller, global)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        StacksCommand::Get { path } => {
            let stack = controller.get_stack(&path).ok_or_else(|| CliError::NotFound {
                resource_type: "stack".into(),
                identifier: path.clone(),
                list_command: "stacks list".into(),
            })?;
            let out = output::render_single(&global.output, &stack, detail, |s| s.path.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
