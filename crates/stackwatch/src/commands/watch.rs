//! Live view: initial load plus event stream, re-rendered on every change.

use chrono::Local;
use stackwatch_core::{ConnectionState, Controller};
use tracing::warn;

use crate::cli::{FilterArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::stacks;

fn render(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    if global.quiet {
        return Ok(());
    }
    // One document per line for machine formats, a headed table otherwise.
    let out = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let compact = GlobalOpts {
                output: OutputFormat::JsonCompact,
                ..global.clone()
            };
            stacks::render_view(controller, &compact)?
        }
        _ => {
            let color = output::should_color(&global.color);
            let tally = controller.tally();
            let counts = tally
                .iter()
                .filter(|(_, n)| *n > 0)
                .map(|(status, n)| format!("{n} {}", output::paint_status(status, color)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "── {} · {} · {} ──\n{}",
                Local::now().format("%H:%M:%S"),
                output::paint_connection(controller.connection_state(), color),
                if counts.is_empty() { "no stacks".into() } else { counts },
                stacks::render_view(controller, global)?
            )
        }
    };
    output::print_output(&out, false);
    Ok(())
}

pub async fn handle(
    controller: &Controller,
    filter: FilterArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    stacks::apply_filters(controller, filter);

    let mut sub = controller.subscribe();
    let mut conn = controller.subscribe_connection();

    // The stream may still deliver a snapshot, so a failed load is not fatal.
    if let Err(e) = controller.start().await {
        warn!(error = %e, "initial load failed");
        if !global.quiet {
            eprintln!("initial load failed: {e}");
        }
    }
    render(controller, global)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut seen_connection = false;

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            changed = sub.changed() => {
                if changed.is_none() {
                    break Ok(());
                }
                if let Err(e) = render(controller, global) {
                    break Err(e);
                }
            }
            changed = conn.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *conn.borrow_and_update();
                if !global.quiet {
                    eprintln!("event stream {state}");
                }
                match state {
                    ConnectionState::Connected | ConnectionState::Reconnecting => {
                        seen_connection = true;
                    }
                    ConnectionState::Disconnected if seen_connection => {
                        break Err(CliError::StreamExhausted {
                            retries: controller.retry_count(),
                        });
                    }
                    ConnectionState::Disconnected => {}
                }
            }
        }
    };

    controller.shutdown();
    result
}
