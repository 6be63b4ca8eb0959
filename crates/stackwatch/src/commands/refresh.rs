//! Refresh trigger, optionally waiting for the outcome on the event stream.

use std::sync::Arc;

use stackwatch_core::{ConnectionState, Controller, RefreshSnapshot, RefreshState};
use tracing::debug;

use crate::cli::{GlobalOpts, RefreshArgs};
use crate::error::CliError;
use crate::output;

use super::stacks::short_revision;

fn detail(r: &Arc<RefreshSnapshot>) -> String {
    format!(
        "Refresh {} at {}: {} ({} {})",
        r.refresh_status,
        r.refreshed_at,
        short_revision(&r.revision),
        r.ref_type,
        r.git_ref
    )
}

pub async fn handle(
    controller: &Controller,
    args: &RefreshArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !args.wait {
        controller.trigger_refresh().await?;
        if !global.quiet {
            eprintln!("Refresh requested");
        }
        return Ok(());
    }

    // Subscribe before connecting so no transition is missed.
    let mut refresh_rx = controller.subscribe_refresh();
    let mut conn_rx = controller.subscribe_connection();
    controller.connect_stream();

    // Anything already in the store predates this request; anything that
    // lands while the POST is in flight may be its outcome.
    refresh_rx.mark_unchanged();
    let result = match controller.trigger_refresh().await {
        Ok(()) => {
            let wait = async {
                loop {
                    tokio::select! {
                        changed = refresh_rx.changed() => {
                            if changed.is_err() {
                                return Err(CliError::StreamExhausted {
                                    retries: controller.retry_count(),
                                });
                            }
                            let latest = refresh_rx.borrow_and_update().clone();
                            let Some(snap) = latest else { continue };
                            match snap.refresh_status {
                                RefreshState::Completed => return Ok(snap),
                                RefreshState::Failed => {
                                    return Err(CliError::RefreshFailed {
                                        message: snap
                                            .refresh_error
                                            .clone()
                                            .unwrap_or_else(|| "unknown error".into()),
                                    });
                                }
                                RefreshState::Refreshing | RefreshState::Queued => {
                                    debug!(status = %snap.refresh_status, "refresh in progress");
                                }
                            }
                        }
                        changed = conn_rx.changed() => {
                            let gave_up = changed.is_err()
                                || *conn_rx.borrow_and_update() == ConnectionState::Disconnected;
                            if gave_up {
                                return Err(CliError::StreamExhausted {
                                    retries: controller.retry_count(),
                                });
                            }
                        }
                    }
                }
            };
            tokio::time::timeout(args.wait_timeout(), wait)
                .await
                .unwrap_or(Err(CliError::Timeout {
                    seconds: args.wait_timeout,
                }))
        }
        Err(e) => Err(e.into()),
    };

    controller.shutdown();

    let snap = result?;
    let out = output::render_single(&global.output, &snap, detail, |r| {
        r.refresh_status.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
