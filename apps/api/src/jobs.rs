use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use appointment_cell::AppointmentState;
use shared_models::auth::Actor;
use shared_utils::clock::clinic_now;

/// Periodically completes accepted sessions whose end time has passed.
/// Returns `None` when the interval is configured as zero.
pub fn spawn_auto_complete(state: Arc<AppointmentState>) -> Option<JoinHandle<()>> {
    let every = state.config.auto_complete_interval_secs;
    if every == 0 {
        info!("Automatic session completion disabled");
        return None;
    }

    info!("Completing elapsed sessions every {}s", every);
    let actor = Actor::system(state.config.system_token());

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(every));
        loop {
            ticker.tick().await;
            match state.lifecycle().complete_elapsed(&actor, clinic_now()).await {
                Ok(report) if report.completed.is_empty() && report.failed.is_empty() => {
                    debug!("No elapsed sessions to complete");
                }
                Ok(report) => {
                    info!(
                        "Auto-completed {} sessions, {} failed",
                        report.completed.len(),
                        report.failed.len()
                    );
                }
                Err(e) => warn!("Elapsed session sweep failed: {}", e),
            }
        }
    }))
}
