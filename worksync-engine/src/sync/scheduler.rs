use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use worksync_core::AccessToken;

use super::ProjectId;
use super::engine::SyncEngine;

/// Recurring background push per open project, one ticker task each.
/// Stopping cancels only future firings; a push already in flight runs to
/// completion.
pub struct SessionScheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    active: Mutex<HashMap<ProjectId, CancellationToken>>,
}

impl SessionScheduler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub async fn start_scheduling(
        &self,
        credential: AccessToken,
        project_id: ProjectId,
        remote_root_id: String,
    ) {
        let mut active = self.active.lock().await;
        if active.contains_key(&project_id) {
            warn!(project_id, "sync already scheduled, skipping");
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let engine = Arc::clone(&self.engine);
        let interval = self.interval;
        tokio::spawn(async move {
            // First firing comes one full interval after open; there is
            // nothing to push right after a pull.
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        // A tick's failure never terminates the schedule.
                        if let Err(err) = engine.push(&credential, project_id, &remote_root_id).await {
                            if err.remote_unavailable() {
                                warn!(project_id, %err, "scheduled push failed, remote unavailable");
                            } else {
                                error!(project_id, %err, "scheduled push failed");
                            }
                        }
                    }
                }
            }
        });

        active.insert(project_id, cancel);
        info!(project_id, "scheduled sync");
    }

    pub async fn stop_scheduling(&self, project_id: ProjectId) {
        match self.active.lock().await.remove(&project_id) {
            Some(cancel) => {
                // Cancels the tick wait only, never a running push.
                cancel.cancel();
                info!(project_id, "scheduled sync stopped");
            }
            None => warn!(project_id, "no active schedule found"),
        }
    }

    pub async fn is_scheduled(&self, project_id: ProjectId) -> bool {
        self.active.lock().await.contains_key(&project_id)
    }
}
