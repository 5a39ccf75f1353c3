//! Session registry
//!
//! Process-wide table mapping session ids to their driver handles. Sessions
//! are created on connect and torn down on disconnect; lookups for unknown
//! ids are rejected, never implicitly created.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};

use turngate_config::Settings;
use turngate_judge::{PreReplyStager, ReplyGenerator, SemanticJudge};
use turngate_pipeline::TurnOrchestrator;

use crate::driver::{SessionDriver, SessionEvent, SessionOutput};
use crate::RegistryError;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const OUTPUT_CHANNEL_CAPACITY: usize = 64;

/// Handle to a live session
pub struct SessionHandle {
    id: String,
    events_tx: mpsc::Sender<SessionEvent>,
    shutdown_tx: watch::Sender<bool>,
    created_at: Instant,
    last_activity: RwLock<Instant>,
    active: RwLock<bool>,
}

impl SessionHandle {
    /// Session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send an ingress event to this session's driver
    pub async fn send(&self, event: SessionEvent) -> Result<(), RegistryError> {
        if !self.is_active() {
            return Err(RegistryError::SessionClosed(self.id.clone()));
        }
        self.touch();
        self.events_tx
            .send(event)
            .await
            .map_err(|_| RegistryError::SessionClosed(self.id.clone()))
    }

    /// Update last activity
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    /// Check if the session has been idle past `timeout`
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.read().elapsed() > timeout
    }

    /// Session age
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Is the session active
    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    /// Signal the driver to stop
    fn close(&self) {
        *self.active.write() = false;
        let _ = self.shutdown_tx.send(true);
    }
}

/// Process-wide session registry
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    settings: Settings,
    judge: Arc<SemanticJudge>,
    generator: Arc<dyn ReplyGenerator>,
}

impl SessionRegistry {
    /// Create a registry over the shared judge and reply generator
    pub fn new(
        settings: Settings,
        judge: Arc<SemanticJudge>,
        generator: Arc<dyn ReplyGenerator>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            settings,
            judge,
            generator,
        }
    }

    /// Connect a new session under a generated id
    pub fn connect(
        &self,
    ) -> Result<(Arc<SessionHandle>, mpsc::Receiver<SessionOutput>), RegistryError> {
        self.connect_with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Connect a new session under the given id
    ///
    /// Spawns the session's driver task and returns the handle plus the
    /// egress receiver.
    pub fn connect_with_id(
        &self,
        id: impl Into<String>,
    ) -> Result<(Arc<SessionHandle>, mpsc::Receiver<SessionOutput>), RegistryError> {
        let id = id.into();
        let mut sessions = self.sessions.write();

        if sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateSession(id));
        }

        if sessions.len() >= self.settings.registry.max_sessions {
            self.cleanup_expired_internal(&mut sessions);
            if sessions.len() >= self.settings.registry.max_sessions {
                return Err(RegistryError::CapacityExceeded);
            }
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let orchestrator = TurnOrchestrator::new(
            id.clone(),
            self.settings.turn.clone(),
            self.settings.judge.clone(),
        );

        let stager = self
            .settings
            .prereply
            .enabled
            .then(|| Arc::new(PreReplyStager::new(Arc::clone(&self.generator))));

        let driver = SessionDriver::new(
            orchestrator,
            Arc::clone(&self.judge),
            stager,
            events_rx,
            output_tx,
            shutdown_rx,
        );
        tokio::spawn(driver.run());

        let handle = Arc::new(SessionHandle {
            id: id.clone(),
            events_tx,
            shutdown_tx,
            created_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
            active: RwLock::new(true),
        });
        sessions.insert(id.clone(), Arc::clone(&handle));

        tracing::info!(session_id = %id, "Session connected");
        Ok((handle, output_rx))
    }

    /// Look up a live session
    pub fn get(&self, id: &str) -> Result<Arc<SessionHandle>, RegistryError> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::SessionNotFound(id.to_string()))
    }

    /// Disconnect a session, tearing down its driver
    pub fn disconnect(&self, id: &str) -> Result<(), RegistryError> {
        let handle = self
            .sessions
            .write()
            .remove(id)
            .ok_or_else(|| RegistryError::SessionNotFound(id.to_string()))?;

        handle.close();
        tracing::info!(session_id = %id, "Session disconnected");
        Ok(())
    }

    /// Number of live sessions
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Ids of all live sessions
    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Tear down sessions idle past the configured timeout
    pub fn cleanup_expired(&self) {
        let mut sessions = self.sessions.write();
        self.cleanup_expired_internal(&mut sessions);
    }

    fn cleanup_expired_internal(&self, sessions: &mut HashMap<String, Arc<SessionHandle>>) {
        let timeout = Duration::from_secs(self.settings.registry.session_timeout_seconds);
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, handle)| handle.is_expired(timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(handle) = sessions.remove(&id) {
                handle.close();
                tracing::info!(session_id = %id, "Expired session");
            }
        }
    }

    /// Start a background task that periodically reaps expired sessions
    ///
    /// Returns a shutdown sender for the cleanup task itself.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let interval = Duration::from_secs(self.settings.registry.cleanup_interval_seconds);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let before = registry.count();
                        registry.cleanup_expired();
                        let after = registry.count();
                        if before != after {
                            tracing::info!(
                                removed = before - after,
                                remaining = after,
                                "Session cleanup"
                            );
                        }
                    }
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
