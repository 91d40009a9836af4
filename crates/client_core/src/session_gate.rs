use std::sync::{Arc, Weak};

use shared::{
    domain::Session,
    protocol::{AuthChangeEvent, AuthStateChange, Route},
};
use tokio::{
    sync::{broadcast, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{AuthSession, Navigator};

tokio::task_local! {
    /// Set while running inside the gate's own listener task.
    static IN_LISTENER: ();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// What the navbar shows: account links when signed in, a login link otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionView {
    SignedIn { email: Option<String> },
    SignedOut,
}

/// Application-wide auth observer. Redirects to the dashboard on sign-in and
/// to the login page on sign-out for as long as it is mounted.
pub struct SessionGate {
    auth: Arc<dyn AuthSession>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<GateState>,
    subscription: Mutex<Option<Subscription>>,
}

struct GateState {
    phase: GatePhase,
    current_session: Option<Session>,
    torn_down: bool,
}

struct Subscription {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Subscription {
    async fn cancel(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

impl SessionGate {
    /// Reads the current session once, without navigating, then listens for
    /// session changes until [`Self::teardown`].
    pub async fn mount(auth: Arc<dyn AuthSession>, navigator: Arc<dyn Navigator>) -> Arc<Self> {
        let gate = Arc::new(Self {
            auth,
            navigator,
            state: Mutex::new(GateState {
                phase: GatePhase::Unknown,
                current_session: None,
                torn_down: false,
            }),
            subscription: Mutex::new(None),
        });

        // Subscribe first so a change racing the initial read is still delivered.
        let events = gate.auth.subscribe();
        let initial = match gate.auth.current_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!("session gate: current session lookup failed: {err:#}");
                None
            }
        };
        {
            let mut state = gate.state.lock().await;
            state.phase = if initial.is_some() {
                GatePhase::Authenticated
            } else {
                GatePhase::Unauthenticated
            };
            state.current_session = initial;
            debug!(phase = ?state.phase, "session gate: mounted");
        }

        let subscription = Self::spawn_listener(Arc::downgrade(&gate), events);
        *gate.subscription.lock().await = Some(subscription);
        gate
    }

    fn spawn_listener(
        gate: Weak<Self>,
        mut events: broadcast::Receiver<AuthStateChange>,
    ) -> Subscription {
        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(IN_LISTENER.scope((), async move {
            loop {
                let change = tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    received = events.recv() => match received {
                        Ok(change) => change,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "session gate: auth events lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                let Some(gate) = gate.upgrade() else {
                    break;
                };
                gate.handle_event(change).await;
            }
            debug!("session gate: listener stopped");
        }));
        Subscription { shutdown, task }
    }

    /// Applies one session change. `SignedIn` and `SignedOut` transition and
    /// navigate; every other kind is ignored. No-op after teardown.
    ///
    /// Only the listener task calls this, so `teardown` joining that task
    /// orders every redirect before its return. The navigator runs without
    /// the state lock held and may read or tear down the gate.
    async fn handle_event(&self, change: AuthStateChange) {
        let target = {
            let mut state = self.state.lock().await;
            if state.torn_down {
                debug!(event = ?change.event, "session gate: torn down, ignoring auth event");
                return;
            }
            match change.event {
                AuthChangeEvent::SignedIn => {
                    state.phase = GatePhase::Authenticated;
                    state.current_session = change.session;
                    Route::ProtectedHome
                }
                AuthChangeEvent::SignedOut => {
                    state.phase = GatePhase::Unauthenticated;
                    state.current_session = None;
                    Route::PublicLogin
                }
                other => {
                    debug!(event = ?other, "session gate: ignoring auth event");
                    return;
                }
            }
        };

        info!(event = ?change.event, route = target.path(), "session gate: redirecting");
        self.navigator.go_to(target).await;
    }

    /// Stops listening. Once this returns no further navigation is issued,
    /// except that a navigator tearing the gate down from inside a redirect
    /// does not wait for that redirect to finish.
    pub async fn teardown(&self) {
        self.state.lock().await.torn_down = true;
        let Some(subscription) = self.subscription.lock().await.take() else {
            return;
        };
        if IN_LISTENER.try_with(|_| ()).is_ok() {
            let _ = subscription.shutdown.send(());
            return;
        }
        subscription.cancel().await;
    }

    /// Asks the provider to end the session. The redirect to the login page
    /// arrives through the `SignedOut` event.
    pub async fn sign_out(&self) {
        if let Err(err) = self.auth.sign_out().await {
            warn!("session gate: sign out failed: {err:#}");
        }
    }

    pub async fn phase(&self) -> GatePhase {
        self.state.lock().await.phase
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.state.lock().await.current_session.clone()
    }

    pub async fn session_view(&self) -> SessionView {
        match &self.state.lock().await.current_session {
            Some(session) => SessionView::SignedIn {
                email: session.user.email.clone(),
            },
            None => SessionView::SignedOut,
        }
    }
}

#[cfg(test)]
#[path = "tests/session_gate_tests.rs"]
mod tests;
