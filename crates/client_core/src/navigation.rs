use std::sync::Arc;

use async_trait::async_trait;
use shared::protocol::Route;
use tokio::sync::Mutex;
use tracing::debug;

use crate::Navigator;

/// Navigator wrapper that drops a redirect to the route it is already on.
/// Sharing one tracker between the login form and the session gate keeps a
/// sign-in from redirecting twice.
pub struct RouteTracker {
    inner: Arc<dyn Navigator>,
    current: Mutex<Option<Route>>,
}

impl RouteTracker {
    pub fn new(inner: Arc<dyn Navigator>) -> Self {
        Self {
            inner,
            current: Mutex::new(None),
        }
    }

    /// Records a location change made outside this tracker (e.g. a link click).
    pub async fn note_location(&self, route: Option<Route>) {
        *self.current.lock().await = route;
    }

    pub async fn current(&self) -> Option<Route> {
        *self.current.lock().await
    }
}

#[async_trait]
impl Navigator for RouteTracker {
    async fn go_to(&self, route: Route) {
        let mut current = self.current.lock().await;
        if *current == Some(route) {
            debug!(route = route.path(), "navigation: already on route");
            return;
        }
        *current = Some(route);
        self.inner.go_to(route).await;
    }
}
