use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Screens the session layer can send the user to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Login,
    AdminDashboard,
    WorkerDashboard,
    Unauthorized,
}

impl Destination {
    /// Front-end route for this destination
    pub fn path(&self) -> &'static str {
        match self {
            Destination::Login => "/login",
            Destination::AdminDashboard => "/admin-dashboard",
            Destination::WorkerDashboard => "/worker-dashboard",
            Destination::Unauthorized => "/unauthorized",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Navigation side effects requested by the session layer
pub trait Navigator: Send + Sync + fmt::Debug {
    fn navigate(&self, destination: Destination, reason: &str);
}

/// Logs navigation requests; for headless use such as the CLI
#[derive(Debug, Default, Clone)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, destination: Destination, reason: &str) {
        info!(destination = %destination, reason = %reason, "Navigation requested");
    }
}

/// A navigation request forwarded to a UI loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub destination: Destination,
    pub reason: String,
}

/// Forwards navigation requests over a channel to whatever owns the view
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    sender: mpsc::UnboundedSender<NavigationRequest>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NavigationRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, destination: Destination, reason: &str) {
        let request = NavigationRequest {
            destination,
            reason: reason.to_string(),
        };
        if self.sender.send(request).is_err() {
            warn!(destination = %destination, "Navigation receiver dropped");
        }
    }
}

/// Captures navigation requests for inspection
#[derive(Debug, Default, Clone)]
pub struct RecordingNavigator {
    calls: Arc<Mutex<Vec<NavigationRequest>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<NavigationRequest> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.calls().into_iter().map(|c| c.destination).collect()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: Destination, reason: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(NavigationRequest {
                destination,
                reason: reason.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_navigator_forwards() {
        let (navigator, mut receiver) = ChannelNavigator::new();
        navigator.navigate(Destination::Login, "refresh failed");

        let request = receiver.recv().await.unwrap();
        assert_eq!(request.destination, Destination::Login);
        assert_eq!(request.reason, "refresh failed");
    }

    #[test]
    fn test_channel_navigator_survives_dropped_receiver() {
        let (navigator, receiver) = ChannelNavigator::new();
        drop(receiver);
        navigator.navigate(Destination::Login, "ignored");
    }

    #[test]
    fn test_recording_navigator_clones_share_calls() {
        let navigator = RecordingNavigator::new();
        let handle = navigator.clone();
        navigator.navigate(Destination::Unauthorized, "role");
        assert_eq!(handle.destinations(), vec![Destination::Unauthorized]);
        assert_eq!(Destination::Unauthorized.path(), "/unauthorized");
    }
}
