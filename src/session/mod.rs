mod guard;
mod manager;
mod model;
mod navigator;
mod store;

pub use guard::{landing_for, GuardDecision, RouteGuard};
pub use manager::SessionManager;
pub use model::{Account, AuthState, Credentials, Registration, Role, Session, SessionEvent, User};
pub use navigator::{
    ChannelNavigator, Destination, NavigationRequest, Navigator, RecordingNavigator,
    TracingNavigator,
};
pub use store::{
    FileSessionStore, MemorySessionStore, SessionStore, StoreError, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY, USER_KEY,
};
