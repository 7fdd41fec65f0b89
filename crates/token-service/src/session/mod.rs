//! Server-side session state for the login handshake.

pub mod context;
pub mod params;
pub mod state;
pub mod store;

pub use context::RequestContext;
pub use params::FormParams;
pub use state::{ConfirmOutcome, LoginState, SessionRecord};
pub use store::{MemorySessionStore, SessionStore};
