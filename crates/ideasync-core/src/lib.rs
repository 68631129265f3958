//! Application core for ideasync: who is signed in, what they may see, and
//! the founder, investor and messaging operations behind each page.
//!
//! Everything hangs off an [`App`], built once at startup from an
//! [`AuthBackend`](ideasync_backend::AuthBackend) and a
//! [`DataBackend`](ideasync_backend::DataBackend). Services read identity
//! from the shared [`SessionSynchronizer`]; nothing holds global state.

pub mod app;
pub mod confirm;
pub mod discovery;
pub mod error;
pub mod founder;
pub mod guard;
pub mod investor;
pub mod messaging;
pub mod pages;
pub mod routes;
pub mod session;
pub mod store;
pub mod validation;

pub use app::App;
pub use confirm::ConfirmOutcome;
pub use discovery::{ALL_SECTORS, CompanyFilter};
pub use error::{AppError, Result};
pub use pages::{PageView, Visit};
pub use routes::Route;
pub use session::{SessionState, SessionSubscription, SessionSynchronizer};
