pub mod error;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;

pub use error::AppError;
pub use server::{router, start_server};
pub use session::{Session, SessionKeys, SESSION_COOKIE};
pub use state::AppState;
