pub mod error;
pub mod models;
pub mod state;
pub mod utils;

pub use error::{ApiError, ApiResponse};
pub use models::{User, UserRole};
pub use state::AppState;
pub use utils::{create_conn, run_migrations, DbPool};
