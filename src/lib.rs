pub mod api_router;
pub mod assets;
pub mod config;
pub mod courses;
pub mod email;
pub mod payments;
pub mod profiles;
pub mod progress;
pub mod shared;
pub mod tests;
