pub mod accounts;
pub mod app;
pub mod config;
pub mod credentials;
pub mod employee_handlers;
pub mod guards;
pub mod identity;
pub mod metrics;
pub mod permissions;
pub mod postgres;
pub mod rate_limit;
pub mod recovery;
pub mod routes;
pub mod token_handlers;
pub mod tokens;

pub use app::AppState;
pub use routes::build_router;
