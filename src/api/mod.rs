pub mod cli;
pub mod http;

pub use cli::{Cli, CliError, CliHandler, Commands};
pub use http::{router, ApiError, ApiServer, AppState, HealthProbe, HealthResponse};
