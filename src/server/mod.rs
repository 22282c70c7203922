pub mod config;
mod http_layers;
mod job_routes;
pub mod metrics;
mod news_routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use news_routes::{SourceView, StoriesResponse, StoryView};
pub use server::{make_app, run_server};
pub use state::ServerState;
