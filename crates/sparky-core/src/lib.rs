pub mod config;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod json_extract;
pub mod orchestrator;
pub mod painstorming;
pub mod prompts;
pub mod responses;
pub mod session;
pub mod similarity;
pub mod templates;

pub use config::*;
pub use error::*;
pub use fallback::*;
pub use gateway::*;
pub use json_extract::parse_json;
pub use orchestrator::*;
pub use painstorming::*;
pub use prompts::*;
pub use responses::*;
pub use session::*;
pub use similarity::*;
pub use templates::*;
