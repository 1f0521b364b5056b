pub mod crypto;
pub mod logging;
pub mod responses;
pub mod user_agent;
