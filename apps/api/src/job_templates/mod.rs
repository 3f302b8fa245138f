// Job templates: stored job descriptions offered to clients as scoring context.

pub mod handlers;
pub mod repository;
pub mod seed;
