pub mod assistant;
pub mod openai;
pub mod rate_limiter;
pub mod relay;
