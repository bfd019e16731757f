pub mod agent;
pub mod credentials;
pub mod error;
pub mod gemini;
pub mod media;
pub mod prompt;
pub mod search;
pub mod session;
pub mod staging;
pub mod worker;
pub mod workflow;
