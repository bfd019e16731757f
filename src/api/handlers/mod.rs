pub mod analyze;
pub mod health;
pub mod sessions;
pub mod ui;
