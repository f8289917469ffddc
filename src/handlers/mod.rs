pub mod health;
pub mod monitoring;
