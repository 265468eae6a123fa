pub mod auth;
pub mod health;
pub mod notifications;
pub mod settings;
pub mod titles;
