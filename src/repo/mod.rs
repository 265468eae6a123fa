pub mod advisors;
pub mod migrations;
pub mod notifications;
pub mod titles;
pub mod verifications;
