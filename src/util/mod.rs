pub mod mailer;
pub mod similarity;
pub mod title;
