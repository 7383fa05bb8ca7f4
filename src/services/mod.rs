pub mod geolocation;
pub mod google;
pub mod mailer;
pub mod notify;

pub use mailer::{mailer_from_config, LogMailer, Mailer, OutgoingMail, SmtpMailer};
pub use notify::notify;
