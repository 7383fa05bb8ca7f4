pub mod events;
pub mod hub;

pub use events::{ClientEvent, NotificationPayload, ServerEvent};
pub use hub::Hub;
