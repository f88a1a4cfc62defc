pub mod pageview;
pub mod send_notification;
pub mod subscribe;
