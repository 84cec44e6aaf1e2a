pub mod artists;
pub mod concerts;
pub mod notifications;
pub mod subscriptions;
pub mod users;
