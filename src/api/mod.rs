pub mod handlers;
pub mod lookup_handlers;
pub mod notification_handlers;
pub mod routes;
pub mod user_extractor;
