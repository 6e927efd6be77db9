pub mod connection;
pub mod identity;
pub mod notification;
