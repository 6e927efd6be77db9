pub mod connection;
pub mod notification;
pub mod user;
