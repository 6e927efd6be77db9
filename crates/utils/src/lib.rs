pub mod log;
pub mod response;
