pub mod chat;
pub mod compose;
pub mod contract;
pub mod init;
