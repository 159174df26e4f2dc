pub mod chat;
pub mod config_cmd;
pub mod media;
pub mod memory;
pub mod plan;
pub mod sentiment;
pub mod tasks;
