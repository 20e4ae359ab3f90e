pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod llm;
pub mod render;
pub mod voice;
