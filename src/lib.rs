pub mod config;
pub mod llm;
pub mod nlq;
pub mod util;
pub mod web;
