pub mod assistant;
pub mod config;
pub mod db;
pub mod graph;
pub mod lifecycle;
pub mod llm;
pub mod terminal;
pub mod vectorstore;
