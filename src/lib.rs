pub mod api;
pub mod app;
pub mod comments;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod personal;
pub mod reader;
pub mod state;
pub mod terminal;
pub mod ui;
