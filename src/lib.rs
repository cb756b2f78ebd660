pub mod acquisition;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod history_view;
pub mod storage;
