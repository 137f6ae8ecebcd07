pub mod app;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod crosswalk;
pub mod domain;
pub mod error;
pub mod frame;
pub mod fs_util;
pub mod output;
pub mod parse;
pub mod store;
