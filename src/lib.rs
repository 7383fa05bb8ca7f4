pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod matching;
pub mod realtime;
pub mod services;
