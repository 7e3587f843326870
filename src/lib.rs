pub mod config;
pub mod db;
pub mod devops;
pub mod log;
pub mod managers;
pub mod services;
pub mod span;
