pub mod chain;
pub mod classifier;
pub mod config;
pub mod dedup;
pub mod discord;
pub mod dispatcher;
pub mod events;
pub mod formatter;
pub mod http;
pub mod metadata;
pub mod network;
pub mod poap_api;
pub mod retry;
pub mod slack;
pub mod watcher;
