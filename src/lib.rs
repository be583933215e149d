/// Basic application code
pub mod app;
/// Application authorization
pub mod auth;
/// REST clients for outside services
pub mod client;
/// Time source for the subscription rules
pub mod clock;
/// Controllers for REST endpoints
pub mod controller;
/// Cryptography-related objects
pub mod crypto;
/// Domain objects
pub mod domain;
/// REST error responses
pub mod error;
/// Repositories
pub mod repo;
/// Subscriber lifecycle and newsletter services
pub mod service;
/// Application settings
pub mod settings;
/// Scheduled purge of unverified subscribers
pub mod sweeper;
/// Application telemetry for tracing and logging
pub mod telemetry;
