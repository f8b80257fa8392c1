// House ids and id parsing
pub mod house;

// State vector wire codec
pub mod codec;

// Durable backing store (memcached)
pub mod backing;

// In-memory house state and event log
pub mod state;

// Per-house API key checks
pub mod auth;

// Target MAC addresses
pub mod mac;

// Configuration
pub mod config;

// HTTP API
pub mod api;
