//! Client side: the cached announcement service, the delivery timing
//! machine and its poller, and the operator admin panel.
pub mod admin;
pub mod clock;
pub mod delivery;
pub mod display;
pub mod error;
pub mod poller;
pub mod service;
