//! Peer-to-peer file sharing over a VPN mesh.
//!
//! The [`event_manager::EventManager`] turns engine events into transfer state, the
//! [`service::TransferService`] answers client calls, and [`api`] exposes both over HTTP.

pub mod api;
pub mod config;
pub mod engine;
pub mod event_manager;
pub mod mesh;
pub mod metrics;
pub mod notify;
pub mod service;
pub mod storage;
pub mod system;
pub mod transfer;

#[cfg(test)]
mod testing;
