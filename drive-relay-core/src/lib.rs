#![doc = "drive-relay-core: core logic library for drive-relay."]

//! This crate contains the transfer pipeline: locator classification, the
//! source adapters and fallback downloader, the per-user authorization flow
//! with its credential store, and the dispatcher that ties them together.
//! The `drive-relay` binary crate wires these to concrete providers and a
//! console gateway.

pub mod auth;
pub mod classify;
pub mod config;
pub mod contract;
pub mod credentials;
pub mod download;
pub mod messages;
pub mod transfer;
pub mod upload;
