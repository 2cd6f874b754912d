//! # outpost-core
//!
//! Foundation types for the Outpost station-session subsystem.
//!
//! This crate provides the shared vocabulary the other Outpost crates depend
//! on:
//!
//! - **Branded IDs**: `ConnectionId`, `StationId`, `RequestId`, `ImageId`,
//!   `UserId` as newtypes for type safety
//! - **Wire protocol**: the tagged JSON [`protocol::Frame`] enum exchanged
//!   with monitoring stations
//! - **Errors**: [`errors::SessionError`] hierarchy via `thiserror`, plus the
//!   [`errors::ErrorInfo`] surface form shown to operators

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod protocol;
