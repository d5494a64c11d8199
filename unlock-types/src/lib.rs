// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the unlockd write-protection control service
//!
//! This crate defines the single source of truth for the types shared across
//! the stack:
//!
//! - **unlock-core**: keys its registry and collaborator traits on these types
//! - **unlock-udisks**: resolves UDisks2 objects into these types
//! - **unlockd**: serializes these types over its D-Bus surface

pub mod event;
pub mod target;

pub use event::DeviceEvent;
pub use target::BlockTarget;
