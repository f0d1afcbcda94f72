//! Container lifecycle management for the Nestbox runtime.
//!
//! The [`engine::Engine`] composes the root, launches the namespaced init
//! process, places it in its control groups, attaches networking, waits
//! for it to exit, and tears everything down again.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod container;
pub mod engine;
pub mod network;
pub mod process;
pub mod supervisor;
