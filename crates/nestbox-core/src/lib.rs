//! # nestbox-core
//!
//! Low-level Linux isolation primitives for the Nestbox runtime.
//!
//! This crate provides safe abstractions over:
//! - **Cgroups v1**: memory and CPU subsystems driven through one
//!   [`cgroup::ResourceController`].
//! - **Filesystem**: layered root composition (image extraction plus a
//!   union mount), `pivot_root`, and the container's `/proc`.
//! - **Namespaces**: the clone flag set and in-namespace hostname.
//! - **External tools**: argument-list invocation of helper programs.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
pub mod tool;
