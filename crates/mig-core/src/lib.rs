// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! mig-core: the safe side of the MIG rewriting bridge.
//!
//! A host holding a majority-inverter graph feeds part of it into an engine
//! handle ([`RewriteSession`]), asks for a rewrite, and receives a
//! semantically equivalent fragment back through a reconstruction callback
//! ([`Reconstruct`]). This crate models both interfaces, scopes every node
//! reference to the numbering space that issued it, and turns every breach of
//! the call-ordering contract into a [`BridgeError::ProtocolViolation`]. The
//! raw C ABI lives in `mig-ffi`.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::use_self
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod config;
mod engine;
mod error;
mod graph;
mod ident;
mod network;
mod node;
mod reconstruct;

/// Session tunables and their JSON loader.
pub use config::{BridgeConfig, DedupPolicy};
/// Engine handle interface, in-process session, and the no-op rewriter.
pub use engine::{PassthroughRewriter, RewriteSession, Rewriter, Rewritten, Session};
/// Error taxonomy.
pub use error::{BridgeError, ConfigError, Violation};
/// Engine-side node arena.
pub use graph::Graph;
/// Scoped references and the raw sentinel.
pub use ident::{NodeRef, ScopeId, INVALID_REF};
/// Minimal host network.
pub use network::{MigNetwork, NodeId};
/// Primitive node shapes.
pub use node::{Node, NodeKind};
/// Reconstruction callback interface and protocol enforcement.
pub use reconstruct::{CallbackProtocol, Reconstruct, ReconstructGuard};
