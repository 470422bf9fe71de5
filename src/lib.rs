//! chunkpush library crate — re-exports for integration tests.
//!
//! The primary interface is the `chunkpush` binary. This lib.rs exposes the
//! internal modules so integration tests can exercise the parser, ledger,
//! and replay engine directly without going through the CLI.

pub mod git;
pub mod ledger;
pub mod manifest;
pub mod replay;
