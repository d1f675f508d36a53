//! HashVault ledger access.
//!
//! The ledger is an external append-only record store. This crate defines the
//! contract the upload core relies on ([`LedgerClient`]), the interactive
//! signing seam ([`Signer`]), and an in-memory ledger that mirrors the
//! owner-indexed storage layout of the on-chain contract for tests and local
//! use.

pub mod client;
pub mod errors;
pub mod memory;
pub mod signer;

pub use client::LedgerClient;
pub use errors::*;
pub use memory::{ConfirmationMode, MemoryLedger};
pub use signer::{Authorization, ScriptedSigner, Signer, SignerBehavior, StaticSigner};
