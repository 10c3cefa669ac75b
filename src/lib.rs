//! Purpose: Shared library crate used by the `petpact` CLI and tests.
//! Exports: `core` (pets, storage, errors), `api` (service + client), `serve`, `contract`.
//! Role: Library backing the binary; the contract tooling drives it through HTTP.
//! Invariants: Storage is passed explicitly to the service; there is no global store.
pub mod api;
pub mod contract;
pub mod core;
pub mod fixtures;
pub mod serve;
