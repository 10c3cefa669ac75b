//! Purpose: Define the public Rust API boundary for the pet service.
//! Exports: Service, client, storage, and error types used by the CLI and tests.
//! Role: Single import path for callers; internal modules stay private.
//! Invariants: Storage reaches the service only through `PetRepository`.

mod client;
mod service;

pub(crate) use client::{normalize_base_url, transport_error};

pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use crate::core::pet::{Pet, PetInput};
pub use crate::core::store::{MemoryStore, PetRepository};
pub use client::PetClient;
pub use service::PetService;
