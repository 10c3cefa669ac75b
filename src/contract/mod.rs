//! Purpose: Consumer-driven contract tooling for the pet HTTP surface.
//! Exports: Contract model, builders, matchers, artifact IO, mock provider, verifier.
//! Role: Binds one interaction description to a mock consumer test and a live provider replay.
//! Invariants: The same `Contract` value drives both the mock server and the verifier.

mod artifact;
mod builder;
mod fixture_store;
mod matcher;
mod mock;
mod model;
mod states;
mod verifier;

pub use artifact::{artifact_path, read_contract, write_contract};
pub use builder::{InteractionBuilder, ObjectShape};
pub use fixture_store::FixtureRepository;
pub use matcher::{Mismatch, match_body, match_shape, match_status};
pub use mock::MockServer;
pub use model::{
    BodyMatcher, CONTRACT_VERSION, Contract, ContractMetadata, Field, Interaction, Pacticipant,
    RequestSpec, ResponseSpec, Shape,
};
pub use states::{HttpStateChange, ProviderStates, StateHandler, StateSetup};
pub use verifier::{
    DEFAULT_TIMEOUT, InteractionResult, InteractionStatus, VerificationReport, Verifier,
};
