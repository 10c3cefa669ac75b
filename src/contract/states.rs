//! Purpose: Provider-state setup strategies used before replaying an interaction.
//! Exports: `StateSetup`, `ProviderStates`, `HttpStateChange`, `StateHandler`.
//! Role: Seam between a state label in a contract and the fixture data behind it.
//! Invariants: Handlers only see the `FixtureRepository` double, never the live store or server.
//! Invariants: Unknown labels are usage errors; they fail one interaction, not the run.
#![allow(clippy::result_large_err)]

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::api::transport_error;
use crate::core::error::{Error, ErrorKind};
use super::fixture_store::FixtureRepository;

pub type StateHandler = Box<dyn Fn(&FixtureRepository) -> Result<(), Error> + Send + Sync>;

pub trait StateSetup: Send + Sync {
    fn apply(&self, state: &str) -> Result<(), Error>;
}

/// In-process fixture routines keyed by state label.
pub struct ProviderStates {
    repository: Arc<FixtureRepository>,
    handlers: BTreeMap<String, StateHandler>,
}

impl ProviderStates {
    pub fn new(repository: Arc<FixtureRepository>) -> Self {
        Self {
            repository,
            handlers: BTreeMap::new(),
        }
    }

    pub fn with_state<F>(mut self, label: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&FixtureRepository) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.handlers.insert(label.into(), Box::new(handler));
        self
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl StateSetup for ProviderStates {
    fn apply(&self, state: &str) -> Result<(), Error> {
        let handler = self.handlers.get(state).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("no provider state registered for '{state}'"))
        })?;
        handler(self.repository.as_ref())
    }
}

/// Delegates state setup to a provider endpoint (`POST {"state": ...}`).
pub struct HttpStateChange {
    url: Url,
    agent: ureq::Agent,
}

#[derive(Serialize)]
struct StateChangeRequest<'a> {
    state: &'a str,
}

impl HttpStateChange {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid state change url")
                .with_source(err)
        })?;
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { url, agent })
    }
}

impl StateSetup for HttpStateChange {
    fn apply(&self, state: &str) -> Result<(), Error> {
        let payload = serde_json::to_string(&StateChangeRequest { state }).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode state change request")
                .with_source(err)
        })?;
        let response = self
            .agent
            .post(self.url.as_str())
            .set("Content-Type", "application/json")
            .send_string(&payload);
        match response {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(Error::new(ErrorKind::Usage).with_message(format!(
                    "state change for '{state}' returned {code}: {}",
                    body.trim()
                )))
            }
            Err(ureq::Error::Transport(err)) => Err(transport_error(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProviderStates, StateSetup};
    use crate::core::error::ErrorKind;
    use crate::core::pet::Pet;
    use crate::contract::fixture_store::FixtureRepository;
    use crate::core::store::PetRepository;
    use std::sync::Arc;

    #[test]
    fn registered_handler_seeds_the_repository() {
        let store = Arc::new(FixtureRepository::new());
        store.insert(Pet::new(9, "Stale", "Cat", 1));
        let states = ProviderStates::new(store.clone()).with_state("one pet", |repo| {
            repo.reseed([Pet::new(1, "Buddy", "Dog", 3)]);
            Ok(())
        });
        states.apply("one pet").expect("apply");
        assert_eq!(store.get(1).map(|pet| pet.name), Some("Buddy".to_string()));
        assert!(store.get(9).is_none());
        assert_eq!(states.labels().collect::<Vec<_>>(), vec!["one pet"]);
    }

    #[test]
    fn unknown_state_is_a_usage_error() {
        let states = ProviderStates::new(Arc::new(FixtureRepository::new()));
        let err = states.apply("nothing here").expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
