//! Purpose: Replay contract interactions against a running provider.
//! Exports: `Verifier`, `VerificationReport`, `InteractionResult`, `InteractionStatus`.
//! Role: Provider-side half of contract testing.
//! Invariants: Per interaction: pending -> state_applied -> requested -> passed|failed.
//! Invariants: A mismatch fails one interaction; the run continues with the next.
//! Invariants: An unreachable provider aborts the run with `ErrorKind::Unreachable`.
//! Notes: No retries; every request is bounded by the configured timeout.
#![allow(clippy::result_large_err)]

use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

use super::builder::check_interaction;
use super::matcher::{Mismatch, match_body, match_status};
use super::model::{Contract, Interaction};
use super::states::StateSetup;
use crate::api::normalize_base_url;
use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    Pending,
    StateApplied,
    Requested,
    Passed,
    Failed,
}

impl InteractionStatus {
    fn can_advance_to(self, next: InteractionStatus) -> bool {
        use InteractionStatus::*;
        matches!(
            (self, next),
            (Pending, StateApplied)
                | (Pending, Failed)
                | (StateApplied, Requested)
                | (Requested, Passed)
                | (Requested, Failed)
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct InteractionResult {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_state: Option<String>,
    pub status: InteractionStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<Mismatch>,
}

impl InteractionResult {
    pub fn passed(&self) -> bool {
        self.status == InteractionStatus::Passed
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct VerificationReport {
    pub consumer: String,
    pub provider: String,
    pub verified_at: String,
    pub results: Vec<InteractionResult>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(InteractionResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &InteractionResult> {
        self.results.iter().filter(|result| !result.passed())
    }

    pub fn to_text(&self) -> String {
        self.render_text(|verdict, _| verdict.to_string())
    }

    /// Like `to_text`, with `style(verdict, passed)` applied to each OK/FAILED label.
    pub fn render_text(&self, style: impl Fn(&str, bool) -> String) -> String {
        let mut lines = vec![format!(
            "Verifying contract between {} and {}",
            self.consumer, self.provider
        )];
        for result in &self.results {
            let passed = result.passed();
            let verdict = style(if passed { "OK" } else { "FAILED" }, passed);
            match &result.provider_state {
                Some(state) => lines.push(format!(
                    "  given {state}: {} ... {verdict}",
                    result.description
                )),
                None => lines.push(format!("  {} ... {verdict}", result.description)),
            }
            for mismatch in &result.mismatches {
                lines.push(format!("    - {mismatch}"));
            }
        }
        let failed = self.failures().count();
        lines.push(format!(
            "{} interaction(s), {} failed",
            self.results.len(),
            failed
        ));
        lines.join("\n")
    }
}

struct InteractionRun<'a> {
    interaction: &'a Interaction,
    status: InteractionStatus,
    mismatches: Vec<Mismatch>,
}

impl<'a> InteractionRun<'a> {
    fn new(interaction: &'a Interaction) -> Self {
        Self {
            interaction,
            status: InteractionStatus::Pending,
            mismatches: Vec::new(),
        }
    }

    fn advance(&mut self, next: InteractionStatus) {
        debug_assert!(
            self.status.can_advance_to(next),
            "illegal transition {:?} -> {next:?}",
            self.status
        );
        self.status = next;
    }

    fn fail(&mut self, mismatch: Mismatch) {
        self.mismatches.push(mismatch);
        self.advance(InteractionStatus::Failed);
    }

    fn finish(self) -> InteractionResult {
        InteractionResult {
            description: self.interaction.description.clone(),
            provider_state: self.interaction.provider_state.clone(),
            status: self.status,
            mismatches: self.mismatches,
        }
    }
}

pub struct Verifier {
    base_url: Url,
    agent: ureq::Agent,
    states: Option<Box<dyn StateSetup>>,
}

impl Verifier {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            agent: agent_with_timeout(DEFAULT_TIMEOUT),
            states: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = agent_with_timeout(timeout);
        self
    }

    pub fn with_states(mut self, states: impl StateSetup + 'static) -> Self {
        self.states = Some(Box::new(states));
        self
    }

    pub fn verify(&self, contract: &Contract) -> Result<VerificationReport, Error> {
        let mut results = Vec::with_capacity(contract.interactions.len());
        for interaction in &contract.interactions {
            let result = self.verify_interaction(interaction)?;
            if result.passed() {
                tracing::info!(interaction = %result.description, "interaction passed");
            } else {
                tracing::warn!(
                    interaction = %result.description,
                    mismatches = result.mismatches.len(),
                    "interaction failed"
                );
            }
            results.push(result);
        }
        Ok(VerificationReport {
            consumer: contract.consumer.name.clone(),
            provider: contract.provider.name.clone(),
            verified_at: timestamp_now(),
            results,
        })
    }

    fn verify_interaction(&self, interaction: &Interaction) -> Result<InteractionResult, Error> {
        let mut run = InteractionRun::new(interaction);

        if let Err(message) = check_interaction(interaction) {
            run.fail(Mismatch {
                path: "request".to_string(),
                expected: "a valid interaction".to_string(),
                actual: message,
            });
            return Ok(run.finish());
        }

        if let Some(state) = interaction.provider_state.as_deref() {
            let applied = match self.states.as_ref() {
                Some(states) => states.apply(state),
                None => Err(Error::new(ErrorKind::Usage)
                    .with_message("contract needs provider states but none are configured")),
            };
            if let Err(err) = applied {
                if err.kind() == ErrorKind::Unreachable {
                    return Err(err);
                }
                run.fail(Mismatch {
                    path: "provider_state".to_string(),
                    expected: format!("state '{state}' applied"),
                    actual: err.to_string(),
                });
                return Ok(run.finish());
            }
            tracing::debug!(state, "provider state applied");
        }
        run.advance(InteractionStatus::StateApplied);

        let (status, body) = self.send(interaction)?;
        run.advance(InteractionStatus::Requested);
        tracing::debug!(
            method = %interaction.request.method,
            path = %interaction.request.path,
            status,
            "replayed request"
        );

        let mut mismatches = Vec::new();
        if let Some(mismatch) = match_status(interaction.response.status, status) {
            mismatches.push(mismatch);
        }
        mismatches.extend(match_body(interaction.response.body.as_ref(), &body));
        if mismatches.is_empty() {
            run.advance(InteractionStatus::Passed);
        } else {
            run.mismatches = mismatches;
            run.advance(InteractionStatus::Failed);
        }
        Ok(run.finish())
    }

    fn send(&self, interaction: &Interaction) -> Result<(u16, Vec<u8>), Error> {
        let url = self.base_url.join(&interaction.request.path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid interaction path: {}", interaction.request.path))
                .with_source(err)
        })?;
        let request = self
            .agent
            .request(&interaction.request.method, url.as_str())
            .set("Accept", "application/json");
        let response = match &interaction.request.body {
            Some(matcher) => request
                .set("Content-Type", "application/json")
                .send_string(&matcher.example().to_string()),
            None => request.call(),
        };
        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                return Err(Error::new(ErrorKind::Unreachable)
                    .with_message(format!("provider unreachable at {}", self.base_url))
                    .with_hint("Start the provider or check --provider-url.")
                    .with_source(err));
            }
        };
        let status = response.status();
        let mut body = Vec::new();
        std::io::Read::read_to_end(&mut response.into_reader(), &mut body).map_err(|err| {
            Error::new(ErrorKind::Unreachable)
                .with_message("failed to read provider response")
                .with_source(err)
        })?;
        Ok((status, body))
    }
}

fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

fn timestamp_now() -> String {
    use time::format_description::well_known::Rfc3339;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos() as i128)
        .unwrap_or_default();
    time::OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_default()
}
