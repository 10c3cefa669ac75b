//! Purpose: Provider-side verification of the pet contract against a live server.
//! Exports: None (integration test module).
//! Role: Replay persisted interactions with fixture states over real HTTP.
//! Invariants: Servers bind loopback port 0 and shut down on drop.
//! Invariants: Mismatches fail single interactions; unreachable providers fail the run.

use petpact::api::{ErrorKind, PetRepository};
use petpact::contract::{
    Contract, FixtureRepository, InteractionBuilder, InteractionStatus, ObjectShape, Verifier, read_contract,
    write_contract,
};
use petpact::fixtures::{
    CREATED_PET_ID, PET_1_EXISTS, SERVICE_AVAILABLE, pet_consumer_contract, pet_provider_states,
};
use petpact::serve::{AppState, BackgroundServer, router};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

struct Provider {
    server: BackgroundServer,
    store: Arc<FixtureRepository>,
}

impl Provider {
    fn start() -> TestResult<Self> {
        let store = Arc::new(FixtureRepository::new());
        let state = AppState::new(store.clone());
        let server =
            BackgroundServer::start(router(Arc::new(state), 1024 * 1024), "127.0.0.1:0".parse()?)?;
        Ok(Self { server, store })
    }

    fn verifier(&self) -> TestResult<Verifier> {
        Ok(Verifier::new(self.server.base_url())?
            .with_timeout(Duration::from_secs(2))
            .with_states(pet_provider_states(self.store.clone())))
    }
}

#[test]
fn persisted_pet_contract_verifies_against_the_real_provider() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let path = write_contract(temp.path(), &pet_consumer_contract()?)?;
    let contract = read_contract(&path)?;

    let provider = Provider::start()?;
    let report = provider.verifier()?.verify(&contract)?;

    assert!(report.passed(), "{}", report.to_text());
    assert_eq!(report.results.len(), 3);
    assert!(
        report
            .results
            .iter()
            .all(|result| result.status == InteractionStatus::Passed)
    );
    assert_eq!(report.consumer, "pet_consumer");
    assert_eq!(report.provider, "pet_provider");
    assert!(!report.verified_at.is_empty());
    Ok(())
}

#[test]
fn create_state_pins_the_id_the_consumer_expects() -> TestResult<()> {
    let provider = Provider::start()?;
    let mut contract = Contract::new("pet_consumer", "pet_provider");
    contract.upsert(
        InteractionBuilder::new("POST /api/pets creates pet 6")
            .given(SERVICE_AVAILABLE)
            .method("POST")
            .path("/api/pets")
            .request_shape(
                ObjectShape::new()
                    .string_type("name", "Rex")
                    .string_type("type", "Dog")
                    .integer_type("age", 2)
                    .into_shape(),
            )
            .will_respond_with(201)
            .response_shape(ObjectShape::new().exact("id", CREATED_PET_ID).into_shape())
            .build()?,
    );
    // Earlier traffic advanced the counter; the state still yields the pinned id.
    provider.store.create(petpact::fixtures::whiskers().with_id(0));

    let report = provider.verifier()?.verify(&contract)?;
    assert!(report.passed(), "{}", report.to_text());
    let ids: Vec<i64> = provider.store.list().iter().map(|pet| pet.id).collect();
    assert_eq!(ids, vec![CREATED_PET_ID]);
    Ok(())
}

fn name_contract(shape: ObjectShape) -> TestResult<Contract> {
    let mut contract = Contract::new("pet_consumer", "pet_provider");
    contract.upsert(
        InteractionBuilder::new("GET /api/pets/1 has a name")
            .given(PET_1_EXISTS)
            .path("/api/pets/1")
            .will_respond_with(200)
            .response_shape(shape.into_shape())
            .build()?,
    );
    Ok(contract)
}

#[test]
fn name_field_of_the_right_type_passes() -> TestResult<()> {
    let provider = Provider::start()?;
    let contract = name_contract(ObjectShape::new().exact("name", "Buddy"))?;
    let report = provider.verifier()?.verify(&contract)?;
    assert!(report.passed(), "{}", report.to_text());
    Ok(())
}

#[test]
fn wrong_typed_name_fails_the_interaction() -> TestResult<()> {
    let provider = Provider::start()?;
    let contract = name_contract(ObjectShape::new().integer_type("name", 1))?;
    let report = provider.verifier()?.verify(&contract)?;

    assert!(!report.passed());
    let failure = &report.results[0];
    assert_eq!(failure.status, InteractionStatus::Failed);
    assert_eq!(failure.mismatches.len(), 1);
    assert_eq!(failure.mismatches[0].path, "$.name");
    assert_eq!(failure.mismatches[0].expected, "integer");
    Ok(())
}

#[test]
fn missing_field_fails_without_aborting_later_interactions() -> TestResult<()> {
    let provider = Provider::start()?;
    let mut contract = name_contract(ObjectShape::new().string_type("nickname", "Bud"))?;
    for interaction in pet_consumer_contract()?.interactions {
        contract.upsert(interaction);
    }

    let report = provider.verifier()?.verify(&contract)?;
    let statuses: Vec<InteractionStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            InteractionStatus::Failed,
            InteractionStatus::Passed,
            InteractionStatus::Passed,
            InteractionStatus::Passed,
        ]
    );
    assert_eq!(report.results[0].mismatches[0].path, "$.nickname");
    assert_eq!(report.results[0].mismatches[0].actual, "missing");
    Ok(())
}

#[test]
fn unknown_provider_state_fails_before_the_request() -> TestResult<()> {
    let provider = Provider::start()?;
    provider.store.reseed(Vec::new());
    let mut contract = Contract::new("pet_consumer", "pet_provider");
    contract.upsert(
        InteractionBuilder::new("delete pet 1")
            .given("a state nobody registered")
            .method("DELETE")
            .path("/api/pets/1")
            .will_respond_with(204)
            .build()?,
    );
    provider.store.insert(petpact::fixtures::buddy());

    let report = provider.verifier()?.verify(&contract)?;
    assert_eq!(report.results[0].status, InteractionStatus::Failed);
    assert_eq!(report.results[0].mismatches[0].path, "provider_state");
    // The DELETE was never sent.
    assert!(provider.store.get(1).is_some());
    Ok(())
}

#[test]
fn status_mismatch_is_reported() -> TestResult<()> {
    let provider = Provider::start()?;
    let mut contract = Contract::new("pet_consumer", "pet_provider");
    contract.upsert(
        InteractionBuilder::new("missing pet is found?")
            .path("/api/pets/404")
            .will_respond_with(200)
            .build()?,
    );
    let report = provider.verifier()?.verify(&contract)?;
    let failure = &report.results[0];
    assert_eq!(failure.mismatches[0].path, "status");
    assert_eq!(failure.mismatches[0].actual, "404");
    Ok(())
}

#[test]
fn unreachable_provider_aborts_the_run() -> TestResult<()> {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };
    let verifier = Verifier::new(format!("http://127.0.0.1:{port}"))?;
    let mut contract = Contract::new("pet_consumer", "pet_provider");
    contract.upsert(
        InteractionBuilder::new("list")
            .path("/api/pets")
            .will_respond_with(200)
            .build()?,
    );
    let err = verifier.verify(&contract).expect_err("unreachable");
    assert_eq!(err.kind(), ErrorKind::Unreachable);
    Ok(())
}

#[test]
fn hung_provider_times_out_deterministically() -> TestResult<()> {
    // Accepts connections but never answers.
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let verifier =
        Verifier::new(format!("http://{addr}"))?.with_timeout(Duration::from_millis(300));
    let mut contract = Contract::new("pet_consumer", "pet_provider");
    contract.upsert(
        InteractionBuilder::new("list")
            .path("/api/pets")
            .will_respond_with(200)
            .build()?,
    );

    let started = Instant::now();
    let err = verifier.verify(&contract).expect_err("timeout");
    assert_eq!(err.kind(), ErrorKind::Unreachable);
    assert!(started.elapsed() < Duration::from_secs(5));
    drop(listener);
    Ok(())
}

#[test]
fn host_escaping_path_fails_without_leaving_the_provider() -> TestResult<()> {
    let provider = Provider::start()?;
    let mut interaction = InteractionBuilder::new("list elsewhere")
        .path("/api/pets")
        .will_respond_with(200)
        .build()?;
    interaction.request.path = "//other.host/api/pets".to_string();
    let mut contract = Contract::new("pet_consumer", "pet_provider");
    contract.upsert(interaction);

    let report = provider.verifier()?.verify(&contract)?;
    let failure = &report.results[0];
    assert_eq!(failure.status, InteractionStatus::Failed);
    assert_eq!(failure.mismatches[0].path, "request");
    assert!(failure.mismatches[0].actual.contains("origin-relative"));
    Ok(())
}
