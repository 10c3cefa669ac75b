//! Purpose: Persist and load contract artifacts on disk.
//! Exports: `write_contract`, `read_contract`, `artifact_path`.
//! Role: Hand-off point between the consumer test run and provider verification.
//! Invariants: Writes merge by interaction description under an exclusive file lock.
//! Invariants: Artifacts with an unknown `contract_version` are rejected as corrupt.
//! Invariants: Loaded interactions pass the same checks as built ones, or the artifact is corrupt.
#![allow(clippy::result_large_err)]

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::builder::check_interaction;
use super::model::{CONTRACT_VERSION, Contract};
use crate::core::error::{Error, ErrorKind};

pub fn artifact_path(dir: &Path, consumer: &str, provider: &str) -> PathBuf {
    dir.join(format!("{consumer}-{provider}.json"))
}

/// Writes `contract` into `dir`, merging with an artifact already there.
pub fn write_contract(dir: &Path, contract: &Contract) -> Result<PathBuf, Error> {
    fs::create_dir_all(dir).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to create contract directory")
            .with_path(dir)
            .with_source(err)
    })?;
    let path = artifact_path(dir, &contract.consumer.name, &contract.provider.name);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|err| io_error("failed to open contract artifact", &path, err))?;
    let _lock = ArtifactLock::acquire(&file, &path)?;
    let mut handle: &File = &file;

    let mut existing = String::new();
    handle
        .read_to_string(&mut existing)
        .map_err(|err| io_error("failed to read contract artifact", &path, err))?;

    let mut merged = if existing.trim().is_empty() {
        Contract::new(&contract.consumer.name, &contract.provider.name)
    } else {
        parse_contract(&existing, &path)?
    };
    for interaction in &contract.interactions {
        merged.upsert(interaction.clone());
    }

    let encoded = serde_json::to_string_pretty(&merged).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode contract")
            .with_source(err)
    })?;
    file.set_len(0)
        .and_then(|_| handle.seek(SeekFrom::Start(0)))
        .and_then(|_| handle.write_all(encoded.as_bytes()))
        .and_then(|_| handle.write_all(b"\n"))
        .and_then(|_| file.sync_all())
        .map_err(|err| io_error("failed to write contract artifact", &path, err))?;

    tracing::debug!(
        path = %path.display(),
        interactions = merged.interactions.len(),
        "wrote contract artifact"
    );
    Ok(path)
}

pub fn read_contract(path: &Path) -> Result<Contract, Error> {
    let content = fs::read_to_string(path).map_err(|err| {
        let kind = if err.kind() == io::ErrorKind::NotFound {
            ErrorKind::NotFound
        } else {
            ErrorKind::Io
        };
        Error::new(kind)
            .with_message("failed to read contract artifact")
            .with_path(path)
            .with_source(err)
    })?;
    parse_contract(&content, path)
}

fn parse_contract(content: &str, path: &Path) -> Result<Contract, Error> {
    let contract: Contract = serde_json::from_str(content).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("contract artifact is not a valid contract document")
            .with_path(path)
            .with_source(err)
    })?;
    let version = contract.metadata.contract_version;
    if version != CONTRACT_VERSION {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!("unsupported contract_version: {version}"))
            .with_path(path)
            .with_hint(format!(
                "This build reads contract_version {CONTRACT_VERSION}."
            )));
    }
    for interaction in &contract.interactions {
        check_interaction(interaction).map_err(|message| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!(
                    "invalid interaction '{}': {message}",
                    interaction.description
                ))
                .with_path(path)
        })?;
    }
    Ok(contract)
}

fn io_error(message: &str, path: &Path, err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

struct ArtifactLock<'a> {
    file: &'a File,
}

impl<'a> ArtifactLock<'a> {
    fn acquire(file: &'a File, path: &Path) -> Result<Self, Error> {
        file.lock_exclusive()
            .map_err(|err| io_error("failed to lock contract artifact", path, err))?;
        Ok(Self { file })
    }
}

impl Drop for ArtifactLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::{artifact_path, read_contract, write_contract};
    use crate::contract::builder::InteractionBuilder;
    use crate::contract::model::Contract;
    use crate::core::error::ErrorKind;

    fn contract_with(descriptions: &[(&str, u16)]) -> Contract {
        let mut contract = Contract::new("pet_consumer", "pet_provider");
        for (description, status) in descriptions {
            contract.upsert(
                InteractionBuilder::new(*description)
                    .path("/api/pets")
                    .will_respond_with(*status)
                    .build()
                    .expect("interaction"),
            );
        }
        contract
    }

    #[test]
    fn write_then_read_returns_the_same_contract() {
        let temp = tempfile::tempdir().expect("tempdir");
        let contract = contract_with(&[("list", 200)]);
        let path = write_contract(temp.path(), &contract).expect("write");
        assert_eq!(
            path,
            artifact_path(temp.path(), "pet_consumer", "pet_provider")
        );
        assert_eq!(read_contract(&path).expect("read"), contract);
    }

    #[test]
    fn writes_merge_by_description() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_contract(temp.path(), &contract_with(&[("list", 200), ("get", 200)]))
            .expect("first");
        let path = write_contract(temp.path(), &contract_with(&[("get", 404), ("create", 201)]))
            .expect("second");

        let merged = read_contract(&path).expect("read");
        let summary: Vec<(&str, u16)> = merged
            .interactions
            .iter()
            .map(|i| (i.description.as_str(), i.response.status))
            .collect();
        assert_eq!(summary, vec![("list", 200), ("get", 404), ("create", 201)]);
    }

    #[test]
    fn parallel_writers_do_not_lose_interactions() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().to_path_buf();
        let handles: Vec<_> = (0..6)
            .map(|index| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    let description = format!("interaction {index}");
                    write_contract(&dir, &contract_with(&[(description.as_str(), 200)]))
                        .expect("write");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        let contract =
            read_contract(&artifact_path(&dir, "pet_consumer", "pet_provider")).expect("read");
        assert_eq!(contract.interactions.len(), 6);
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("c-p.json");
        std::fs::write(
            &path,
            r#"{"consumer":{"name":"c"},"provider":{"name":"p"},"interactions":[],"metadata":{"contract_version":9}}"#,
        )
        .expect("write");
        let err = read_contract(&path).expect_err("version");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn host_escaping_interaction_is_corrupt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("c-p.json");
        std::fs::write(
            &path,
            r#"{"consumer":{"name":"c"},"provider":{"name":"p"},"interactions":[{"description":"escape","request":{"method":"GET","path":"//other.host/x"},"response":{"status":200}}],"metadata":{"contract_version":1}}"#,
        )
        .expect("write");
        let err = read_contract(&path).expect_err("escape");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert!(err.message().unwrap_or_default().contains("origin-relative"));
    }

    #[test]
    fn unknown_method_in_artifact_is_corrupt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("c-p.json");
        std::fs::write(
            &path,
            r#"{"consumer":{"name":"c"},"provider":{"name":"p"},"interactions":[{"description":"brew","request":{"method":"BREW","path":"/pot"},"response":{"status":418}}],"metadata":{"contract_version":1}}"#,
        )
        .expect("write");
        let err = read_contract(&path).expect_err("method");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_contract(&temp.path().join("absent.json")).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
