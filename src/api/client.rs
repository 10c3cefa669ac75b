//! Purpose: Blocking HTTP client for the `/api/pets` resource.
//! Exports: `PetClient`.
//! Role: Consumer-side client exercised against mock and real servers alike.
//! Invariants: Error envelopes decode back into `Error` with the remote kind.
//! Invariants: Base URLs carry no path; requests are built from path segments.
#![allow(clippy::result_large_err)]

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

use crate::core::error::{Error, ErrorKind};
use crate::core::pet::{Pet, PetInput};

type ApiResult<T> = Result<T, Error>;

#[derive(Clone)]
pub struct PetClient {
    inner: Arc<PetClientInner>,
}

struct PetClientInner {
    base_url: Url,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    kind: String,
    message: Option<String>,
    hint: Option<String>,
}

impl PetClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(PetClientInner { base_url, agent }),
        })
    }

    pub fn list_pets(&self) -> ApiResult<Vec<Pet>> {
        let url = build_url(&self.inner.base_url, &["api", "pets"])?;
        self.request_json("GET", &url, None::<&()>)
    }

    pub fn get_pet(&self, id: i64) -> ApiResult<Pet> {
        let url = build_url(&self.inner.base_url, &["api", "pets", &id.to_string()])?;
        self.request_json("GET", &url, None::<&()>)
    }

    pub fn create_pet(&self, pet: &PetInput) -> ApiResult<Pet> {
        let url = build_url(&self.inner.base_url, &["api", "pets"])?;
        self.request_json("POST", &url, Some(pet))
    }

    pub fn update_pet(&self, id: i64, pet: &PetInput) -> ApiResult<Pet> {
        let url = build_url(&self.inner.base_url, &["api", "pets", &id.to_string()])?;
        self.request_json("PUT", &url, Some(pet))
    }

    pub fn delete_pet(&self, id: i64) -> ApiResult<()> {
        let url = build_url(&self.inner.base_url, &["api", "pets", &id.to_string()])?;
        let response = self
            .inner
            .agent
            .request("DELETE", url.as_str())
            .set("Accept", "application/json")
            .call();
        match response {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_error(err)),
        }
    }

    fn request_json<T, R>(&self, method: &str, url: &Url, body: Option<&T>) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        let response = match body {
            None => request.call(),
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
        };

        match response {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_error(err)),
        }
    }
}

pub(crate) fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage).with_message("base url must use http or https"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("base url must not include a path"));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("base url cannot be a base"))?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

pub(crate) fn transport_error(err: ureq::Transport) -> Error {
    Error::new(ErrorKind::Unreachable)
        .with_message("request failed")
        .with_source(err)
}

fn read_json_response<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let remote = envelope.error;
        let kind = ErrorKind::parse(&remote.kind).unwrap_or_else(|| error_kind_from_status(status));
        let mut err = Error::new(kind);
        if let Some(message) = remote.message {
            err = err.with_message(message);
        }
        if let Some(hint) = remote.hint {
            err = err.with_hint(hint);
        }
        return err;
    }
    Error::new(error_kind_from_status(status)).with_message(format!("remote error status {status}"))
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 | 415 | 422 => ErrorKind::Validation,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Mismatch,
        502 => ErrorKind::Unreachable,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_url, error_kind_from_status, normalize_base_url};
    use crate::core::error::ErrorKind;

    #[test]
    fn normalize_base_url_strips_trailing_slash() {
        let url = normalize_base_url("http://localhost:8080".to_string()).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn normalize_base_url_rejects_paths_and_schemes() {
        let err = normalize_base_url("http://localhost:8080/api".to_string()).expect_err("path");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = normalize_base_url("ftp://localhost".to_string()).expect_err("scheme");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn build_url_joins_segments() {
        let base = normalize_base_url("http://127.0.0.1:9000".to_string()).expect("url");
        let url = build_url(&base, &["api", "pets", "6"]).expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/api/pets/6");
    }

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(error_kind_from_status(404), ErrorKind::NotFound);
        assert_eq!(error_kind_from_status(400), ErrorKind::Validation);
        assert_eq!(error_kind_from_status(503), ErrorKind::Internal);
    }
}
