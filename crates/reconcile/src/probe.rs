//! Remote state probing.
//!
//! A probe is a read with no side effects and no retries. Its only job is to
//! classify what Gate answered; deciding what to do about it belongs to the
//! reconciler.

use gatekit::{Gate, GateRequest, RawResponse};
use serde_json::Value;

use crate::document::string_field;
use crate::job::{CANARY_CONFIG_PATH, PIPELINE_TEMPLATES_PATH};
use crate::types::{RemoteLookupResult, ResourceKind};

/// Reads resources from Gate and classifies the outcome.
pub struct Prober<'a, G: Gate + ?Sized> {
    gate: &'a G,
}

impl<'a, G: Gate + ?Sized> Prober<'a, G> {
    /// Create a prober over a Gate handle.
    pub fn new(gate: &'a G) -> Self {
        Self { gate }
    }

    /// Read one resource.
    ///
    /// `application` is only used for pipelines. For canary configs `name`
    /// is looked up in the config listing unless `id_hint` is given.
    pub fn probe(
        &self,
        kind: ResourceKind,
        application: &str,
        name: &str,
        id_hint: Option<&str>,
    ) -> RemoteLookupResult {
        match kind {
            ResourceKind::Application => {
                self.read(&format!("/applications/{name}"), Some(name))
            }
            ResourceKind::Pipeline => self.read(
                &format!("/applications/{application}/pipelineConfigs/{name}"),
                None,
            ),
            ResourceKind::Project => self.read(&format!("/projects/{name}"), Some(name)),
            ResourceKind::PipelineTemplate => {
                self.read(&format!("{PIPELINE_TEMPLATES_PATH}/{name}"), Some(name))
            }
            ResourceKind::CanaryConfig => match id_hint {
                Some(id) => self.read(&format!("{CANARY_CONFIG_PATH}/{id}"), Some(id)),
                None => self.find_canary_config(name),
            },
        }
    }

    /// Single `GET`, with `fallback_id` used when the document has no `id`.
    fn read(&self, path: &str, fallback_id: Option<&str>) -> RemoteLookupResult {
        let response = match self.gate.send(&GateRequest::get(path)) {
            Ok(response) => response,
            Err(e) => return RemoteLookupResult::TransportError(e.to_string()),
        };
        log::trace!("probe GET {path} -> {}", response.status);
        classify(&response, fallback_id)
    }

    /// Canary configs are only addressable by id, so find it in the listing
    /// first and then read the full document.
    fn find_canary_config(&self, name: &str) -> RemoteLookupResult {
        let listing = match self.read(CANARY_CONFIG_PATH, None) {
            RemoteLookupResult::Found { document, .. } => document,
            other => return other,
        };

        let Some(entries) = listing.as_array() else {
            return if listing.is_null() {
                RemoteLookupResult::NotFound
            } else {
                RemoteLookupResult::TransportError(format!(
                    "{CANARY_CONFIG_PATH} did not return a list"
                ))
            };
        };

        let id = entries
            .iter()
            .filter(|entry| string_field(entry, "name") == Some(name))
            .find_map(|entry| string_field(entry, "id"));

        match id {
            Some(id) => self.read(&format!("{CANARY_CONFIG_PATH}/{id}"), Some(id)),
            None => RemoteLookupResult::NotFound,
        }
    }
}

/// Classify a response. Total over status codes: 200 is found, 404 is not
/// found, everything else is unexpected.
pub fn classify(response: &RawResponse, fallback_id: Option<&str>) -> RemoteLookupResult {
    match response.status {
        200 => match response.json() {
            Ok(document) => {
                let id = string_field(&document, "id")
                    .or(fallback_id)
                    .map(str::to_string);
                RemoteLookupResult::Found { id, document }
            }
            Err(e) => RemoteLookupResult::TransportError(e.to_string()),
        },
        404 => RemoteLookupResult::NotFound,
        code => RemoteLookupResult::UnexpectedStatus {
            code,
            body: response.body.clone(),
        },
    }
}

/// The part of a found document compared against desired state.
///
/// Application reads wrap user-set fields in `attributes`.
pub fn comparable_document(kind: ResourceKind, document: &Value) -> &Value {
    match (kind, document.get("attributes")) {
        (ResourceKind::Application, Some(attributes)) => attributes,
        _ => document,
    }
}
