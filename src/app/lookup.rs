// StockScan - app/lookup.rs
//
// Client directory access: the HTTP implementation of the core
// `ClientDirectory` contract, plus the background worker that keeps
// resolution off the composing thread.
//
// Architecture mirrors the scan workers elsewhere in the app layer:
//   - `LookupManager` lives on the composing thread.
//   - Resolution runs on a spawned thread, reporting over an mpsc channel.
//   - A dropped receiver (superseded lookup, shell closed) ends the worker
//     quietly.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::core::resolve::{
    self, ClientDetails, ClientDirectory, ClientPage, ClientQuery, ClientSummary, ResolvedClient,
    VehicleClient,
};
use crate::platform::config::AppConfig;
use crate::util::constants;
use crate::util::error::ResolveError;

// =============================================================================
// HTTP adapter
// =============================================================================

/// Endpoint set for the three directory calls. Tokens are static bearer
/// credentials; they are sent, never logged.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub vehicle_url: String,
    pub vehicle_token: String,
    pub details_url: String,
    pub details_token: String,
    pub search_url: String,
    pub search_token: String,
    pub timeout: Duration,
}

impl ApiEndpoints {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            vehicle_url: config.vehicle_url.clone(),
            vehicle_token: config.vehicle_token.clone(),
            details_url: config.details_url.clone(),
            details_token: config.details_token.clone(),
            search_url: config.search_url.clone(),
            search_token: config.search_token.clone(),
            timeout: Duration::from_secs(config.http_timeout_secs),
        }
    }
}

/// Vehicle lookup body. Only the attached client id matters here; the id is
/// numeric on the wire but treated as opaque text everywhere in the crate.
#[derive(Debug, Deserialize)]
struct VehicleBody {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// Envelope the client endpoints wrap their payloads in. A missing `error`
/// flag is treated as an error, matching the service's own convention.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "envelope_error_default")]
    error: bool,
    data: Option<T>,
}

fn envelope_error_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
struct DetailsBody {
    #[serde(default)]
    nom: String,
    #[serde(default)]
    prenom: String,
    #[serde(default)]
    wilaya: String,
}

#[derive(Debug, Deserialize, Default)]
struct SummaryBody {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    nom: String,
    #[serde(default)]
    prenom: String,
    #[serde(default)]
    mobile: String,
    #[serde(default)]
    email: String,
}

/// Blocking HTTP implementation of the client directory.
pub struct HttpClientDirectory {
    client: Client,
    endpoints: ApiEndpoints,
}

impl HttpClientDirectory {
    pub fn new(endpoints: ApiEndpoints) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(endpoints.timeout)
            .build()
            .map_err(|e| ResolveError::Transport {
                message: e.to_string(),
            })?;

        Ok(Self { client, endpoints })
    }
}

impl ClientDirectory for HttpClientDirectory {
    fn vehicle_client(&self, chassis: &str) -> Result<VehicleClient, ResolveError> {
        let url = format!("{}/{chassis}", self.endpoints.vehicle_url);
        tracing::debug!(chassis = %chassis, "Vehicle lookup");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.endpoints.vehicle_token)
            .send()
            .map_err(|e| ResolveError::Transport {
                message: e.to_string(),
            })?;

        // An unknown chassis and a chassis with no attached client are the
        // same business state: nothing is reserved.
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ResolveError::NotReserved {
                chassis: chassis.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(service_error(response));
        }

        let body: VehicleBody = response.json().map_err(|e| ResolveError::Malformed {
            message: e.to_string(),
        })?;

        match body.id.as_ref().and_then(value_to_id) {
            Some(client_id) => Ok(VehicleClient { client_id }),
            None => Err(ResolveError::NotReserved {
                chassis: chassis.to_string(),
            }),
        }
    }

    fn client_details(&self, client_id: &str) -> Result<ClientDetails, ResolveError> {
        let url = format!("{}/{client_id}", self.endpoints.details_url);
        tracing::debug!(client_id = %client_id, "Client details lookup");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.endpoints.details_token)
            .send()
            .map_err(|e| ResolveError::Transport {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(service_error(response));
        }

        let envelope: Envelope<DetailsBody> =
            response.json().map_err(|e| ResolveError::Malformed {
                message: e.to_string(),
            })?;

        let body = unwrap_envelope(envelope)?;
        Ok(ClientDetails {
            nom: body.nom,
            prenom: body.prenom,
            wilaya: body.wilaya,
        })
    }

    fn search_clients(
        &self,
        query: &ClientQuery,
        page: usize,
    ) -> Result<ClientPage, ResolveError> {
        let mut params: Vec<(&str, String)> = vec![
            ("page", page.to_string()),
            ("perPage", constants::DEFAULT_CLIENTS_PER_PAGE.to_string()),
        ];
        if !query.id.is_empty() {
            params.push(("id", query.id.clone()));
        }
        if !query.nom.is_empty() {
            params.push(("nom", query.nom.clone()));
        }
        if !query.prenom.is_empty() {
            params.push(("prenom", query.prenom.clone()));
        }

        tracing::debug!(page, "Client search");

        let response = self
            .client
            .get(&self.endpoints.search_url)
            .query(&params)
            .bearer_auth(&self.endpoints.search_token)
            .send()
            .map_err(|e| ResolveError::Transport {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(service_error(response));
        }

        let envelope: Envelope<Vec<SummaryBody>> =
            response.json().map_err(|e| ResolveError::Malformed {
                message: e.to_string(),
            })?;

        let rows = unwrap_envelope(envelope)?;
        let clients: Vec<ClientSummary> = rows
            .into_iter()
            .map(|row| ClientSummary {
                id: row.id.as_ref().and_then(value_to_id).unwrap_or_default(),
                nom: row.nom,
                prenom: row.prenom,
                mobile: row.mobile,
                email: row.email,
            })
            .collect();

        Ok(ClientPage {
            total: clients.len(),
            clients,
            page,
        })
    }
}

fn service_error(response: reqwest::blocking::Response) -> ResolveError {
    let status = response.status().as_u16();
    let message = response.text().unwrap_or_else(|_| String::new());
    ResolveError::Service { status, message }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, ResolveError> {
    if envelope.error {
        return Err(ResolveError::Malformed {
            message: "service reported an error envelope".to_string(),
        });
    }
    envelope.data.ok_or_else(|| ResolveError::Malformed {
        message: "envelope carried no data".to_string(),
    })
}

/// Accept both numeric and string ids from the wire.
fn value_to_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Background resolution worker
// =============================================================================

/// Progress messages from the resolution thread to the composing thread.
#[derive(Debug, Clone)]
pub enum LookupProgress {
    /// Both lookups succeeded.
    Resolved {
        chassis: String,
        client: ResolvedClient,
    },
    /// The chassis has no attached client — its own state, not a failure.
    NotReserved { chassis: String },
    /// Any other resolution failure (network, service, malformed body).
    Failed { chassis: String, message: String },
}

/// Manages chassis resolution on a background thread.
pub struct LookupManager {
    /// Channel receiver the composing thread polls for progress.
    progress_rx: Option<mpsc::Receiver<LookupProgress>>,
}

impl LookupManager {
    pub fn new() -> Self {
        Self { progress_rx: None }
    }

    /// Start resolving `chassis` against `directory`.
    ///
    /// Spawns a background thread immediately. Starting a new resolution
    /// supersedes the previous one: its receiver is dropped, so a stale
    /// worker's sends fail and it exits quietly.
    pub fn start_resolve(&mut self, directory: Arc<dyn ClientDirectory>, chassis: String) {
        let (tx, rx) = mpsc::channel();
        self.progress_rx = Some(rx);

        std::thread::spawn(move || {
            let message = match resolve::resolve_chassis(directory.as_ref(), &chassis) {
                Ok(client) => LookupProgress::Resolved { chassis, client },
                Err(e) if e.is_not_reserved() => LookupProgress::NotReserved { chassis },
                Err(e) => LookupProgress::Failed {
                    chassis,
                    message: e.to_string(),
                },
            };
            // Receiver dropped means the lookup was superseded; exit quietly.
            let _ = tx.send(message);
        });

        tracing::info!("Client resolution started");
    }

    /// Poll for progress messages without blocking.
    pub fn poll_progress(&self) -> Vec<LookupProgress> {
        let mut messages = Vec::new();
        if let Some(ref rx) = self.progress_rx {
            while let Ok(msg) = rx.try_recv() {
                messages.push(msg);
            }
        }
        messages
    }
}

impl Default for LookupManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    struct FakeDirectory {
        reserved: &'static str,
    }

    impl ClientDirectory for FakeDirectory {
        fn vehicle_client(&self, chassis: &str) -> Result<VehicleClient, ResolveError> {
            if chassis == self.reserved {
                Ok(VehicleClient {
                    client_id: "7".to_string(),
                })
            } else {
                Err(ResolveError::NotReserved {
                    chassis: chassis.to_string(),
                })
            }
        }

        fn client_details(&self, _client_id: &str) -> Result<ClientDetails, ResolveError> {
            Ok(ClientDetails {
                nom: "AMRANI".to_string(),
                prenom: "Lina".to_string(),
                wilaya: "Alger".to_string(),
            })
        }

        fn search_clients(
            &self,
            _query: &ClientQuery,
            _page: usize,
        ) -> Result<ClientPage, ResolveError> {
            Ok(ClientPage::default())
        }
    }

    /// Drain the manager until a message arrives or the deadline passes.
    fn wait_for_progress(manager: &LookupManager) -> LookupProgress {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(msg) = manager.poll_progress().into_iter().next() {
                return msg;
            }
            assert!(Instant::now() < deadline, "no lookup progress within 5s");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_worker_reports_resolved_client() {
        let mut manager = LookupManager::new();
        manager.start_resolve(
            Arc::new(FakeDirectory { reserved: "CH-1" }),
            "CH-1".to_string(),
        );

        match wait_for_progress(&manager) {
            LookupProgress::Resolved { chassis, client } => {
                assert_eq!(chassis, "CH-1");
                assert_eq!(client.client_id, "7");
                assert_eq!(client.client_name, "AMRANI Lina");
                assert_eq!(client.wilaya, "Alger");
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[test]
    fn test_worker_reports_not_reserved_distinctly() {
        let mut manager = LookupManager::new();
        manager.start_resolve(
            Arc::new(FakeDirectory { reserved: "CH-1" }),
            "CH-FREE".to_string(),
        );

        match wait_for_progress(&manager) {
            LookupProgress::NotReserved { chassis } => assert_eq!(chassis, "CH-FREE"),
            other => panic!("expected NotReserved, got {other:?}"),
        }
    }

    #[test]
    fn test_value_to_id_accepts_numbers_and_strings() {
        assert_eq!(
            value_to_id(&serde_json::json!(42)),
            Some("42".to_string())
        );
        assert_eq!(
            value_to_id(&serde_json::json!("42")),
            Some("42".to_string())
        );
        assert_eq!(value_to_id(&serde_json::json!("")), None);
        assert_eq!(value_to_id(&serde_json::Value::Null), None);
    }
}
