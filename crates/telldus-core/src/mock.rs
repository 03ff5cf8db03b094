//! Scripted remote for testing.
//!
//! [`MockSession`] implements [`TelldusSession`] over an in-memory roster and
//! per-sensor event lists, so the sync pipeline can be exercised without
//! network access.
//!
//! # Features
//!
//! - **Inclusive `from`**: history queries return events with `ts >= from`,
//!   the way the real API does
//! - **Failure injection**: fail the roster call or one sensor's history call
//!   with a given status
//! - **Latency simulation**: delay a sensor's history response
//! - **Request recording**: inspect every call made
//!
//! # Example
//!
//! ```
//! use telldus_core::{MockSession, TelldusSession};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = MockSession::new();
//!     session.add_sensor(1, "Kitchen");
//!     session.push_event(1, 1000, &[("temp", "21.5".into())]);
//!
//!     let response = session.get("sensors/list", &[]).await.unwrap();
//!     assert_eq!(response.status, 200);
//!     assert_eq!(session.requests().len(), 1);
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use telldus_types::{DataPoint, RawEvent, RawValue};

use crate::error::RemoteFetchError;
use crate::history::SENSOR_HISTORY;
use crate::sensors::SENSORS_LIST;
use crate::session::{ApiResponse, TelldusSession};

/// A request received by [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct MockState {
    roster: Vec<(i64, String)>,
    events: HashMap<i64, Vec<RawEvent>>,
    history_failures: HashMap<i64, (u16, String)>,
    list_failure: Option<(u16, String)>,
    latency: HashMap<i64, Duration>,
    requests: Vec<RecordedRequest>,
}

/// An in-memory Telldus remote.
#[derive(Debug, Default)]
pub struct MockSession {
    state: Mutex<MockState>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a sensor to the roster. Roster order is insertion order.
    pub fn add_sensor(&self, id: i64, name: &str) {
        self.state().roster.push((id, name.to_string()));
    }

    /// Append a history event for a sensor.
    pub fn push_event(&self, sensor_id: i64, ts: i64, points: &[(&str, RawValue)]) {
        let event = RawEvent {
            ts,
            data: points
                .iter()
                .map(|(name, value)| DataPoint {
                    name: name.to_string(),
                    value: value.clone(),
                })
                .collect(),
        };
        self.state().events.entry(sensor_id).or_default().push(event);
    }

    /// Make history calls for `sensor_id` answer with `status` and `body`.
    pub fn fail_history(&self, sensor_id: i64, status: u16, body: &str) {
        self.state()
            .history_failures
            .insert(sensor_id, (status, body.to_string()));
    }

    /// Stop failing history calls for `sensor_id`.
    pub fn clear_history_failure(&self, sensor_id: i64) {
        self.state().history_failures.remove(&sensor_id);
    }

    /// Make the roster call answer with `status` and `body`.
    pub fn fail_list(&self, status: u16, body: &str) {
        self.state().list_failure = Some((status, body.to_string()));
    }

    /// Delay history responses for `sensor_id`.
    pub fn set_latency(&self, sensor_id: i64, latency: Duration) {
        self.state().latency.insert(sensor_id, latency);
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    /// Number of history requests received for `sensor_id`.
    pub fn history_calls(&self, sensor_id: i64) -> usize {
        let id = sensor_id.to_string();
        self.state()
            .requests
            .iter()
            .filter(|r| {
                r.endpoint == SENSOR_HISTORY
                    && r.params.iter().any(|(k, v)| k == "id" && *v == id)
            })
            .count()
    }

    fn list_response(&self) -> ApiResponse {
        let state = self.state();
        if let Some((status, body)) = &state.list_failure {
            return ApiResponse::new(SENSORS_LIST, *status, body.clone());
        }

        // Same shape as the live API: singular key, string ids
        let sensors: Vec<_> = state
            .roster
            .iter()
            .map(|(id, name)| json!({ "id": id.to_string(), "name": name }))
            .collect();
        ApiResponse::new(SENSORS_LIST, 200, json!({ "sensor": sensors }).to_string())
    }

    fn history_response(&self, params: &[(&str, String)]) -> (ApiResponse, Option<Duration>) {
        let param = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .and_then(|(_, v)| v.parse::<i64>().ok())
        };
        let Some(id) = param("id") else {
            return (ApiResponse::new(SENSOR_HISTORY, 400, "missing id"), None);
        };
        let from = param("from").unwrap_or(0);

        let state = self.state();
        let latency = state.latency.get(&id).copied();

        if let Some((status, body)) = state.history_failures.get(&id) {
            return (ApiResponse::new(SENSOR_HISTORY, *status, body.clone()), latency);
        }

        let history: Vec<&RawEvent> = state
            .events
            .get(&id)
            .map(|events| events.iter().filter(|e| e.ts >= from).collect())
            .unwrap_or_default();
        let body = json!({ "history": history }).to_string();

        (ApiResponse::new(SENSOR_HISTORY, 200, body), latency)
    }
}

#[async_trait]
impl TelldusSession for MockSession {
    async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<ApiResponse, RemoteFetchError> {
        self.state().requests.push(RecordedRequest {
            endpoint: endpoint.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });

        match endpoint {
            SENSORS_LIST => Ok(self.list_response()),
            SENSOR_HISTORY => {
                let (response, latency) = self.history_response(params);
                if let Some(latency) = latency {
                    tokio::time::sleep(latency).await;
                }
                Ok(response)
            }
            other => Ok(ApiResponse::new(other, 404, "unknown endpoint")),
        }
    }
}
