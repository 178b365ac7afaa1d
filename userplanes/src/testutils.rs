use crate::backend::{Backend, BackendError, BackendQueryResult, BackendRequest, ControlPlane};
use async_trait::async_trait;
use hyper::StatusCode;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type ScriptedReply = Result<BackendQueryResult, BackendError>;

/// Control plane answering from replies queued per backend.
///
/// Every call is recorded. A call with nothing queued fails like an
/// unreachable backend.
#[derive(Default)]
pub struct FakeControlPlane {
    replies: Mutex<HashMap<Backend, VecDeque<ScriptedReply>>>,
    calls: Mutex<Vec<(Backend, BackendRequest)>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a 200 reply with `body` for the next call to `backend`.
    pub fn reply(&self, backend: Backend, body: Value) -> &Self {
        self.push(backend, Ok(BackendQueryResult::new(StatusCode::OK, body)))
    }

    /// Queues a transport failure for the next call to `backend`.
    pub fn fail(&self, backend: Backend) -> &Self {
        self.push(
            backend,
            Err(BackendError::RequestFailed(backend, "connection refused".to_string())),
        )
    }

    pub fn calls(&self) -> Vec<(Backend, BackendRequest)> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, backend: Backend, reply: ScriptedReply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(backend)
            .or_default()
            .push_back(reply);
        self
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn execute(
        &self,
        backend: Backend,
        request: BackendRequest,
    ) -> Result<BackendQueryResult, BackendError> {
        self.calls.lock().unwrap().push((backend, request));

        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&backend)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| {
            Err(BackendError::RequestFailed(
                backend,
                "no scripted reply".to_string(),
            ))
        })
    }
}

pub fn created(id: &str) -> Value {
    json!({"success": true, "id": id})
}

pub fn accepted() -> Value {
    json!({"success": true})
}

pub fn rejected() -> Value {
    json!({"success": false})
}

pub fn listing(items: Vec<Value>) -> Value {
    json!({"success": true, "totalCount": items.len(), "items": items})
}

pub fn pgw_item(id: &str, tac: &str) -> Value {
    json!({
        "id": id,
        "uuid": format!("pgw-{id}"),
        "s5u_ip": "192.168.120.122",
        "proxy_ip": "192.168.120.122",
        "tac": tac,
        "apn_ni": "internet.mnc001.mcc310.gprs"
    })
}

pub fn sgw_item(id: &str, tac: &str) -> Value {
    json!({
        "id": id,
        "uuid": format!("sgw-{id}"),
        "s5u_ip": "192.168.120.123",
        "peer_ip": "192.168.120.123",
        "s1u_nat_ip": "192.168.120.123",
        "s1u_ip": "192.168.120.124",
        "tac": tac
    })
}

/// Complete create request for a combined SGW/PGW userplane
pub fn userplane_body(function: &str) -> Value {
    json!({
        "uuid": "b5f3c2d8-6a44-4c38-9b45-0c5c8d5d2c1a",
        "function": function,
        "config": {
            "s5u_pgw": {"up_ip_address": "192.168.120.122"},
            "s5u_sgw": {"up_ip_address": "192.168.120.123"},
            "s1u": {"up_ip_address": "192.168.120.124"}
        },
        "selectors": [{
            "id": "selector-1",
            "network": {"mcc": "310", "mnc": "001"},
            "uli": {"tai": {"tac": 4660}},
            "pdn": {"apns": ["internet"]}
        }]
    })
}
