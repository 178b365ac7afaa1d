use crate::api::to_payload;
use crate::backend::{Backend, BackendRequest, ControlPlane};
use crate::config::TacEncoding;
use crate::errors::Outcome;
use crate::handler::{Handler, HandlerRequest, Reply};
use crate::mapper::{Function, PgwProfile, SgwProfile, Userplane};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// `POST /userplanes`
///
/// Creates the PGW profile, then the SGW profile, for the legs the
/// requested function needs. A combined SAEGWU userplane is only created
/// when both services assign the same id.
pub struct AddUserplane {
    control_plane: Arc<dyn ControlPlane>,
    tac_encoding: TacEncoding,
}

impl AddUserplane {
    pub fn new(control_plane: Arc<dyn ControlPlane>, tac_encoding: TacEncoding) -> Self {
        Self {
            control_plane,
            tac_encoding,
        }
    }

    async fn create(&self, backend: Backend, payload: Value) -> Result<String, Outcome> {
        let result = self
            .control_plane
            .execute(backend, BackendRequest::create(payload))
            .await
            .map_err(|e| {
                tracing::warn!(backend = %backend, error = %e, "Create failed");
                Outcome::ConnectEpcError
            })?;

        if !result.success {
            tracing::warn!(backend = %backend, "Backend refused to create profile");
            return Err(Outcome::AddedUserplane);
        }

        result.id.ok_or_else(|| {
            tracing::error!(backend = %backend, "Create succeeded without an id");
            Outcome::InternalSoftwareError
        })
    }
}

fn invalid_properties(e: impl std::fmt::Display) -> Outcome {
    tracing::warn!(error = %e, "Rejecting userplane");
    Outcome::InvalidUserplaneFunction
}

#[async_trait]
impl Handler for AddUserplane {
    fn name(&self) -> &'static str {
        "AddUserplane"
    }

    async fn handle(&self, request: HandlerRequest) -> Result<Reply, Outcome> {
        let body = request.json_body()?;
        let function = Function::from_body(body).map_err(invalid_properties)?;
        let doc = Userplane::from_body(body).map_err(invalid_properties)?;

        let pgw_id = if function.uses_pgw() {
            let profile = PgwProfile::for_create(&doc, self.tac_encoding)
                .map_err(invalid_properties)?;
            Some(self.create(Backend::Pgw, to_payload(&profile)?).await?)
        } else {
            None
        };

        let sgw_id = if function.uses_sgw() {
            let profile = SgwProfile::for_create(&doc, self.tac_encoding)
                .map_err(invalid_properties)?;
            Some(self.create(Backend::Sgw, to_payload(&profile)?).await?)
        } else {
            None
        };

        let id = match (pgw_id, sgw_id) {
            (Some(pgw_id), Some(sgw_id)) if pgw_id == sgw_id => pgw_id,
            (Some(pgw_id), Some(sgw_id)) => {
                tracing::error!(
                    pgw_id = %pgw_id,
                    sgw_id = %sgw_id,
                    "PGW and SGW assigned different ids"
                );
                return Err(Outcome::InternalSoftwareError);
            }
            (Some(id), None) | (None, Some(id)) => id,
            (None, None) => return Err(Outcome::InternalSoftwareError),
        };

        tracing::info!(id = %id, function = function.as_str(), "Userplane added");

        let mut reply = Reply::new();
        reply.insert("id".to_string(), Value::String(id));
        Ok(reply)
    }
}
