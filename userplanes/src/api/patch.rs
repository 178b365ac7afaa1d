use crate::api::to_payload;
use crate::backend::{Backend, BackendRequest, ControlPlane};
use crate::config::TacEncoding;
use crate::errors::Outcome;
use crate::handler::{Handler, HandlerRequest, Reply};
use crate::mapper::{Function, PgwProfile, SgwProfile, Userplane};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// `PATCH /userplanes/{id}`
///
/// Sends a partial update to each backend the function names. Fields the
/// request leaves out are not sent.
pub struct PatchUserplane {
    control_plane: Arc<dyn ControlPlane>,
    tac_encoding: TacEncoding,
}

impl PatchUserplane {
    pub fn new(control_plane: Arc<dyn ControlPlane>, tac_encoding: TacEncoding) -> Self {
        Self {
            control_plane,
            tac_encoding,
        }
    }

    async fn update(&self, backend: Backend, id: &str, payload: Value) -> Result<(), Outcome> {
        let result = self
            .control_plane
            .execute(backend, BackendRequest::update(id, payload))
            .await
            .map_err(|e| {
                tracing::warn!(backend = %backend, id = %id, error = %e, "Update failed");
                Outcome::ConnectEpcError
            })?;

        if !result.success {
            tracing::warn!(backend = %backend, id = %id, "Backend refused update");
            return Err(Outcome::UserplaneNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for PatchUserplane {
    fn name(&self) -> &'static str {
        "PatchUserplane"
    }

    async fn handle(&self, request: HandlerRequest) -> Result<Reply, Outcome> {
        let id = request.path_id()?;
        let body = request.json_body()?;

        let function = Function::from_body(body).map_err(|e| {
            tracing::warn!(id = %id, error = %e, "Rejecting patch");
            Outcome::InvalidUserplaneFunction
        })?;
        let doc = Userplane::from_body(body).map_err(|e| {
            tracing::warn!(id = %id, error = %e, "Rejecting patch");
            Outcome::InvalidType
        })?;

        if function.uses_pgw() {
            let profile = PgwProfile::for_patch(&doc, self.tac_encoding);
            self.update(Backend::Pgw, id, to_payload(&profile)?).await?;
        }
        if function.uses_sgw() {
            let profile = SgwProfile::for_patch(&doc, self.tac_encoding);
            self.update(Backend::Sgw, id, to_payload(&profile)?).await?;
        }

        tracing::info!(id = %id, function = function.as_str(), "Userplane patched");
        Ok(Reply::new())
    }
}
