use crate::api::{read_userplane, to_payload};
use crate::backend::{Backend, BackendQueryResult, BackendRequest, ControlPlane};
use crate::config::TacEncoding;
use crate::errors::Outcome;
use crate::handler::{Handler, HandlerRequest, Reply};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// `GET /userplanes/{id}`
///
/// Each service must return exactly the requested profile, and both
/// profiles must agree on the TAC before they are merged.
pub struct GetUserplane {
    control_plane: Arc<dyn ControlPlane>,
    tac_encoding: TacEncoding,
}

impl GetUserplane {
    pub fn new(control_plane: Arc<dyn ControlPlane>, tac_encoding: TacEncoding) -> Self {
        Self {
            control_plane,
            tac_encoding,
        }
    }

    async fn find(&self, backend: Backend, id: &str) -> Result<BackendQueryResult, Outcome> {
        let result = self
            .control_plane
            .execute(backend, BackendRequest::find(id))
            .await
            .map_err(|e| {
                tracing::warn!(backend = %backend, id = %id, error = %e, "Lookup failed");
                Outcome::UserplaneNotFound
            })?;

        if result.total_count() != Some(1) {
            tracing::warn!(
                backend = %backend,
                id = %id,
                total_count = ?result.total_count(),
                "Lookup did not return exactly one profile"
            );
            return Err(Outcome::UserplaneNotFound);
        }
        Ok(result)
    }
}

#[async_trait]
impl Handler for GetUserplane {
    fn name(&self) -> &'static str {
        "GetUserplane"
    }

    async fn handle(&self, request: HandlerRequest) -> Result<Reply, Outcome> {
        let id = request.path_id()?;

        let pgw = self.find(Backend::Pgw, id).await?;
        let sgw = self.find(Backend::Sgw, id).await?;

        let (Some(pgw_id), Some(sgw_id)) = (pgw.item_id(0), sgw.item_id(0)) else {
            tracing::warn!(id = %id, "Profile without a readable id");
            return Err(Outcome::UserplaneNotFound);
        };
        if pgw_id != id || sgw_id != id {
            tracing::warn!(
                id = %id,
                pgw_id = %pgw_id,
                sgw_id = %sgw_id,
                "Lookup returned a different profile"
            );
            return Err(Outcome::UserplaneNotFound);
        }

        let (Some(pgw_tac), Some(sgw_tac)) = (pgw.item_tac(0), sgw.item_tac(0)) else {
            tracing::error!(id = %id, "Profile without a readable TAC");
            return Err(Outcome::InternalSoftwareError);
        };
        if pgw_tac != sgw_tac {
            tracing::error!(
                id = %id,
                pgw_tac = %pgw_tac,
                sgw_tac = %sgw_tac,
                "PGW and SGW disagree on TAC"
            );
            return Err(Outcome::InternalSoftwareError);
        }

        let userplane = read_userplane(&pgw, &sgw, 0, self.tac_encoding).map_err(|e| {
            tracing::warn!(id = %id, error = %e, "Unreadable profile");
            Outcome::UserplaneNotFound
        })?;

        match to_payload(&userplane)? {
            Value::Object(reply) => Ok(reply),
            _ => Err(Outcome::InternalSoftwareError),
        }
    }
}
