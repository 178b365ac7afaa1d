use crate::backend::{Backend, BackendRequest, ControlPlane};
use crate::errors::Outcome;
use crate::handler::{Handler, HandlerRequest, Reply};
use async_trait::async_trait;
use std::sync::Arc;

/// `DELETE /userplanes/{id}`
///
/// Deletes the PGW profile, then the SGW profile. A PGW deletion is not
/// undone when the SGW deletion fails.
pub struct DeleteUserplane {
    control_plane: Arc<dyn ControlPlane>,
}

impl DeleteUserplane {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    async fn remove(&self, backend: Backend, id: &str) -> Result<(), Outcome> {
        let result = self
            .control_plane
            .execute(backend, BackendRequest::remove(id))
            .await
            .map_err(|e| {
                tracing::warn!(backend = %backend, id = %id, error = %e, "Delete failed");
                Outcome::UserplaneNotFound
            })?;

        if !result.success {
            tracing::warn!(backend = %backend, id = %id, "Backend refused delete");
            return Err(Outcome::UserplaneNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for DeleteUserplane {
    fn name(&self) -> &'static str {
        "DeleteUserplane"
    }

    async fn handle(&self, request: HandlerRequest) -> Result<Reply, Outcome> {
        let id = request.path_id()?;

        self.remove(Backend::Pgw, id).await?;
        if let Err(outcome) = self.remove(Backend::Sgw, id).await {
            tracing::error!(id = %id, "SGW profile left behind after PGW profile was deleted");
            return Err(outcome);
        }

        tracing::info!(id = %id, "Userplane deleted");
        Ok(Reply::new())
    }
}
