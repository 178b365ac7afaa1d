use crate::api::{read_userplane, to_payload};
use crate::backend::{Backend, BackendQueryResult, BackendRequest, ControlPlane};
use crate::config::TacEncoding;
use crate::errors::Outcome;
use crate::handler::{Handler, HandlerRequest, Reply};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// `GET /userplanes`
///
/// Lists both services and pairs their items by position. Items are not
/// matched by id; both listings are expected to share the same order.
pub struct ListUserplanes {
    control_plane: Arc<dyn ControlPlane>,
    tac_encoding: TacEncoding,
}

impl ListUserplanes {
    pub fn new(control_plane: Arc<dyn ControlPlane>, tac_encoding: TacEncoding) -> Self {
        Self {
            control_plane,
            tac_encoding,
        }
    }

    async fn list(&self, backend: Backend) -> Result<BackendQueryResult, Outcome> {
        self.control_plane
            .execute(backend, BackendRequest::list())
            .await
            .map_err(|e| {
                tracing::warn!(backend = %backend, error = %e, "List failed");
                Outcome::ConnectEpcError
            })
    }
}

fn total_count(backend: Backend, result: &BackendQueryResult) -> Result<usize, Outcome> {
    result
        .total_count()
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(|| {
            tracing::warn!(backend = %backend, "Listing without a valid totalCount");
            Outcome::UserplaneNotFound
        })
}

#[async_trait]
impl Handler for ListUserplanes {
    fn name(&self) -> &'static str {
        "ListUserplanes"
    }

    async fn handle(&self, _request: HandlerRequest) -> Result<Reply, Outcome> {
        let pgw = self.list(Backend::Pgw).await?;
        let sgw = self.list(Backend::Sgw).await?;

        let pgw_count = total_count(Backend::Pgw, &pgw)?;
        let sgw_count = total_count(Backend::Sgw, &sgw)?;
        if pgw_count != sgw_count {
            tracing::error!(
                pgw_count = pgw_count,
                sgw_count = sgw_count,
                "PGW and SGW hold different numbers of profiles"
            );
            return Err(Outcome::InternalSoftwareError);
        }

        let mut userplanes = Vec::new();
        for index in 0..pgw_count {
            let userplane =
                read_userplane(&pgw, &sgw, index, self.tac_encoding).map_err(|e| {
                    tracing::error!(index = index, error = %e, "Unreadable profile in listing");
                    Outcome::InternalSoftwareError
                })?;
            userplanes.push(to_payload(&userplane)?);
        }

        let mut reply = Reply::new();
        reply.insert("userplanes".to_string(), Value::Array(userplanes));
        Ok(reply)
    }
}
