//! Handlers for the `/userplanes` resource.
//!
//! Each operation talks to the PGW profile service first and the SGW profile
//! service second, then reconciles both replies into one answer.

mod add;
mod delete;
mod get;
mod list;
mod patch;

pub use add::AddUserplane;
pub use delete::DeleteUserplane;
pub use get::GetUserplane;
pub use list::ListUserplanes;
pub use patch::PatchUserplane;

use crate::backend::{BackendQueryResult, ControlPlane};
use crate::config::TacEncoding;
use crate::dispatcher::{Dispatcher, ID_PLACEHOLDER};
use crate::errors::Outcome;
use crate::mapper::{self, MapperError, PgwRecord, SgwRecord, Userplane};
use hyper::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub const RESOURCE: &str = "userplanes";

/// Builds the dispatcher serving the userplane resource below `base_uri`.
pub fn userplanes_dispatcher(
    base_uri: &str,
    control_plane: Arc<dyn ControlPlane>,
    tac_encoding: TacEncoding,
) -> Dispatcher {
    let item = format!("{RESOURCE}/{ID_PLACEHOLDER}");

    let mut dispatcher = Dispatcher::new(base_uri);
    dispatcher
        .register(
            Method::GET,
            RESOURCE,
            Arc::new(ListUserplanes::new(control_plane.clone(), tac_encoding)),
        )
        .register(
            Method::POST,
            RESOURCE,
            Arc::new(AddUserplane::new(control_plane.clone(), tac_encoding)),
        )
        .register(
            Method::GET,
            &item,
            Arc::new(GetUserplane::new(control_plane.clone(), tac_encoding)),
        )
        .register(
            Method::PATCH,
            &item,
            Arc::new(PatchUserplane::new(control_plane.clone(), tac_encoding)),
        )
        .register(
            Method::DELETE,
            &item,
            Arc::new(DeleteUserplane::new(control_plane)),
        )
        .require_json(Method::POST);
    dispatcher
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, Outcome> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize payload");
        Outcome::InternalSoftwareError
    })
}

/// Reads item `index` of both listings and merges them into one document.
fn read_userplane(
    pgw: &BackendQueryResult,
    sgw: &BackendQueryResult,
    index: usize,
    tac_encoding: TacEncoding,
) -> Result<Userplane, MapperError> {
    let pgw_item = pgw.item(index).ok_or(MapperError::MissingField("items"))?;
    let sgw_item = sgw.item(index).ok_or(MapperError::MissingField("items"))?;

    let pgw_record = PgwRecord::from_item(pgw_item, tac_encoding)?;
    let sgw_record = SgwRecord::from_item(sgw_item)?;

    Ok(mapper::merge(pgw_record, sgw_record))
}
