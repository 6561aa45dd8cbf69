use rocket::serde::json::Json;
use rocket::{get, State};

use std::sync::Arc;

use crate::gateway::{Session, SqliteBackend};
use crate::internal_error::InternalResult;

use super::data::FinanceDashboard;
use super::helpers::load_dashboard;

#[get("/v1/finances/dashboard")]
pub async fn get_dashboard(
    session: Session,
    backend: &State<Arc<SqliteBackend>>,
) -> InternalResult<Json<FinanceDashboard>> {
    Ok(Json(load_dashboard(&backend.gateway(session)).await?))
}
