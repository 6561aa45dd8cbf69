use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{post, State};

use std::sync::Arc;

use crate::gateway::{Session, SqliteBackend};
use crate::internal_error::InternalResult;

use super::data::*;
use super::helpers::*;

#[post("/v1/diary/entries", format = "json", data = "<create_entry_request>")]
pub async fn create_diary_entry(
    session: Session,
    create_entry_request: Json<CreateEntryRequest>,
    backend: &State<Arc<SqliteBackend>>,
) -> InternalResult<status::Custom<Json<DiaryEntry>>> {
    let gateway = backend.gateway(session);

    let entry = create_entry(
        &gateway,
        &create_entry_request.title,
        &create_entry_request.summary,
        &create_entry_request.action_item_texts(),
    )
    .await?;

    Ok(status::Custom(Status::Created, Json(entry)))
}
