use rocket::data::{Data, ToByteUnit};
use rocket::http::ContentType;
use rocket::serde::json::{Json, Value};
use rocket::{post, State};
use rocket_multipart_form_data::{
    MultipartFormData, MultipartFormDataField, MultipartFormDataOptions,
};
use serde_json::json;

use std::sync::Arc;

use crate::auth::AdminToken;
use crate::gateway::{Session, SqliteBackend};
use crate::internal_error::{InternalError, InternalResult};
use crate::storage::ObjectStore;

use super::data::*;
use super::helpers::*;
use super::upload::upload_logo;

const MAX_LOGO_SIZE_KIB: u64 = 5120;

#[post("/client-request", format = "json", data = "<form>")]
pub async fn client_request(
    form: Json<IntakeForm>,
    backend: &State<Arc<SqliteBackend>>,
) -> InternalResult<Json<Value>> {
    let submission = form.into_inner().validate()?;

    submit_client_request(&backend.anonymous(), &submission).await?;

    Ok(Json(json!({})))
}

#[post("/signup", format = "json", data = "<form>")]
pub async fn start_signup(
    form: Json<IntakeForm>,
    signup: &State<SignupFlow>,
) -> InternalResult<Json<Value>> {
    let redirect_to = signup.begin(&form)?;

    Ok(Json(json!({ "redirect_to": redirect_to })))
}

#[post("/signup/finish")]
pub async fn complete_signup(
    session: Session,
    backend: &State<Arc<SqliteBackend>>,
    signup: &State<SignupFlow>,
) -> InternalResult<Json<Value>> {
    let project = signup.finish(&backend.gateway(session)).await?;

    Ok(Json(json!({ "project": project })))
}

#[post(
    "/admin/client-requests/<id>/approve",
    format = "json",
    data = "<approve_request>"
)]
pub async fn approve_request(
    id: &str,
    approve_request: Json<ApproveRequest>,
    _admin: AdminToken,
    backend: &State<Arc<SqliteBackend>>,
) -> InternalResult<Json<ApproveResponse>> {
    let response = approve_client_request(
        &backend.service(),
        id,
        approve_request.into_inner().review_notes,
    )
    .await?;

    Ok(Json(response))
}

#[post("/uploads/logo", data = "<data>")]
pub async fn upload_logo_file(
    content_type: &ContentType,
    data: Data<'_>,
    object_store: &State<Arc<dyn ObjectStore>>,
) -> InternalResult<Json<Value>> {
    let options = MultipartFormDataOptions::with_multipart_form_data_fields(vec![
        MultipartFormDataField::raw("logo").size_limit(MAX_LOGO_SIZE_KIB.kibibytes().as_u64()),
    ]);
    let mut form = MultipartFormData::parse(content_type, data, options).await?;

    let logo = form
        .raw
        .remove("logo")
        .and_then(|mut fields| fields.pop())
        .ok_or_else(|| InternalError::from("Missing logo file"))?;
    let file_name = logo.file_name.unwrap_or_else(|| "logo".to_string());

    let url = upload_logo(object_store.inner().as_ref(), &file_name, logo.raw).await?;

    Ok(Json(json!({ "url": url })))
}
