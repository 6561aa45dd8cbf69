//! Agency client portal: client projects, tasks, teams, chat, diary and
//! finances over a row-policy backend, plus the public signup intake.

use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::request::Request;
use rocket::serde::json::Json;
use rocket::{catch, catchers, routes, Build, Rocket};
use tracing::info;

use std::fs;
use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod data;
pub mod diary;
pub mod finances;
pub mod gateway;
pub mod intake;
pub mod internal_error;
pub mod messages;
pub mod profiles;
pub mod projects;
pub mod storage;
pub mod sync;
pub mod tasks;
pub mod teams;

use config::PortalConfig;
use gateway::SqliteBackend;
use intake::helpers::SignupFlow;
use internal_error::{ErrorBody, InternalError};
use storage::{LocalObjectStore, ObjectStore};

fn error_body(status: Status, request: &Request<'_>) -> Json<ErrorBody> {
    let error = match status.code {
        401 => "Please sign in to continue".to_string(),
        404 => format!("Nothing found at {}", request.uri()),
        _ => status.reason_lossy().to_string(),
    };

    Json(ErrorBody { error })
}

#[catch(401)]
fn unauthorized(request: &Request<'_>) -> Json<ErrorBody> {
    error_body(Status::Unauthorized, request)
}

#[catch(404)]
fn not_found(request: &Request<'_>) -> Json<ErrorBody> {
    error_body(Status::NotFound, request)
}

#[catch(default)]
fn default_catcher(status: Status, request: &Request<'_>) -> Json<ErrorBody> {
    error_body(status, request)
}

/// Builds the server from a figment carrying both Rocket's settings and the
/// portal's own keys.
pub fn build(figment: Figment) -> Result<Rocket<Build>, InternalError> {
    let config: PortalConfig = figment.extract()?;

    let backend = SqliteBackend::open(&config.database_path)?;
    fs::create_dir_all(&config.storage_root)?;
    let object_store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
        config.storage_root.clone(),
        &config.public_base_url,
    ));
    let signup = SignupFlow::from_config(&config)?;

    info!(
        database = %config.database_path.display(),
        storage = %config.storage_root.display(),
        staging = %signup.staging.path().display(),
        agency_notifications = config.agency_notify_url.is_some(),
        "starting portal"
    );

    Ok(rocket::custom(figment)
        .manage(backend)
        .manage(object_store)
        .manage(signup)
        .attach(AdHoc::config::<PortalConfig>())
        .mount(
            "/api",
            routes![
                intake::endpoints::client_request,
                intake::endpoints::start_signup,
                intake::endpoints::complete_signup,
                intake::endpoints::approve_request,
                intake::endpoints::upload_logo_file,
                diary::endpoints::create_diary_entry,
                finances::endpoints::get_dashboard,
            ],
        )
        .mount("/storage", FileServer::from(config.storage_root))
        .register("/", catchers![unauthorized, not_found, default_catcher]))
}
