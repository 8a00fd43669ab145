//! HTTP request handlers and shared application state.

use crate::api::audit::{audit_event, extract_client_ip, mask_email, AuditContext};
use crate::api::auth::{self, AuthConfig, AuthUser};
use crate::api::errors::ApiError;
use crate::api::metrics;
use crate::api::models::*;
use crate::geocoder::{first_match, Geocoder};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use devcamper_core::config;
use devcamper_core::document::{Document, FieldValue, Fields};
use devcamper_core::filter_types::{FilterClause, Projection, SortKey};
use devcamper_core::model::location::GeocodedAddress;
use devcamper_core::model::{bootcamp, course, user, BOOTCAMPS, COURSES, USERS};
use devcamper_core::query::{advanced_results, geo, DocumentStore, Populate, QuerySpec};
use devcamper_core::storage::Database;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// File extensions accepted for bootcamp photos.
const PHOTO_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Where bootcamp photos go and how large they may be.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

/// Shared application state passed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub geocoder: Arc<dyn Geocoder>,
    pub auth: Arc<AuthConfig>,
    pub uploads: UploadConfig,
    pub prometheus_handle: PrometheusHandle,
    pub start_time: Instant,
}

/// Path ids that are not UUIDs cannot name a stored document.
fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::NotFound(format!("{what} not found with id of {raw}")))
}

fn courses_of_bootcamp() -> Populate {
    Populate::Reverse {
        as_field: "courses".into(),
        collection: COURSES.into(),
        foreign_field: "bootcamp".into(),
    }
}

fn bootcamp_of_course() -> Populate {
    Populate::Reference {
        field: "bootcamp".into(),
        collection: BOOTCAMPS.into(),
        select: Projection::include(["name", "description"]),
    }
}

fn audit_ctx(ctx: &Option<Extension<AuditContext>>, headers: &HeaderMap) -> AuditContext {
    match ctx {
        Some(Extension(ctx)) => ctx.clone(),
        None => AuditContext::anonymous(extract_client_ip(headers)),
    }
}

async fn geocode_address(
    geocoder: &dyn Geocoder,
    address: Option<&str>,
) -> Result<Option<GeocodedAddress>, ApiError> {
    let Some(address) = address else {
        return Ok(None);
    };
    let found = first_match(geocoder, address).await?;
    if found.is_none() {
        tracing::warn!(address, "Address could not be geocoded, storing without location");
    }
    Ok(found)
}

// ── Bootcamps ───────────────────────────────────────────────────────

/// `GET /api/v1/bootcamps`
pub async fn get_bootcamps(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListResponse>, ApiError> {
    let spec = QuerySpec::from_pairs(&pairs);
    let page = advanced_results(&state.db, BOOTCAMPS, &spec, &[courses_of_bootcamp()])?;
    metrics::record_query(BOOTCAMPS, "list");
    Ok(Json(page.into()))
}

/// `GET /api/v1/bootcamps/:id`
pub async fn get_bootcamp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse>, ApiError> {
    let id = parse_id(&id, "Bootcamp")?;
    let doc = state
        .db
        .collection(BOOTCAMPS)?
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Bootcamp not found with id of {id}")))?;
    metrics::record_query(BOOTCAMPS, "get");
    Ok(Json(DataResponse::document(&doc)))
}

/// `POST /api/v1/bootcamps`
pub async fn create_bootcamp(
    State(state): State<AppState>,
    audit: Option<Extension<AuditContext>>,
    headers: HeaderMap,
    body: Result<Json<BootcampInput>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse>), ApiError> {
    let Json(input) = body?;
    bootcamp::validate_create(&input)?;
    let location = geocode_address(state.geocoder.as_ref(), input.address.as_deref()).await?;
    let fields = bootcamp::create_fields(input, location.as_ref())?;

    let doc = state.db.collection(BOOTCAMPS)?.insert(Document::new(fields))?;
    metrics::record_write_operation(BOOTCAMPS, "insert");
    let name = doc.fields.get("name").and_then(FieldValue::as_str).unwrap_or("");
    audit_event(
        &audit_ctx(&audit, &headers),
        "create_bootcamp",
        BOOTCAMPS,
        &format!("id={} name={name}", doc.id),
        "success",
    );
    tracing::info!(bootcamp = %doc.id, "Bootcamp created");
    Ok((StatusCode::CREATED, Json(DataResponse::document(&doc))))
}

/// `PUT /api/v1/bootcamps/:id`
pub async fn update_bootcamp(
    State(state): State<AppState>,
    audit: Option<Extension<AuditContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<BootcampInput>, JsonRejection>,
) -> Result<Json<DataResponse>, ApiError> {
    let id = parse_id(&id, "Bootcamp")?;
    let Json(input) = body?;
    let bootcamps = state.db.collection(BOOTCAMPS)?;
    if bootcamps.get(&id).is_none() {
        return Err(ApiError::NotFound(format!("Bootcamp not found with id of {id}")));
    }
    bootcamp::validate_update(&input)?;
    let location = geocode_address(state.geocoder.as_ref(), input.address.as_deref()).await?;
    let changes = bootcamp::update_fields(input, location.as_ref())?;
    let changed: Vec<&str> = changes.keys().map(String::as_str).collect();
    let detail = format!("id={id} fields={}", changed.join(","));

    let doc = bootcamps.update(&id, changes)?;
    metrics::record_write_operation(BOOTCAMPS, "update");
    audit_event(&audit_ctx(&audit, &headers), "update_bootcamp", BOOTCAMPS, &detail, "success");
    Ok(Json(DataResponse::document(&doc)))
}

/// `DELETE /api/v1/bootcamps/:id`
///
/// Courses of the bootcamp are removed with it.
pub async fn delete_bootcamp(
    State(state): State<AppState>,
    audit: Option<Extension<AuditContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DataResponse>, ApiError> {
    let id = parse_id(&id, "Bootcamp")?;
    let bootcamps = state.db.collection(BOOTCAMPS)?;
    if bootcamps.get(&id).is_none() {
        return Err(ApiError::NotFound(format!("Bootcamp not found with id of {id}")));
    }
    let removed_courses = state
        .db
        .collection(COURSES)?
        .delete_many(&FilterClause::eq("bootcamp", id.to_string()))?;
    bootcamps.delete(&id)?;

    metrics::record_write_operation(BOOTCAMPS, "delete");
    audit_event(
        &audit_ctx(&audit, &headers),
        "delete_bootcamp",
        BOOTCAMPS,
        &format!("id={id} courses={removed_courses}"),
        "success",
    );
    tracing::info!(bootcamp = %id, courses = removed_courses, "Bootcamp deleted");
    Ok(Json(DataResponse::empty()))
}

/// `GET /api/v1/bootcamps/radius/:zipcode/:distance`
///
/// Distance is in miles. Not paginated.
pub async fn get_bootcamps_in_radius(
    State(state): State<AppState>,
    Path((zipcode, distance)): Path<(String, String)>,
) -> Result<Json<PlainListResponse>, ApiError> {
    let distance: f64 = distance
        .trim()
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| {
            ApiError::BadRequest(format!("Distance must be a non-negative number, got '{distance}'"))
        })?;

    let origin = first_match(state.geocoder.as_ref(), &zipcode)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No location found for zipcode {zipcode}")))?;

    let filter = FilterClause {
        must: Vec::new(),
        within: Some(geo::within_radius(
            "location.coordinates",
            origin.longitude,
            origin.latitude,
            distance,
        )),
    };
    let docs = state.db.find(BOOTCAMPS, filter).exec()?;
    metrics::record_query(BOOTCAMPS, "radius");
    tracing::debug!(zipcode = %zipcode, distance, found = docs.len(), "radius search");
    Ok(Json(PlainListResponse::new(&docs)))
}

/// `PUT /api/v1/bootcamps/:id/photo`
///
/// Multipart field `file`; images only, at most `uploads.max_bytes`.
pub async fn upload_bootcamp_photo(
    State(state): State<AppState>,
    audit: Option<Extension<AuditContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DataResponse>, ApiError> {
    let id = parse_id(&id, "Bootcamp")?;
    let bootcamps = state.db.collection(BOOTCAMPS)?;
    if bootcamps.get(&id).is_none() {
        return Err(ApiError::NotFound(format!("Bootcamp not found with id of {id}")));
    }
    let mut multipart = multipart.map_err(|_| ApiError::BadRequest("Please upload a file".into()))?;

    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("Malformed upload: {}", e.body_text()))
    };
    let mut field = loop {
        match multipart.next_field().await.map_err(bad_form)? {
            Some(field) if field.name() == Some("file") => break field,
            Some(_) => continue,
            None => return Err(ApiError::BadRequest("Please upload a file".into())),
        }
    };

    let is_image = field
        .content_type()
        .is_some_and(|ct| ct.starts_with("image/"));
    if !is_image {
        return Err(ApiError::BadRequest("Please upload an image file".into()));
    }
    // Served back by extension, so only image extensions are stored.
    let extension = field
        .file_name()
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| PHOTO_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| ApiError::BadRequest("Please upload an image file".into()))?;

    let max = state.uploads.max_bytes;
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(bad_form)? {
        if bytes.len() + chunk.len() > max {
            return Err(ApiError::PayloadTooLarge(format!(
                "Please upload an image less than {max} bytes"
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    let file_name = format!("photo_{id}.{extension}");
    let target = state.uploads.dir.join(&file_name);
    let written = async {
        tokio::fs::create_dir_all(&state.uploads.dir).await?;
        tokio::fs::write(&target, &bytes).await
    };
    written.await.map_err(|e: std::io::Error| {
        tracing::error!("Photo write failed: {}", e);
        ApiError::Internal("Problem with file upload".into())
    })?;

    let mut changes = Fields::new();
    changes.insert("photo".into(), FieldValue::String(file_name.clone()));
    bootcamps.update(&id, changes)?;
    metrics::record_write_operation(BOOTCAMPS, "photo");
    audit_event(
        &audit_ctx(&audit, &headers),
        "upload_photo",
        BOOTCAMPS,
        &format!("id={id} bytes={}", bytes.len()),
        "success",
    );
    Ok(Json(DataResponse {
        success: true,
        data: serde_json::Value::String(file_name),
    }))
}

// ── Courses ─────────────────────────────────────────────────────────

/// `GET /api/v1/courses`
pub async fn get_courses(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListResponse>, ApiError> {
    let spec = QuerySpec::from_pairs(&pairs);
    let page = advanced_results(&state.db, COURSES, &spec, &[bootcamp_of_course()])?;
    metrics::record_query(COURSES, "list");
    Ok(Json(page.into()))
}

/// `GET /api/v1/bootcamps/:id/courses`
pub async fn get_bootcamp_courses(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlainListResponse>, ApiError> {
    let id = parse_id(&id, "Bootcamp")?;
    let docs = state
        .db
        .find(COURSES, FilterClause::eq("bootcamp", id.to_string()))
        .sort(vec![SortKey::asc(config::CREATED_AT_FIELD)])
        .exec()?;
    metrics::record_query(COURSES, "list");
    Ok(Json(PlainListResponse::new(&docs)))
}

/// `GET /api/v1/courses/:id`
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse>, ApiError> {
    let id = parse_id(&id, "Course")?;
    let doc = state
        .db
        .find(COURSES, FilterClause::eq(config::ID_FIELD, id.to_string()))
        .populate(bootcamp_of_course())
        .limit(1)
        .exec()?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound(format!("No course with the id of {id}")))?;
    metrics::record_query(COURSES, "get");
    Ok(Json(DataResponse::document(&doc)))
}

/// Recompute the owning bootcamp's average cost after a course change.
fn refresh_average_cost(db: &Database, course: &Document) -> Result<(), ApiError> {
    let bootcamp = course
        .fields
        .get("bootcamp")
        .and_then(FieldValue::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok());
    if let Some(bootcamp) = bootcamp {
        course::update_average_cost(db, &bootcamp)?;
    }
    Ok(())
}

/// `POST /api/v1/bootcamps/:id/courses`
pub async fn add_course(
    State(state): State<AppState>,
    audit: Option<Extension<AuditContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<CourseInput>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse>), ApiError> {
    let bootcamp_id = parse_id(&id, "Bootcamp")?;
    let Json(input) = body?;
    if state.db.collection(BOOTCAMPS)?.get(&bootcamp_id).is_none() {
        return Err(ApiError::NotFound(format!(
            "No bootcamp with the id of {bootcamp_id}"
        )));
    }
    let fields = course::create_fields(input, bootcamp_id)?;
    let doc = state.db.collection(COURSES)?.insert(Document::new(fields))?;
    refresh_average_cost(&state.db, &doc)?;

    metrics::record_write_operation(COURSES, "insert");
    audit_event(
        &audit_ctx(&audit, &headers),
        "add_course",
        COURSES,
        &format!("id={} bootcamp={bootcamp_id}", doc.id),
        "success",
    );
    Ok((StatusCode::CREATED, Json(DataResponse::document(&doc))))
}

/// `PUT /api/v1/courses/:id`
pub async fn update_course(
    State(state): State<AppState>,
    audit: Option<Extension<AuditContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<CourseInput>, JsonRejection>,
) -> Result<Json<DataResponse>, ApiError> {
    let id = parse_id(&id, "Course")?;
    let Json(input) = body?;
    let courses = state.db.collection(COURSES)?;
    if courses.get(&id).is_none() {
        return Err(ApiError::NotFound(format!("No course with the id of {id}")));
    }
    let changes = course::update_fields(input)?;
    let doc = courses.update(&id, changes)?;
    refresh_average_cost(&state.db, &doc)?;

    metrics::record_write_operation(COURSES, "update");
    audit_event(
        &audit_ctx(&audit, &headers),
        "update_course",
        COURSES,
        &format!("id={id}"),
        "success",
    );
    Ok(Json(DataResponse::document(&doc)))
}

/// `DELETE /api/v1/courses/:id`
pub async fn delete_course(
    State(state): State<AppState>,
    audit: Option<Extension<AuditContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DataResponse>, ApiError> {
    let id = parse_id(&id, "Course")?;
    let courses = state.db.collection(COURSES)?;
    if courses.get(&id).is_none() {
        return Err(ApiError::NotFound(format!("No course with the id of {id}")));
    }
    let removed = courses.delete(&id)?;
    refresh_average_cost(&state.db, &removed)?;

    metrics::record_write_operation(COURSES, "delete");
    audit_event(
        &audit_ctx(&audit, &headers),
        "delete_course",
        COURSES,
        &format!("id={id}"),
        "success",
    );
    Ok(Json(DataResponse::empty()))
}

// ── Auth ────────────────────────────────────────────────────────────

fn token_response(
    auth: &AuthConfig,
    user_id: Uuid,
) -> Result<impl IntoResponse, ApiError> {
    let token = auth.issue_token(user_id).map_err(|e| {
        tracing::error!("Token signing failed: {}", e);
        ApiError::Internal("Server Error".into())
    })?;
    let cookie = auth.cookie(&token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse {
            success: true,
            token,
        }),
    ))
}

/// `POST /api/v1/auth/register`
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = body?;
    user::validate_registration(&input)?;
    let password = input.password.clone().unwrap_or_default();
    let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Hashing task failed: {e}")))?
        .map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            ApiError::Internal("Server Error".into())
        })?;

    let email = input.email.clone().unwrap_or_default().to_lowercase();
    let fields = user::create_fields(input, hash)?;
    let ctx = AuditContext::anonymous(extract_client_ip(&headers));
    let doc = match state.db.collection(USERS)?.insert(Document::new(fields)) {
        Ok(doc) => doc,
        Err(e) => {
            audit_event(&ctx, "register", USERS, &mask_email(&email), "failure");
            return Err(e.into());
        }
    };
    metrics::record_write_operation(USERS, "insert");
    audit_event(&ctx, "register", USERS, &mask_email(&email), "success");
    token_response(&state.auth, doc.id)
}

/// `POST /api/v1/auth/login`
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(ApiError::BadRequest(
            "Please provide an email and password".into(),
        ));
    };
    let email = email.trim().to_lowercase();
    let ctx = AuditContext::anonymous(extract_client_ip(&headers));

    let found = state
        .db
        .collection(USERS)?
        .find_one(&FilterClause::eq("email", email.clone()));
    let verified = match &found {
        Some(doc) => {
            let stored = user::password_hash_of(doc).unwrap_or_default().to_string();
            tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored))
                .await
                .map_err(|e| ApiError::Internal(format!("Verify task failed: {e}")))?
        }
        None => false,
    };
    match found {
        Some(doc) if verified => {
            audit_event(&ctx, "login", USERS, &mask_email(&email), "success");
            token_response(&state.auth, doc.id)
        }
        _ => {
            audit_event(&ctx, "login", USERS, &mask_email(&email), "failure");
            Err(ApiError::Unauthorized("Invalid credentials".into()))
        }
    }
}

/// `GET /api/v1/auth/me`
pub async fn get_me(
    State(state): State<AppState>,
    Extension(current): Extension<AuthUser>,
) -> Result<Json<DataResponse>, ApiError> {
    let doc = state
        .db
        .collection(USERS)?
        .get(&current.id)
        .ok_or_else(|| ApiError::NotFound(format!("User not found with id of {}", current.id)))?;
    Ok(Json(DataResponse::document(
        &user::public_projection().apply(&doc),
    )))
}

// ── Operations ──────────────────────────────────────────────────────

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let collections = state.db.collections.read();
    let collections_count = collections.len();
    let total_documents: usize = collections.values().map(|c| c.document_count()).sum();
    drop(collections);

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        collections_count,
        total_documents,
        wal_size_bytes: state.db.wal().map(|w| w.size_bytes()).unwrap_or(0),
    })
}

/// `GET /metrics`
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    metrics::update_collection_metrics(&state.db);
    metrics::update_wal_metrics(&state.db);
    state.prometheus_handle.render()
}
