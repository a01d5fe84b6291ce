//! HTTP surface for dataset upload and conversion and the GPS registry.
//!
//! Every failure is answered with a JSON body `{ "error", "kind" }` and a
//! status code derived from the error kind; handlers never panic on bad
//! input.

use crate::config::WorkbenchConfig;
use crate::constants::GPS_CSV_FILE_NAME;
use crate::converter::Converter;
use crate::error::{ErrorKind, Result, WorkbenchError};
use crate::gps::PointRegistry;
use crate::gps::map::{LeafletRenderer, MapRenderer};
use crate::preview::clamp_limit;
use crate::storage::UploadStore;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared state handed to every handler
pub struct AppState {
    pub config: WorkbenchConfig,
    pub converter: Converter,
    pub registry: PointRegistry,
    pub renderer: Box<dyn MapRenderer>,
}

impl AppState {
    /// State for `config`, with the upload directory created
    pub async fn open(config: WorkbenchConfig) -> Result<Self> {
        let store = UploadStore::open(&config.upload_dir).await?;
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: WorkbenchConfig, store: UploadStore) -> Self {
        Self {
            converter: Converter::new(store),
            registry: PointRegistry::new(config.id_policy),
            renderer: Box::new(LeafletRenderer::new(config.map.clone())),
            config,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/upload_dataset", post(upload_dataset))
        .route("/convert_dataset", post(convert_dataset))
        .route("/add_gps_point", post(add_gps_point))
        .route("/delete_gps_point", post(delete_gps_point))
        .route("/gps_data", get(gps_data))
        .route("/download_gps", get(download_gps))
        .route("/gps_map", get(gps_map))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn serve(config: WorkbenchConfig) -> Result<()> {
    config.validate()?;
    let addr = config.bind_addr()?;

    let state = Arc::new(AppState::open(config).await?);
    let upload_dir = state.converter.store().root().display().to_string();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "Serving on http://{} (uploads in {})",
        listener.local_addr()?,
        upload_dir
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Dataset workbench</title></head>
<body>
<h1>Dataset workbench</h1>
<h2>Datasets</h2>
<form action="/upload_dataset" method="post" enctype="multipart/form-data">
<input type="file" name="file"> <button type="submit">Upload</button>
</form>
<h2>GPS points</h2>
<ul>
<li><a href="/gps_data">Listing (JSON)</a></li>
<li><a href="/download_gps">Download CSV</a></li>
<li><a href="/gps_map">Map</a></li>
</ul>
</body>
</html>
"#;

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    rows: Option<i64>,
}

async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<UploadQuery>, QueryRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return error_response(WorkbenchError::InvalidRequest {
                reason: rejection.body_text(),
            });
        }
    };
    // Not a multipart body at all, so there is no file part
    let Ok(mut multipart) = multipart else {
        return error_response(WorkbenchError::NoFileProvided);
    };

    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => break field,
            Ok(Some(_)) => continue,
            Ok(None) => return error_response(WorkbenchError::NoFileProvided),
            Err(e) => {
                return error_response(WorkbenchError::InvalidRequest {
                    reason: e.body_text(),
                });
            }
        }
    };

    let file_name = field.file_name().unwrap_or_default().to_string();
    if let Err(e) = crate::converter::check_upload_name(&file_name) {
        return error_response(e);
    }

    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(WorkbenchError::InvalidRequest {
                reason: e.body_text(),
            });
        }
    };

    let config = &state.config;
    let rows = clamp_limit(query.rows, config.preview_rows, config.max_preview_rows);
    match state.converter.ingest(&file_name, bytes.to_vec(), rows).await {
        Ok(uploaded) => Json(uploaded).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct ConvertForm {
    file_path: Option<String>,
    output_format: Option<String>,
    input_format: Option<String>,
}

async fn convert_dataset(
    State(state): State<Arc<AppState>>,
    form: std::result::Result<Form<ConvertForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            return error_response(WorkbenchError::InvalidRequest {
                reason: rejection.body_text(),
            });
        }
    };

    let Some(file_path) = form.file_path.filter(|path| !path.trim().is_empty()) else {
        return error_response(WorkbenchError::NoFileProvided);
    };
    let output_format = form.output_format.unwrap_or_default();

    let converted = match state
        .converter
        .convert(&file_path, form.input_format.as_deref(), &output_format)
        .await
    {
        Ok(converted) => converted,
        Err(e) => return error_response(e),
    };

    let disposition = format!("attachment; filename=\"{}\"", converted.file_name());
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(converted.mime_type())),
            (header::CONTENT_DISPOSITION, attachment_header(&disposition)),
        ],
        converted.bytes,
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AddPointRequest {
    latitude: Option<Value>,
    longitude: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ListingResponse<'a> {
    message: &'static str,
    data: &'a [crate::models::GeoPoint],
}

async fn add_gps_point(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<AddPointRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(WorkbenchError::invalid_coordinates(rejection.body_text()));
        }
    };

    let latitude = request.latitude.as_ref().and_then(Value::as_f64);
    let longitude = request.longitude.as_ref().and_then(Value::as_f64);

    match state.registry.add(latitude, longitude).await {
        Ok((_, listing)) => Json(ListingResponse {
            message: "GPS point added",
            data: &listing,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeletePointRequest {
    id: Option<Value>,
}

async fn delete_gps_point(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<DeletePointRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(WorkbenchError::InvalidRequest {
                reason: rejection.body_text(),
            });
        }
    };

    // An ID no point can carry matches nothing
    let listing = match request.id.as_ref().and_then(point_id) {
        Some(id) => state.registry.delete(id).await,
        None => {
            debug!("Delete request without a usable ID: {:?}", request.id);
            state.registry.list().await
        }
    };

    Json(ListingResponse {
        message: "GPS point deleted",
        data: &listing,
    })
    .into_response()
}

/// Point IDs arrive as JSON numbers; `1.0` names the same point as `1`
fn point_id(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64)
            .map(|v| v as u64)
    })
}

async fn gps_data(State(state): State<Arc<AppState>>) -> Response {
    let listing = state.registry.list().await;
    Json(listing.as_slice()).into_response()
}

async fn download_gps(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.export_csv().await {
        Ok(csv) => {
            let disposition = format!("attachment; filename=\"{GPS_CSV_FILE_NAME}\"");
            (
                [
                    (
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("text/csv; charset=utf-8"),
                    ),
                    (header::CONTENT_DISPOSITION, attachment_header(&disposition)),
                ],
                csv,
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn gps_map(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.render_map(state.renderer.as_ref()).await {
        Ok(artifact) => Html(artifact.html).into_response(),
        Err(e) => error_response(e),
    }
}

/// Download names are fixed ASCII, so the header value is always valid
fn attachment_header(disposition: &str) -> HeaderValue {
    HeaderValue::from_str(disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: ErrorKind,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NoFileProvided
        | ErrorKind::EmptyFilename
        | ErrorKind::FormatResolutionError
        | ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::MalformedInput
        | ErrorKind::EmptyInput
        | ErrorKind::InvalidCoordinates
        | ErrorKind::WriteFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Configuration | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: WorkbenchError) -> Response {
    let kind = err.kind();
    let status = status_for(kind);
    if err.is_client_error() {
        debug!("Request rejected ({:?}): {}", kind, err);
    } else {
        warn!("Request failed ({:?}): {}", kind, err);
    }

    let body = ErrorBody {
        error: err.to_string(),
        kind,
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id() {
        assert_eq!(point_id(&json!(3)), Some(3));
        assert_eq!(point_id(&json!(3.0)), Some(3));
        assert_eq!(point_id(&json!(3.5)), None);
        assert_eq!(point_id(&json!(-1)), None);
        assert_eq!(point_id(&json!("3")), None);
    }

    #[test]
    fn test_status_for_kinds() {
        assert_eq!(status_for(ErrorKind::NoFileProvided), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::UnsupportedFormat),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status_for(ErrorKind::InvalidCoordinates),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
