//! Integration tests for the HTTP surface
//!
//! Requests go straight into the axum router with `oneshot`, so no socket
//! is bound. Each test gets its own upload directory and GPS registry.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use dataset_workbench::server::{AppState, router};
use dataset_workbench::{DataFormat, WorkbenchConfig, loader};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "dataset-workbench-test-boundary";

const STATIONS_CSV: &str = "\
src_id,station_name,latitude,longitude
19144,LONDON WEATHER CENTRE,51.5074,-0.1278
838,HEATHROW,51.479,-0.449
1395,LERWICK,60.139,-1.183
";

async fn test_app() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let config = WorkbenchConfig::default().with_upload_dir(dir.path().join("uploads"));
    let state = AppState::open(config).await.unwrap();
    (dir, router(Arc::new(state)))
}

fn multipart_upload(uri: &str, field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn form_post(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

fn json_post(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz() {
    let (_dir, app) = test_app().await;
    let (status, body) = send_json(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_upload_then_convert() {
    let (_dir, app) = test_app().await;

    let (status, body) = send_json(
        &app,
        multipart_upload("/upload_dataset", "file", "stations.csv", STATIONS_CSV.as_bytes()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["columns"],
        json!(["src_id", "station_name", "latitude", "longitude"])
    );
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"][1]["station_name"], json!("HEATHROW"));

    let file_path = body["file_path"].as_str().unwrap().to_string();
    let (status, headers, bytes) = send(
        &app,
        form_post(
            "/convert_dataset",
            &format!("file_path={file_path}&output_format=xlsx"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"converted_dataset.xlsx\""
    );
    let table = loader::load(&bytes, DataFormat::Xlsx).unwrap();
    assert_eq!(table.height(), 3);
    assert_eq!(
        table.column_names(),
        vec!["src_id", "station_name", "latitude", "longitude"]
    );
}

#[tokio::test]
async fn test_upload_preview_rows_query() {
    let (_dir, app) = test_app().await;
    let (status, body) = send_json(
        &app,
        multipart_upload("/upload_dataset?rows=1", "file", "stations.csv", STATIONS_CSV.as_bytes()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_rejections() {
    let (dir, app) = test_app().await;

    let (status, body) = send_json(
        &app,
        multipart_upload("/upload_dataset", "file", "payload.exe", b"MZ\x90\x00"),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        body,
        json!({ "error": "File type not allowed", "kind": "UnsupportedFormat" })
    );
    assert!(!dir.path().join("uploads").join("payload.exe").exists());

    let (status, body) = send_json(
        &app,
        multipart_upload("/upload_dataset", "attachment", "stations.csv", b"a\n1\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("NoFileProvided"));
    assert_eq!(body["error"], json!("No file part"));

    let (status, body) = send_json(
        &app,
        multipart_upload("/upload_dataset", "file", "", b"a\n1\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("No selected file"));

    let (status, body) = send_json(
        &app,
        multipart_upload("/upload_dataset", "file", "ragged.csv", b"a,b\n1,2\n3,4,5\n"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], json!("MalformedInput"));

    // Bodies that are not multipart carry no file part
    let (status, body) = send_json(&app, form_post("/upload_dataset", "file=stations.csv")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "No file part", "kind": "NoFileProvided" })
    );

    let empty = Request::builder()
        .method("POST")
        .uri("/upload_dataset")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&app, empty).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("NoFileProvided"));

    let (status, body) = send_json(
        &app,
        multipart_upload(
            "/upload_dataset?rows=abc",
            "file",
            "stations.csv",
            STATIONS_CSV.as_bytes(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("BadRequest"));
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
}

#[tokio::test]
async fn test_convert_errors() {
    let (_dir, app) = test_app().await;
    send(
        &app,
        multipart_upload("/upload_dataset", "file", "stations.csv", STATIONS_CSV.as_bytes()),
    )
    .await;

    let (status, body) = send_json(
        &app,
        form_post("/convert_dataset", "file_path=stations.csv&output_format=pdf"),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], json!("Unsupported format"));

    let (status, body) = send_json(
        &app,
        form_post("/convert_dataset", "file_path=missing.csv&output_format=csv"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], json!("NotFound"));

    let (status, body) = send_json(
        &app,
        form_post("/convert_dataset", "file_path=stations&output_format=csv"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("FormatResolutionError"));
}

#[tokio::test]
async fn test_gps_walkthrough() {
    let (_dir, app) = test_app().await;

    let (status, body) = send_json(
        &app,
        json_post("/add_gps_point", json!({ "latitude": 51.5072, "longitude": -0.1276 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("GPS point added"));
    assert_eq!(
        body["data"],
        json!([{ "ID": 1, "Latitude": 51.5072, "Longitude": -0.1276 }])
    );

    send(
        &app,
        json_post("/add_gps_point", json!({ "latitude": 40.7128, "longitude": -74.0060 })),
    )
    .await;

    let (status, body) = send_json(&app, json_post("/delete_gps_point", json!({ "id": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("GPS point deleted"));
    assert_eq!(
        body["data"],
        json!([{ "ID": 2, "Latitude": 40.7128, "Longitude": -74.006 }])
    );

    let (status, body) = send_json(&app, get("/gps_data")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{ "ID": 2, "Latitude": 40.7128, "Longitude": -74.006 }])
    );

    let (status, headers, csv) = send(&app, get("/download_gps")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"gps_data.csv\""
    );
    assert_eq!(
        String::from_utf8(csv).unwrap(),
        "ID,Latitude,Longitude\n2,40.71280000000,-74.00600000000\n"
    );

    let (status, headers, html) = send(&app, get("/gps_map")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let html = String::from_utf8(html).unwrap();
    assert!(html.contains("\"label\":\"ID: 2\""));
    assert!(!html.contains("\"label\":\"ID: 1\""));
}

#[tokio::test]
async fn test_gps_invalid_points() {
    let (_dir, app) = test_app().await;

    for payload in [
        json!({ "latitude": 51.5 }),
        json!({ "latitude": "north", "longitude": 0.0 }),
        json!({ "latitude": null, "longitude": 0.0 }),
        json!({ "latitude": 123.0, "longitude": 0.0 }),
    ] {
        let (status, body) = send_json(&app, json_post("/add_gps_point", payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], json!("InvalidCoordinates"));
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid GPS coordinates"));
    }

    let (_, body) = send_json(&app, get("/gps_data")).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_delete_unknown_id_is_noop() {
    let (_dir, app) = test_app().await;
    send(
        &app,
        json_post("/add_gps_point", json!({ "latitude": 1.0, "longitude": 2.0 })),
    )
    .await;

    for payload in [json!({ "id": 99 }), json!({ "id": "1" }), json!({})] {
        let (status, body) = send_json(&app, json_post("/delete_gps_point", payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_empty_registry_exports() {
    let (_dir, app) = test_app().await;

    let (_, _, csv) = send(&app, get("/download_gps")).await;
    assert_eq!(String::from_utf8(csv).unwrap(), "ID,Latitude,Longitude\n");

    let (status, _, html) = send(&app, get("/gps_map")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(html).unwrap();
    assert!(html.contains("setView([0.0,0.0], 2)"));
    assert!(html.contains("var markers = [];"));
}
