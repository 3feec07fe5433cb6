//! End-to-end job runs against a local axum server emulating the remote API.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tabsync::config::TransportSection;
use tabsync::{run_export, run_import, JobConfig, RunOptions};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceBuilder;

#[derive(Default)]
struct Api {
    records: Vec<Value>,
    deleted: Vec<String>,
    activities: Vec<Value>,
    uploads: Vec<(String, Option<String>, String)>,
}

type Shared = Arc<Mutex<Api>>;

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn list(State(state): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Response {
    if query.contains_key("structure") {
        return Json(json!({
            "data": {
                "email": "string",
                "name": "string",
                "source": "string",
                "synced_at": "integer",
                "creation_date": "timestamp"
            }
        }))
        .into_response();
    }

    let api = state.lock().unwrap();
    let matching: Vec<Value> = api
        .records
        .iter()
        .filter(|record| {
            query.iter().all(|(key, expected)| {
                let Some(field) = key
                    .strip_prefix("filter[")
                    .and_then(|rest| rest.strip_suffix("][eq]"))
                else {
                    return true;
                };
                record.get(field).map(cell).as_deref() == Some(expected.as_str())
            })
        })
        .cloned()
        .collect();

    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let per_page: usize = query.get("per_page").and_then(|p| p.parse().ok()).unwrap_or(2);
    let total_pages = matching.len().div_ceil(per_page).max(1);
    let data: Vec<Value> = matching
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    Json(json!({"page": page, "totalpages": total_pages, "data": data})).into_response()
}

async fn upsert(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut api = state.lock().unwrap();
    let email = body.get("email").cloned();
    match api.records.iter_mut().find(|r| r.get("email").cloned() == email) {
        Some(existing) => *existing = body.clone(),
        None => api.records.push(body.clone()),
    }
    Json(json!({"status": "OK", "data": body})).into_response()
}

async fn remove(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut api = state.lock().unwrap();
    api.records
        .retain(|r| r.get("email").map(cell).as_deref() != Some(id.as_str()));
    api.deleted.push(id);
    Json(json!({"status": "OK"})).into_response()
}

async fn activity(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.lock().unwrap().activities.push(body);
    Json(json!({"status": "OK"})).into_response()
}

async fn upload(
    State(state): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = String::from_utf8_lossy(&body).into_owned();
    state.lock().unwrap().uploads.push((name, auth, body));
    Json(json!({"status": "OK"})).into_response()
}

async fn start_api(records: Vec<Value>) -> anyhow::Result<(String, Shared)> {
    let state: Shared = Arc::new(Mutex::new(Api {
        records,
        ..Api::default()
    }));
    let app = Router::new()
        .route("/v1/contacts", get(list).post(upsert))
        .route("/v1/contacts/:id", delete(remove))
        .route("/v1/activity", post(activity))
        .route("/files/:name", put(upload))
        .layer(ServiceBuilder::new())
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((format!("http://{addr}/v1"), state))
}

fn job(base_url: &str, dir: &std::path::Path) -> JobConfig {
    let yaml = format!(
        r#"
api:
  base_url: {base_url}
  object: contacts
  timeout: 5s
fields:
  - name: email
    type: primary_key
    transforms: [{{ type: trim }}, {{ type: lowercase }}]
  - name: name
import:
  input: {input}
  log_dir: {logs}
export:
  output: {output}
  incremental: false
history:
  path: {history}
"#,
        input = dir.join("contacts.csv").display(),
        logs = dir.join("logs").display(),
        output = dir.join("out").join("contacts.csv").display(),
        history = dir.join("history.json").display(),
    );
    JobConfig::from_yaml(&yaml).unwrap()
}

#[tokio::test]
async fn test_sync_job_imports_and_deletes_missing() {
    let (base_url, state) = start_api(vec![
        json!({"email": "a@x.io", "name": "Old A", "source": "sdk"}),
        json!({"email": "c@x.io", "name": "Gone", "source": "sdk"}),
        json!({"email": "m@x.io", "name": "Manual", "source": "web"}),
    ])
    .await
    .unwrap();
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("contacts.csv"),
        "email,name\n A@X.io ,Ann\nb@x.io,Bob\nb@x.io,Bob again\n",
    )
    .unwrap();

    let report = run_import(&job(&base_url, dir.path()), true, &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.deleted, 1);

    let api = state.lock().unwrap();
    assert_eq!(api.deleted, vec!["c@x.io"]);
    let emails: Vec<String> = api.records.iter().map(|r| cell(&r["email"])).collect();
    assert_eq!(emails, vec!["a@x.io", "m@x.io", "b@x.io"]);
    assert_eq!(api.records[0]["name"], json!("Ann"));
    assert_eq!(api.activities.len(), 1);
    assert_eq!(api.activities[0]["kind"], json!("sync"));

    let logs: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(logs.iter().any(|n| n.starts_with("contacts_success_")));
    assert!(logs.iter().any(|n| n.starts_with("contacts_failure_")));
}

#[tokio::test]
async fn test_dry_run_job_leaves_api_untouched() {
    let (base_url, state) = start_api(vec![json!({"email": "c@x.io", "source": "sdk"})])
        .await
        .unwrap();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("contacts.csv"), "email,name\na@x.io,Ann\n").unwrap();
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };

    let report = run_import(&job(&base_url, dir.path()), true, &options)
        .await
        .unwrap();

    assert_eq!(report.success, 1);
    assert_eq!(report.deleted, 0);
    let api = state.lock().unwrap();
    assert_eq!(api.records.len(), 1);
    assert!(api.deleted.is_empty());
    assert!(api.activities.is_empty());
}

#[tokio::test]
async fn test_incremental_export_job_writes_csv_and_history() {
    let (base_url, _state) = start_api(vec![
        json!({"email": "a@x.io", "name": "Ann", "creation_date": 100}),
        json!({"email": "b@x.io", "name": "Bob", "creation_date": 200}),
        json!({"email": "c@x.io", "name": "Cy", "creation_date": 300}),
    ])
    .await
    .unwrap();
    let dir = TempDir::new().unwrap();
    let job = job(&base_url, dir.path());
    let options = RunOptions {
        incremental: true,
        ..RunOptions::default()
    };

    let report = run_export(&job, &options).await.unwrap();

    assert_eq!(report.written, 3);
    assert_eq!(report.pages, 2);
    let written = std::fs::read_to_string(dir.path().join("out").join("contacts.csv")).unwrap();
    assert_eq!(written, "email,name\na@x.io,Ann\nb@x.io,Bob\nc@x.io,Cy\n");

    let history: HashMap<String, i64> =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("history.json")).unwrap())
            .unwrap();
    assert!(history["contacts.csv"] > 1_600_000_000);
}

#[tokio::test]
async fn test_http_forwarding_uses_transport_token_only() {
    let (base_url, state) = start_api(vec![json!({"email": "a@x.io", "name": "Ann"})])
        .await
        .unwrap();
    let dir = TempDir::new().unwrap();
    let mut job = job(&base_url, dir.path());
    job.transport = Some(TransportSection {
        destination: format!("{}/files", base_url.trim_end_matches("/v1")),
        token: Some("upload-secret".to_string()),
    });
    let options = RunOptions {
        token: Some("api-secret".to_string()),
        ..RunOptions::default()
    };

    let report = run_export(&job, &options).await.unwrap();
    assert_eq!(report.written, 1);

    let api = state.lock().unwrap();
    assert_eq!(api.uploads.len(), 1);
    let (name, auth, body) = &api.uploads[0];
    assert_eq!(name, "contacts.csv");
    assert_eq!(auth.as_deref(), Some("Bearer upload-secret"));
    assert_eq!(body, "email,name\na@x.io,Ann\n");
}
