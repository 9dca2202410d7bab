//! HTTP boundary against a live scheduler loop and an in-process engine.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tdm_cli::server::{self, AppState};
use tdm_core::engine::{EventSink, StartRequest, TransferEngine, TransferHandle};
use tdm_core::scheduler::{Scheduler, SchedulerHandle};
use tdm_core::storage::ArtifactStore;
use tdm_core::EngineStartError;
use tokio_util::sync::CancellationToken;

/// Finishes `magnet:?xt=urn:btih:<HASH>` instantly by writing `<HASH>.bin`;
/// hashes starting with `HOLD` stay active until cancelled.
struct InstantEngine;

struct NoopHandle;

impl TransferHandle for NoopHandle {
    fn cancel(&self) {}
}

impl TransferEngine for InstantEngine {
    fn start(
        &self,
        request: StartRequest,
        events: EventSink,
    ) -> Result<Box<dyn TransferHandle>, EngineStartError> {
        let hash = request
            .locator
            .split("btih:")
            .nth(1)
            .ok_or_else(|| EngineStartError::Malformed(request.locator.clone()))?
            .to_string();
        let name = format!("{}.bin", hash);
        events.ready(&name, Some(hash.len() as u64 * 100));
        if !hash.starts_with("HOLD") {
            let body = hash.repeat(100);
            std::fs::write(request.destination.join(&name), &body)
                .map_err(|e| EngineStartError::Unavailable(e.to_string()))?;
            events.completed(&name, body.len() as u64);
        }
        Ok(Box::new(NoopHandle))
    }
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    shutdown: CancellationToken,
    _dir: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let (scheduler, events) = Scheduler::new(1, Arc::new(InstantEngine), store.root());
        let loop_handle = SchedulerHandle::spawn(scheduler.clone(), events, Duration::from_millis(10));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            server::serve(listener, AppState { scheduler, store }, token).await.unwrap();
            loop_handle.shutdown().await;
        });

        Self {
            base,
            client: reqwest::Client::new(),
            shutdown,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn submit(&self, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url("/api/download"))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn cancel(&self, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .delete(self.url("/api/download"))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn status(&self) -> Vec<Value> {
        self.client
            .get(self.url("/api/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn wait_status(&self, id: &str, status: &str) -> Value {
        for _ in 0..300 {
            let tasks = self.status().await;
            if let Some(task) = tasks.into_iter().find(|t| t["id"] == id) {
                if task["status"] == status {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} never reached {}", id, status);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submit_validates_locator() {
    let srv = TestServer::start().await;

    let (code, body) = srv.submit(json!({ "magnetLink": "" })).await;
    assert_eq!(code, 400);
    assert_eq!(body["error"], "magnet link is required");

    let (code, body) = srv.submit(json!({ "magnetLink": "http://example.com/a.iso" })).await;
    assert_eq!(code, 400);
    assert_eq!(body["error"], "invalid magnet link format");

    let (code, _) = srv.submit(json!({})).await;
    assert_eq!(code, 400);

    assert!(srv.status().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_artifact_is_retrievable() {
    let srv = TestServer::start().await;

    let (code, body) = srv.submit(json!({ "magnetLink": "magnet:?xt=urn:btih:AAA" })).await;
    assert_eq!(code, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Download queued");
    let id = body["taskId"].as_str().unwrap().to_string();

    let task = srv.wait_status(&id, "completed").await;
    assert_eq!(task["progress"], 100);
    assert_eq!(task["fileName"], "AAA.bin");
    assert_eq!(task["fileSize"], 300);
    assert!(task.get("eta").is_none());
    let url = task["downloadUrl"].as_str().unwrap().to_string();
    assert_eq!(url, "/api/files/AAA.bin");

    let resp = srv.client.get(srv.url(&url)).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let headers = resp.headers().clone();
    assert_eq!(headers["content-type"], "application/octet-stream");
    assert_eq!(headers["content-length"], "300");
    assert_eq!(headers["content-disposition"], "attachment; filename=\"AAA.bin\"");
    let bytes = resp.bytes().await.unwrap();
    assert_eq!(bytes.len(), 300);

    let missing = srv.client.get(srv.url("/api/files/nope.bin")).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);
    let partial = srv.client.get(srv.url("/api/files/AAA.bin.part")).send().await.unwrap();
    assert_eq!(partial.status().as_u16(), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_removes_task_and_ignores_unknown_ids() {
    let srv = TestServer::start().await;

    let (_, body) = srv.submit(json!({ "magnetLink": "magnet:?xt=urn:btih:HOLD1" })).await;
    let held = body["taskId"].as_str().unwrap().to_string();
    let (_, body) = srv.submit(json!({ "magnetLink": "magnet:?xt=urn:btih:BBB" })).await;
    let queued = body["taskId"].as_str().unwrap().to_string();

    srv.wait_status(&held, "active").await;
    let tasks = srv.status().await;
    let second = tasks.iter().find(|t| t["id"] == queued.as_str()).unwrap();
    assert_eq!(second["status"], "queued");

    let (code, body) = srv.cancel(json!({ "taskId": held })).await;
    assert_eq!(code, 200);
    assert_eq!(body["success"], true);
    srv.wait_status(&queued, "completed").await;
    assert!(srv.status().await.iter().all(|t| t["id"] != held.as_str()));

    let (code, body) = srv.cancel(json!({ "taskId": "999" })).await;
    assert_eq!(code, 200);
    assert_eq!(body["success"], true);

    let (code, _) = srv.cancel(json!({})).await;
    assert_eq!(code, 400);
    let (code, _) = srv.cancel(json!({ "taskId": "not-a-number" })).await;
    assert_eq!(code, 400);
}
