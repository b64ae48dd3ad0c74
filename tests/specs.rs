// SPDX-License-Identifier: MIT

//! End-to-end scenario tests driving the real `supervisord` binary over its
//! Unix control socket, with `fake-worker` standing in for a user program.
//!
//! Each test gets its own isolated `SUPERVISOR_STATE_DIR`/`SUPERVISOR_IPC_SOCKET`
//! so scenarios never collide, and tears its daemon down at the end.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use assert_cmd::cargo::cargo_bin;
use serde_json::{json, Value};
use sv_wire::{ControlRequest, ControlResponse};
use tokio::net::UnixStream;
use tokio::time::timeout;

struct Daemon {
    child: Child,
    socket_path: PathBuf,
    #[allow(dead_code)]
    state_dir: tempfile::TempDir,
}

impl Daemon {
    fn spawn() -> Self {
        let state_dir = tempfile::tempdir().expect("tempdir");
        let socket_path = state_dir.path().join("supervisor.sock");

        let child = Command::new(cargo_bin("supervisord"))
            .env("SUPERVISOR_STATE_DIR", state_dir.path())
            .env("SUPERVISOR_IPC_SOCKET", &socket_path)
            .env("RUST_LOG", "error")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn supervisord");

        Self { child, socket_path, state_dir }
    }

    async fn connect(&self) -> UnixStream {
        for _ in 0..100 {
            if let Ok(stream) = UnixStream::connect(&self.socket_path).await {
                return stream;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("control socket at {} never became connectable", self.socket_path.display());
    }

    async fn call(&self, cmd: &str, args: Value) -> ControlResponse {
        let mut stream = self.connect().await;
        let req = ControlRequest::new(cmd, args);
        sv_wire::write_frame(&mut stream, &req).await.expect("write request");
        timeout(Duration::from_secs(5), sv_wire::read_frame::<_, ControlResponse>(&mut stream))
            .await
            .expect("response before timeout")
            .expect("well-formed response frame")
    }

    fn pid(&self) -> i32 {
        self.child.id() as i32
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn fake_worker_config(name: &str, extra_env: Value) -> Value {
    let mut env = serde_json::Map::new();
    if let Value::Object(map) = extra_env {
        env.extend(map);
    }
    json!({
        "name": name,
        "script": cargo_bin("fake-worker").to_string_lossy(),
        "instances": 1,
        "env": env,
        "restart": {
            "max_restarts": 2,
            "max_restart_window_ms": 60_000,
            "min_uptime_ms": 0,
        },
        "backoff": {
            "initial_ms": 50,
            "multiplier": 2.0,
            "max_ms": 200,
        },
        "ready_timeout_ms": 5_000,
    })
}

async fn wait_for_overall(daemon: &Daemon, name: &str, want: &str, tries: u32) -> Value {
    for _ in 0..tries {
        let resp = daemon.call("status", json!({"name": name})).await;
        if resp.ok {
            let data = resp.data.unwrap();
            if data["overall"] == want {
                return data;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("app `{name}` never reached overall status `{want}`");
}

#[tokio::test]
async fn start_stop_lifecycle_reaches_running_then_stopped() {
    let daemon = Daemon::spawn();

    let start = daemon.call("start", json!({"config": fake_worker_config("app-a", json!({}))})).await;
    assert!(start.ok, "start failed: {:?}", start.error);

    let running = wait_for_overall(&daemon, "app-a", "running", 50).await;
    assert_eq!(running["workers"].as_array().unwrap().len(), 1);

    let stop = daemon.call("stop", json!({"name": "app-a"})).await;
    assert!(stop.ok, "stop failed: {:?}", stop.error);

    let status = daemon.call("status", json!({"name": "app-a"})).await;
    assert!(status.ok);
    assert_eq!(status.data.unwrap()["overall"], "stopped");
}

#[tokio::test]
async fn crash_looping_worker_exhausts_its_restart_budget() {
    let daemon = Daemon::spawn();

    let start = daemon
        .call("start", json!({"config": fake_worker_config("app-crash", json!({"FAKE_WORKER_CRASH": "1"}))}))
        .await;
    assert!(start.ok, "start failed: {:?}", start.error);

    let errored = wait_for_overall(&daemon, "app-crash", "errored", 100).await;
    let worker = &errored["workers"].as_array().unwrap()[0];
    assert!(worker["restartCount"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn sigterm_drains_workers_and_exits_cleanly() {
    let mut daemon = Daemon::spawn();

    let start = daemon.call("start", json!({"config": fake_worker_config("app-shutdown", json!({}))})).await;
    assert!(start.ok, "start failed: {:?}", start.error);
    wait_for_overall(&daemon, "app-shutdown", "running", 50).await;

    nix::sys::signal::kill(nix::unistd::Pid::from_raw(daemon.pid()), nix::sys::signal::Signal::SIGTERM)
        .expect("send SIGTERM to supervisord");

    // Nothing else in this test needs the runtime, so a blocking wait here
    // is simpler than bouncing the Child through spawn_blocking.
    let exited = daemon.child.wait().expect("wait on supervisord");
    assert!(exited.success(), "supervisord exited non-zero after SIGTERM: {exited:?}");
}
