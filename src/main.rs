mod auth;
mod backup;
mod calc;
mod config;
mod db;
mod ipc;
mod registry;
mod validate;

use std::io::{self, BufRead, Write};

use tracing_subscriber::EnvFilter;

fn init_logging(level: &str) {
    // stdout carries the IPC responses; logs go to stderr.
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() {
    let cfg = match config::AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&cfg.log_level);

    let startup_workspace = cfg.workspace.clone();
    let mut state = ipc::AppState::new(cfg);
    if let Some(path) = startup_workspace {
        // A bad configured workspace must not keep the sidecar from serving.
        if let Err(e) = ipc::select_workspace(&mut state, &path) {
            tracing::warn!(error = ?e, "configured workspace could not be opened");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "submissionsd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed; exiting");
}
