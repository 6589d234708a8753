//! PostgreSQL fixtures: a throwaway server per test, migrated and empty.
//!
//! `VITRINE_TEST_DATABASE_URL` points the tests at an existing server
//! instead; each test still gets its own freshly created database. When
//! neither is available (no `pg_config` on PATH, or `initdb` refusing to run
//! as root) the test is skipped.
#![allow(dead_code)]

use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::{Instant, sleep};
use uuid::Uuid;

const URL_VAR: &str = "VITRINE_TEST_DATABASE_URL";
const READY_TIMEOUT: Duration = Duration::from_secs(30);
const READY_POLL: Duration = Duration::from_millis(200);

/// A migrated database, plus the server behind it when we started one.
pub struct TestDb {
    pub pool: PgPool,
    _server: Option<EphemeralPg>,
}

/// Start (or reuse) a server, create a fresh database and migrate it.
/// `None` means PostgreSQL is unavailable here and the test should return.
pub async fn test_db() -> Option<TestDb> {
    let (base_url, server) = match std::env::var(URL_VAR) {
        Ok(url) if !url.trim().is_empty() => (url, None),
        _ => match EphemeralPg::start().await {
            Ok(server) => (server.url(), Some(server)),
            Err(reason) => {
                eprintln!("skipping: no PostgreSQL available ({reason})");
                return None;
            }
        },
    };

    let admin = PgPool::connect(&base_url)
        .await
        .expect("connect to test server");
    let name = format!("vitrine_test_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE DATABASE \"{name}\""))
        .execute(&admin)
        .await
        .expect("create test database");
    admin.close().await;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&with_database(&base_url, &name))
        .await
        .expect("connect to test database");
    vitrine_core::migrate::migrate(&pool)
        .await
        .expect("migrate test database");

    Some(TestDb {
        pool,
        _server: server,
    })
}

/// Replace the database path of `url`, keeping any query string.
fn with_database(url: &str, name: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };
    let authority_end = base
        .find("://")
        .map(|i| i + 3)
        .and_then(|start| base[start..].find('/').map(|i| start + i))
        .unwrap_or(base.len());
    let mut out = format!("{}/{name}", &base[..authority_end]);
    if let Some(query) = query {
        out.push('?');
        out.push_str(query);
    }
    out
}

/// A PostgreSQL server in a temp dir, driven through `initdb` / `pg_ctl`.
/// Stopped on drop.
pub struct EphemeralPg {
    bin_dir: PathBuf,
    data_dir: PathBuf,
    port: u16,
    _tempdir: TempDir,
}

impl EphemeralPg {
    pub async fn start() -> Result<Self, String> {
        let output = Command::new("pg_config")
            .arg("--bindir")
            .output()
            .await
            .map_err(|e| format!("pg_config: {e}"))?;
        if !output.status.success() {
            return Err("pg_config --bindir failed".into());
        }
        let bin_dir = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());

        let tempdir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let data_dir = tempdir.path().join("pgdata");
        let port = free_port().map_err(|e| e.to_string())?;

        run(
            Command::new(bin_dir.join("initdb"))
                .arg("-D")
                .arg(&data_dir)
                .args(["-U", "postgres", "--auth=trust", "--no-locale", "--encoding=UTF8"]),
            "initdb",
        )
        .await?;

        let server = Self {
            bin_dir,
            data_dir,
            port,
            _tempdir: tempdir,
        };

        let opts = format!(
            "-p {} -k {} -h localhost",
            server.port,
            server.data_dir.display()
        );
        run(
            Command::new(server.bin_dir.join("pg_ctl"))
                .arg("-D")
                .arg(&server.data_dir)
                .arg("-o")
                .arg(&opts)
                .arg("-l")
                .arg(server.data_dir.join("postgresql.log"))
                .arg("start"),
            "pg_ctl start",
        )
        .await?;

        server.wait_for_ready().await?;
        Ok(server)
    }

    pub fn url(&self) -> String {
        format!("postgresql://postgres@localhost:{}/postgres", self.port)
    }

    async fn wait_for_ready(&self) -> Result<(), String> {
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            let ready = Command::new(self.bin_dir.join("pg_isready"))
                .args(["-h", "localhost", "-p"])
                .arg(self.port.to_string())
                .output()
                .await
                .map_err(|e| format!("pg_isready: {e}"))?;
            if ready.status.success() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(format!("not ready after {READY_TIMEOUT:?}"));
            }
            sleep(READY_POLL).await;
        }
    }
}

impl Drop for EphemeralPg {
    fn drop(&mut self) {
        let _ = std::process::Command::new(self.bin_dir.join("pg_ctl"))
            .arg("-D")
            .arg(&self.data_dir)
            .args(["-m", "immediate", "stop"])
            .output();
    }
}

async fn run(cmd: &mut Command, what: &str) -> Result<(), String> {
    let output = cmd.output().await.map_err(|e| format!("{what}: {e}"))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(format!(
            "{what} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
