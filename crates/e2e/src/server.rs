//! Application-under-test process: spawn, health check, stop

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use loginbdd_common::config::ServerConfig;
use loginbdd_common::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a running application process
pub struct AppServer {
    child: Child,
    health_url: String,
    stopped: bool,
}

impl AppServer {
    /// Spawn `config.command` and wait until `base_url` + health path answers
    pub async fn start(config: &ServerConfig, base_url: &str) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| Error::InvalidConfig("server.command must name a program".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args).envs(&config.env);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::inherit());

        info!("Spawning application under test: {}", config.command.join(" "));
        let child = cmd
            .spawn()
            .map_err(|e| Error::Server(format!("Failed to spawn {}: {}", program, e)))?;

        let mut server = AppServer {
            child,
            health_url: health_url(base_url, &config.health_path),
            stopped: false,
        };
        server
            .wait_for_healthy(Duration::from_millis(config.startup_timeout_ms))
            .await?;

        info!("Application is healthy at {}", server.health_url);
        Ok(server)
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    async fn wait_for_healthy(&mut self, limit: Duration) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| Error::Server(e.to_string()))?;

        let start = Instant::now();
        let mut attempts = 0u32;

        while start.elapsed() < limit {
            attempts += 1;

            if let Some(status) = self.child.try_wait()? {
                return Err(Error::Server(format!("process exited during startup with {}", status)));
            }

            match client.get(&self.health_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => warn!("Health check returned {}", resp.status()),
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for application to start...");
                    }
                    // Refused connections are expected until the listener is up
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(POLL_INTERVAL).await;
        }

        Err(Error::Server(format!(
            "{} not healthy after {} attempts",
            self.health_url, attempts
        )))
    }

    /// SIGTERM, short grace period, then kill
    pub fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        info!("Stopping application (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn health_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config(command: &[&str]) -> ServerConfig {
        ServerConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            env: BTreeMap::new(),
            working_dir: None,
            health_path: "/health".into(),
            startup_timeout_ms: 2_000,
        }
    }

    #[test]
    fn test_health_url() {
        assert_eq!(health_url("http://localhost:3000/", "/health"), "http://localhost:3000/health");
        assert_eq!(health_url("http://localhost:3000", "/"), "http://localhost:3000/");
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let err = AppServer::start(&config(&[]), "http://127.0.0.1:1").await.err().unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exited_process_reported() {
        let err = AppServer::start(&config(&["true"]), "http://127.0.0.1:1")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Server(_)));
    }
}
