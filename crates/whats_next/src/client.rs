//! The short-lived requester an agent runs to fetch its next instruction.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::StatusCode;
use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::compose::rewrite_program_name;

pub const SERVER_BUSY: &str =
    "the server is busy, please `sleep 10` and try again. This retry could be repeated up to 10 times";

const PROBE_TIMEOUT: Duration = Duration::from_millis(10);
const READY_ATTEMPTS: usize = 10;
const READY_INTERVAL: Duration = Duration::from_secs(10);

pub const HINTS: [&str; 10] = [
    "User is typing...",
    "User is thinking...",
    "User is checking the code...",
    "User is debugging...",
    "User is reviewing the code...",
    "User is reading the doc...",
    "User is building the project...",
    "User is running the tests...",
    "User is fixing the tests...",
    "User is updating the CHANGELOG...",
];

#[derive(Debug, Error)]
pub enum ClientError {
    /// Nothing listens on the port; the agent should wait and retry.
    #[error("{}", SERVER_BUSY)]
    Busy,

    #[error("failed to connect to server (is it running?): {source}\nStart server with: {program} serve")]
    Connect {
        program: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server returned status: {0}")]
    Status(u16),

    #[error("failed to read response: {0}")]
    Read(#[source] reqwest::Error),

    #[error("failed to build request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to create HTTP client: {0}")]
    Http(#[source] reqwest::Error),
}

/// One follow-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpRequest {
    pub addr: SocketAddr,
    pub working_dir: PathBuf,
    /// Name the agent invoked us by; backquoted mentions in the reply use it.
    pub program_name: String,
}

impl FollowUpRequest {
    pub fn new(addr: SocketAddr, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            addr,
            working_dir: working_dir.into(),
            program_name: program_name(),
        }
    }

    pub fn with_program_name(mut self, program_name: impl Into<String>) -> Self {
        self.program_name = program_name.into();
        self
    }

    pub fn url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("http://{}/", self.addr))?;
        url.query_pairs_mut()
            .append_pair("workingDir", &self.working_dir.to_string_lossy())
            .append_pair("programName", &self.program_name);
        Ok(url)
    }
}

/// Basename of `argv[0]`, or `whats_next` when it is unavailable.
#[must_use]
pub fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "whats_next".to_string())
}

/// A TCP connect that succeeds within a few milliseconds.
pub async fn is_reachable(addr: SocketAddr) -> bool {
    matches!(timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

/// Waits for a broker that is still starting, printing progress lines.
pub async fn wait_until_ready(addr: SocketAddr) -> bool {
    if is_reachable(addr).await {
        return true;
    }
    for _ in 0..READY_ATTEMPTS {
        print_status("waiting for server to be ready...");
        sleep(READY_INTERVAL).await;
        if is_reachable(addr).await {
            return true;
        }
    }
    false
}

/// Issues the request and returns the raw body of a 200 reply.
pub async fn fetch_follow_up(
    http: &reqwest::Client,
    request: &FollowUpRequest,
) -> Result<String, ClientError> {
    let response = match http.get(request.url()?).send().await {
        Ok(response) => response,
        Err(source) => {
            if !is_reachable(request.addr).await {
                return Err(ClientError::Busy);
            }
            return Err(ClientError::Connect {
                program: request.program_name.clone(),
                source,
            });
        }
    };

    let status = response.status();
    if status != StatusCode::OK {
        return Err(ClientError::Status(status.as_u16()));
    }
    response.text().await.map_err(ClientError::Read)
}

/// Full client flow: wait for the broker, show activity hints, fetch and rewrite the reply.
pub async fn run(request: &FollowUpRequest) -> Result<String, ClientError> {
    let pid = process::id();
    info!(
        dir = %request.working_dir.display(),
        addr = %request.addr,
        pid,
        "client request"
    );

    let started = Instant::now();
    wait_until_ready(request.addr).await;

    let http = reqwest::Client::builder()
        .build()
        .map_err(ClientError::Http)?;
    let done = CancellationToken::new();
    let hints = spawn_hints(done.clone());
    let result = fetch_follow_up(&http, request).await;
    done.cancel();
    let _ = hints.await;

    let reply = match result {
        Ok(reply) => reply,
        Err(error) => {
            warn!(target: "whats_next::stderr", "{error}");
            return Err(error);
        }
    };
    info!(
        dir = %request.working_dir.display(),
        addr = %request.addr,
        pid,
        wait = ?started.elapsed(),
        len = reply.len(),
        "client reply"
    );
    info!(target: "whats_next::stdout", "{reply}");

    Ok(rewrite_program_name(&reply, &request.program_name))
}

fn spawn_hints(done: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = Duration::from_secs(rand::thread_rng().gen_range(5..30));
            tokio::select! {
                () = done.cancelled() => {
                    print_status("User done thinking.");
                    return;
                }
                () = sleep(wait) => print_status(random_hint()),
            }
        }
    })
}

fn random_hint() -> &'static str {
    HINTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(HINTS[0])
}

fn print_status(message: &str) {
    println!("{}", timestamped(local_now(), message));
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `[2024-05-01T09:30:00] message`
#[must_use]
pub fn timestamped(at: OffsetDateTime, message: &str) -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let stamp = at.format(format).unwrap_or_default();
    format!("[{stamp}] {message}")
}

/// Asks a running broker to shut down.
pub async fn kill_server(addr: SocketAddr) -> anyhow::Result<()> {
    let url = Url::parse(&format!("http://{addr}/kill"))?;
    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(error) => {
            if !is_reachable(addr).await {
                eprintln!("Server is not running");
                return Ok(());
            }
            anyhow::bail!("failed to send kill request: {error}");
        }
    };
    if response.status() != StatusCode::OK {
        anyhow::bail!("failed to kill server: {}", response.status().as_u16());
    }
    println!("Server {addr} killed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    use super::{is_reachable, timestamped, ClientError, FollowUpRequest, SERVER_BUSY};

    #[test]
    fn url_carries_working_dir_and_program() {
        let addr: SocketAddr = "127.0.0.1:7654".parse().expect("addr");
        let request = FollowUpRequest::new(addr, "/work/my repo").with_program_name("wn");
        assert_eq!(
            request.url().expect("url").as_str(),
            "http://127.0.0.1:7654/?workingDir=%2Fwork%2Fmy+repo&programName=wn"
        );
    }

    #[test]
    fn status_lines_are_timestamped() {
        let at = datetime!(2024-05-01 09:30:05 UTC);
        assert_eq!(
            timestamped(at, "User is typing..."),
            "[2024-05-01T09:30:05] User is typing..."
        );
    }

    #[test]
    fn busy_error_tells_agent_to_retry() {
        assert_eq!(ClientError::Busy.to_string(), SERVER_BUSY);
        assert_eq!(ClientError::Status(408).to_string(), "server returned status: 408");
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        assert!(is_reachable(addr).await);
        drop(listener);
        assert!(!is_reachable(addr).await);
    }
}
