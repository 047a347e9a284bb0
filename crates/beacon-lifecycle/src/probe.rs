//! TCP liveness probes
//!
//! Used by the promotion loop to wait for the local server to start
//! listening, and by the watchdog to decide whether the registry host is
//! reachable at all before trusting a failed instance query.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Whether something accepts TCP connections at `host:port`.
pub async fn port_reachable(host: &str, port: u16) -> bool {
    let reachable = matches!(
        timeout(PROBE_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    );
    debug!(host = %host, port = port, reachable = reachable, "Probed TCP port");
    reachable
}

/// Host and port to probe for a registry base URL, e.g.
/// `http://registry:8761/eureka` probes `registry:8761`.
pub fn probe_target(base_url: &str) -> Option<(String, u16)> {
    let parsed = Url::parse(base_url).ok()?;
    let host = parsed.host_str()?.to_string();
    let port = parsed.port_or_known_default()?;
    Some((host, port))
}
