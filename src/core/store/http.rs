//! HTTP plumbing shared by the etcd and consul drivers.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, trace};

use crate::error::StoreError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Keepalive interval on idle connections, so a dead peer under a long-poll
/// is noticed without a request timeout.
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Client shared by every call and watch on one store.
///
/// No overall request timeout: long-polls stay open until the store
/// answers or the request future is dropped.
pub(super) fn client() -> Result<Client, StoreError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .tcp_keepalive(TCP_KEEPALIVE)
        .build()
        .map_err(|e| StoreError::Transient(format!("failed to build HTTP client: {}", e)))
}

/// Validate and normalise a machine list (`http://host:port`, no trailing `/`).
pub(super) fn machines(machines: Vec<String>) -> Result<Vec<String>, StoreError> {
    let machines: Vec<String> = machines
        .into_iter()
        .map(|m| m.trim().trim_end_matches('/').to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if machines.is_empty() {
        return Err(StoreError::Transient("no store endpoints configured".to_string()));
    }
    Ok(machines)
}

/// Send a request to the first machine that accepts a connection.
///
/// Only connection failures move on to the next machine; any answer, even
/// an error status, is returned to the caller.
pub(super) async fn send<F>(machines: &[String], build: F) -> Result<Response, StoreError>
where
    F: Fn(&str) -> RequestBuilder + Send,
{
    let mut last = None;
    for machine in machines {
        trace!(machine = %machine, "sending request");
        match build(machine).send().await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_connect() => {
                debug!(machine = %machine, error = %e, "machine unreachable");
                last = Some(e);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(last
        .map(StoreError::from)
        .unwrap_or_else(|| StoreError::Transient("no store endpoints configured".to_string())))
}

/// Parse a numeric index header such as `X-Etcd-Index`.
pub(super) fn index_header(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
