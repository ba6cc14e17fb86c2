//! HTTP health probe.

use std::time::Duration;

use tracing::debug;

use berth_core::SuccessCodes;

use crate::evaluator::ProbeResult;

/// Perform `GET path` against `address` (host:port).
///
/// Returns `Pass` when the status matches `codes`, `Fail` for any other
/// status, and `Error` if the connection fails or the timeout elapses.
pub async fn http_probe(
    address: &str,
    path: &str,
    timeout: Duration,
    codes: &SuccessCodes,
) -> ProbeResult {
    let uri = format!("http://{address}{path}");

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "probe connection failed");
                return ProbeResult::Error;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "probe handshake failed");
                return ProbeResult::Error;
            }
        };

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("user-agent", "berth-health/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %uri, "probe request invalid");
                return ProbeResult::Error;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if codes.matches(status) {
                    ProbeResult::Pass
                } else {
                    debug!(status, %uri, "probe status not matched");
                    ProbeResult::Fail
                }
            }
            Err(e) => {
                debug!(error = %e, %uri, "probe request failed");
                ProbeResult::Error
            }
        }
    })
    .await;

    match result {
        Ok(probe) => probe,
        Err(_) => {
            debug!(%uri, "probe timed out");
            ProbeResult::Error
        }
    }
}
