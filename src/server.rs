use std::convert::Infallible;
use std::fmt::Write;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::exporter::LatencyExporter;
use crate::http_probe::{Phase, Probe, report};

type Body = Full<Bytes>;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until `shutdown` resolves. Each connection is served
/// on its own task. Accept errors such as fd exhaustion are logged and
/// retried after a short pause.
pub async fn serve<P, F>(
    listener: TcpListener,
    exporter: Arc<LatencyExporter<P>>,
    metrics_path: String,
    shutdown: F,
) where
    P: Probe,
    F: Future<Output = ()>,
{
    let metrics_path: Arc<str> = Arc::from(metrics_path);
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = &mut shutdown => {
                log::info!("Shutting down");
                return;
            }
        };
        let Some((stream, peer)) = accepted_or_backoff(accepted).await else {
            continue;
        };

        let exporter = Arc::clone(&exporter);
        let metrics_path = Arc::clone(&metrics_path);
        tokio::spawn(async move {
            let service = service_fn(move |request| {
                let exporter = Arc::clone(&exporter);
                let metrics_path = Arc::clone(&metrics_path);
                async move { Ok::<_, Infallible>(route(request, &exporter, &metrics_path).await) }
            });
            if let Err(err) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                log::debug!("Connection from {peer} ended with an error: {err}");
            }
        });
    }
}

async fn accepted_or_backoff<T>(accepted: std::io::Result<T>) -> Option<T> {
    match accepted {
        Ok(connection) => Some(connection),
        Err(err) => {
            log::warn!("Failed to accept connection: {err}");
            tokio::time::sleep(ACCEPT_BACKOFF).await;
            None
        }
    }
}

async fn route<P: Probe>(
    request: Request<Incoming>,
    exporter: &LatencyExporter<P>,
    metrics_path: &str,
) -> Response<Body> {
    let path = request.uri().path();
    if path != metrics_path && path != "/" {
        return text(StatusCode::NOT_FOUND, "Not Found\n");
    }
    if request.method() != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n");
    }

    if path == "/" {
        return html(landing_page(exporter, metrics_path));
    }

    match exporter.render().await {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            );
            response
        }
        Err(err) => {
            log::error!("Failed to encode metrics: {}", report(&err));
            text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics\n")
        }
    }
}

fn text(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn html(body: String) -> Response<Body> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    response
}

fn landing_page<P: Probe>(exporter: &LatencyExporter<P>, metrics_path: &str) -> String {
    let snapshot = exporter.snapshot();
    let mut rows = String::new();
    for target in exporter.targets() {
        let Some(rtt) = snapshot.get(target.label(), Phase::RoundTrip) else {
            continue;
        };
        let dist = &rtt.distribution;
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(target.label()),
            dist.count,
            millis(dist.p50),
            millis(dist.p99),
        );
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Latency Exporter</title></head>\n<body>\n\
         <h1>Latency Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         <table>\n<tr><th>Target</th><th>Samples</th><th>RTT p50</th><th>RTT p99</th></tr>\n{rows}\n</table>\n\
         <p>Last updated {taken_at}</p>\n</body>\n</html>\n",
        path = escape(metrics_path),
        taken_at = snapshot.taken_at.to_rfc3339(),
    )
}

fn millis(seconds: Option<f64>) -> String {
    seconds.map_or_else(|| "N/A".to_string(), |s| format!("{:.2}ms", s * 1000.0))
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
