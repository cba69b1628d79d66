use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::header::{CONNECTION, HOST, USER_AGENT};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use trust_dns_resolver::TokioAsyncResolver;
use url::{Host, Url};

use super::error::{ProbeError, ProbeFailed};
use super::result::{ConnectionPhase, Phase, TimingRecord};
use super::tap::FirstByteTap;
use super::timer::PhaseTimer;
use crate::config::{ProbeSettings, ProbeTarget};

/// Something that can run one timed probe against a target.
pub trait Probe: Send + Sync + 'static {
    /// Probe `target` once. The whole attempt is abandoned once `deadline`
    /// elapses; whatever phases finished by then come back in the failure.
    fn probe(
        &self,
        target: &ProbeTarget,
        deadline: Duration,
    ) -> impl Future<Output = Result<TimingRecord, ProbeFailed>> + Send;
}

#[derive(Debug, Clone, Copy)]
struct TransportTimeouts {
    dial: Duration,
    tls_handshake: Duration,
    response_header: Duration,
}

/// Probes over a fresh HTTP/1.1 connection per attempt, timing each phase of
/// the connection lifecycle as it happens.
pub struct HttpProbe {
    resolver: TokioAsyncResolver,
    tls: TokioTlsConnector,
    timeouts: TransportTimeouts,
    user_agent: String,
}

impl HttpProbe {
    pub fn new(
        resolver: TokioAsyncResolver,
        tls: TokioTlsConnector,
        settings: &ProbeSettings,
    ) -> Self {
        Self {
            resolver,
            tls,
            timeouts: TransportTimeouts {
                dial: settings.dial_timeout(),
                tls_handshake: settings.tls_handshake_timeout(),
                response_header: settings.response_header_timeout(),
            },
            user_agent: settings.user_agent.clone(),
        }
    }

    async fn run(&self, target: &ProbeTarget, timer: &mut PhaseTimer) -> Result<u16, ProbeError> {
        let url = target.url();
        let host = url.host().ok_or(ProbeError::MissingHost)?;
        let port = url.port_or_known_default().ok_or(ProbeError::MissingHost)?;

        let (ip, server_name) = match host {
            Host::Ipv4(ip) => (IpAddr::V4(ip), ip.to_string()),
            Host::Ipv6(ip) => (IpAddr::V6(ip), ip.to_string()),
            Host::Domain(domain) => (self.resolve(domain, timer).await?, domain.to_string()),
        };

        let stream = within(
            timer,
            ConnectionPhase::Connect,
            self.timeouts.dial,
            TcpStream::connect(SocketAddr::new(ip, port)),
            ProbeError::Connect,
        )
        .await?;

        if !target.is_tls() {
            return self.exchange(stream, url, timer).await;
        }

        let stream = within(
            timer,
            ConnectionPhase::Tls,
            self.timeouts.tls_handshake,
            self.tls.connect(&server_name, stream),
            ProbeError::Tls,
        )
        .await?;
        self.exchange(stream, url, timer).await
    }

    async fn resolve(&self, domain: &str, timer: &mut PhaseTimer) -> Result<IpAddr, ProbeError> {
        timer.begin(ConnectionPhase::Dns);
        let lookup = self.resolver.lookup_ip(domain).await;
        timer.done(ConnectionPhase::Dns, lookup.is_ok());
        lookup?
            .iter()
            .next()
            .ok_or_else(|| ProbeError::NoAddresses(domain.to_string()))
    }

    /// Sends the GET and drains the response. The connection is driven in
    /// place rather than spawned so the deadline cancels it along with the
    /// request.
    async fn exchange<S>(
        &self,
        stream: S,
        url: &Url,
        timer: &mut PhaseTimer,
    ) -> Result<u16, ProbeError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(FirstByteTap::new(stream, timer.first_byte_marker()));
        let (mut sender, conn) = http1::handshake(io).await?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(origin_form(url))
            .header(HOST, host_header(url))
            .header(USER_AGENT, self.user_agent.as_str())
            .header(CONNECTION, "close")
            .body(Empty::<Bytes>::new())?;

        let header_timeout = self.timeouts.response_header;
        let exchange = async move {
            let response = timeout(header_timeout, sender.send_request(request))
                .await
                .map_err(|_| ProbeError::PhaseTimeout {
                    phase: Phase::Ttfb,
                    after: header_timeout,
                })??;
            let status = response.status().as_u16();
            let mut body = response.into_body();
            while let Some(frame) = body.frame().await {
                frame?;
            }
            Ok::<u16, ProbeError>(status)
        };
        tokio::pin!(conn);
        tokio::pin!(exchange);

        let status = tokio::select! {
            biased;
            status = &mut exchange => status?,
            closed = &mut conn => {
                closed?;
                exchange.await?
            }
        };
        timer.response_complete();
        Ok(status)
    }
}

impl Probe for HttpProbe {
    async fn probe(
        &self,
        target: &ProbeTarget,
        deadline: Duration,
    ) -> Result<TimingRecord, ProbeFailed> {
        let mut timer = PhaseTimer::start();
        let outcome = timeout(deadline, self.run(target, &mut timer)).await;
        let outcome = outcome.unwrap_or(Err(ProbeError::DeadlineExceeded(deadline)));

        match outcome {
            Ok(status) => {
                let record = timer.finish(target.label(), Some(status));
                log::debug!("Probed {record} (status {status})");
                Ok(record)
            }
            Err(cause) => Err(ProbeFailed::new(timer.finish(target.label(), None), cause)),
        }
    }
}

/// Runs one bracketed connection phase under its own timeout.
async fn within<T, E>(
    timer: &mut PhaseTimer,
    phase: ConnectionPhase,
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
    on_error: impl FnOnce(E) -> ProbeError,
) -> Result<T, ProbeError> {
    timer.begin(phase);
    match timeout(limit, fut).await {
        Ok(Ok(value)) => {
            timer.done(phase, true);
            Ok(value)
        }
        Ok(Err(err)) => {
            timer.done(phase, false);
            Err(on_error(err))
        }
        Err(_) => {
            timer.done(phase, false);
            Err(ProbeError::PhaseTimeout {
                phase: phase.into(),
                after: limit,
            })
        }
    }
}

fn origin_form(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
