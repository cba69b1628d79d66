use std::net::SocketAddr;
use std::time::Duration;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509NameBuilder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{
    NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts,
};

use super::probe::HttpProbe;
use crate::config::{ProbeSettings, setup_tls_connector};

pub(crate) fn test_probe(settings: ProbeSettings) -> HttpProbe {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let tls = setup_tls_connector(true).expect("tls connector");
    HttpProbe::new(resolver, tls, &settings)
}

/// Client whose only nameserver is `nameserver`, asked once over TCP.
pub(crate) fn resolving_via(nameserver: SocketAddr, settings: ProbeSettings) -> HttpProbe {
    let mut name_servers = NameServerConfigGroup::new();
    name_servers.push(NameServerConfig {
        socket_addr: nameserver,
        protocol: Protocol::Tcp,
        tls_dns_name: None,
        trust_negative_responses: false,
        bind_addr: None,
    });
    let mut opts = ResolverOpts::default();
    opts.attempts = 1;
    opts.timeout = Duration::from_millis(300);
    opts.use_hosts_file = false;
    let resolver =
        TokioAsyncResolver::tokio(ResolverConfig::from_parts(None, vec![], name_servers), opts);
    let tls = setup_tls_connector(true).expect("tls connector");
    HttpProbe::new(resolver, tls, &settings)
}

const HELLO: &[&[u8]] = &[b"hello"];
const HELLO_WORLD: &[&[u8]] = &[b"hello", b"world"];

/// Reads one request head, waits `delay`, then answers with `parts` of the
/// body written separately, `pause` apart.
async fn respond<S>(mut socket: S, delay: Duration, parts: &'static [&'static [u8]], pause: Duration)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }
    tokio::time::sleep(delay).await;

    let length: usize = parts.iter().map(|part| part.len()).sum();
    let status = format!("HTTP/1.1 200 OK\r\ncontent-length: {length}\r\nconnection: close\r\n\r\n");
    if socket.write_all(status.as_bytes()).await.is_err() {
        return;
    }
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pause).await;
        }
        if socket.write_all(part).await.is_err() || socket.flush().await.is_err() {
            return;
        }
    }
    let _ = socket.shutdown().await;
}

/// Minimal HTTP/1.1 responder on loopback. Waits `delay` after reading the
/// request head before answering.
pub(crate) async fn http_fixture(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture");
    let addr = listener.local_addr().expect("fixture address");
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(respond(socket, delay, HELLO, Duration::ZERO));
        }
    });
    addr
}

/// Like `http_fixture`, but the body arrives in two halves `pause` apart.
pub(crate) async fn split_body_fixture(pause: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture");
    let addr = listener.local_addr().expect("fixture address");
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(respond(socket, Duration::ZERO, HELLO_WORLD, pause));
        }
    });
    addr
}

fn self_signed_identity() -> native_tls::Identity {
    let key = PKey::from_rsa(Rsa::generate(2048).expect("rsa key")).expect("private key");

    let mut name = X509NameBuilder::new().expect("name builder");
    name.append_entry_by_text("CN", "localhost").expect("common name");
    let name = name.build();

    let mut cert = X509::builder().expect("certificate builder");
    cert.set_version(2).expect("version");
    let serial = BigNum::from_u32(1)
        .and_then(|serial| serial.to_asn1_integer())
        .expect("serial");
    cert.set_serial_number(&serial).expect("serial number");
    cert.set_subject_name(&name).expect("subject");
    cert.set_issuer_name(&name).expect("issuer");
    cert.set_pubkey(&key).expect("public key");
    let not_before = Asn1Time::days_from_now(0).expect("not before");
    cert.set_not_before(&not_before).expect("set not before");
    let not_after = Asn1Time::days_from_now(1).expect("not after");
    cert.set_not_after(&not_after).expect("set not after");
    cert.sign(&key, MessageDigest::sha256()).expect("sign");
    let cert = cert.build();

    native_tls::Identity::from_pkcs8(
        &cert.to_pem().expect("certificate pem"),
        &key.private_key_to_pem_pkcs8().expect("key pem"),
    )
    .expect("identity")
}

/// HTTPS responder on loopback with a freshly generated self-signed
/// certificate.
pub(crate) async fn https_fixture() -> SocketAddr {
    let acceptor = native_tls::TlsAcceptor::new(self_signed_identity()).expect("tls acceptor");
    let acceptor = tokio_native_tls::TlsAcceptor::from(acceptor);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture");
    let addr = listener.local_addr().expect("fixture address");
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(stream) = acceptor.accept(socket).await {
                    respond(stream, Duration::ZERO, HELLO, Duration::ZERO).await;
                }
            });
        }
    });
    addr
}

/// Accepts connections and never writes a byte.
pub(crate) async fn silent_listener() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// A loopback address nothing listens on.
pub(crate) async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);
    addr
}
