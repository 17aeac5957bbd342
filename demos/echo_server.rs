//! TLS 1.2 echo server over blocking TCP.
//!
//! Listens on 127.0.0.1:9443 with a freshly generated Ed25519 identity and
//! echoes every byte a client sends. Sessions are cached, so reconnecting
//! clients resume.
//!
//! Usage:
//!   cargo run --example echo_server
//!
//! Try it with `openssl s_client -connect 127.0.0.1:9443 -tls1_2`.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::ops::ControlFlow;
use std::sync::Arc;

use milli_tls::{
    Certificate, Channel, ChannelConfig, ChannelHandler, DefaultPolicy, InMemoryCredentials, InMemorySessionCache,
    KeyType, PrivateKey, Rng, Session, Usage,
};

struct OsRng;

impl Rng for OsRng {
    fn fill(&mut self, buf: &mut [u8]) {
        use rand::RngCore;
        rand::rng().fill_bytes(buf);
    }
}

/// Collects output for the socket and data to echo back.
#[derive(Default)]
struct Echo {
    outgoing: Vec<u8>,
    echo: Vec<u8>,
}

impl ChannelHandler for Echo {
    fn on_output_ready(&mut self, bytes: &[u8]) {
        self.outgoing.extend_from_slice(bytes);
    }

    fn on_data_received(&mut self, data: &[u8]) -> ControlFlow<()> {
        self.echo.extend_from_slice(data);
        ControlFlow::Continue(())
    }

    fn on_handshake_complete(&mut self, session: &Session) -> bool {
        println!("[tls] established, {} session {:?}", session.cipher_suite(), session.id());
        true
    }
}

fn flush(channel: &mut Channel<Echo>, stream: &mut TcpStream) -> std::io::Result<()> {
    while !channel.handler().outgoing.is_empty() {
        let bytes = std::mem::take(&mut channel.handler_mut().outgoing);
        stream.write_all(&bytes)?;
        channel.write_complete();
    }
    Ok(())
}

fn serve(config: ChannelConfig, mut stream: TcpStream) {
    let mut channel = match Channel::server(config, Echo::default(), &mut OsRng) {
        Ok(channel) => channel,
        Err(e) => {
            eprintln!("[tls] cannot create channel: {e}");
            return;
        }
    };

    let mut buf = [0u8; 16384];
    while !channel.is_closed() {
        let n = match stream.read(&mut buf) {
            Ok(0) => {
                println!("[conn] peer disconnected");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                eprintln!("[conn] read error: {e}");
                return;
            }
        };
        if let Err(e) = channel.received(&buf[..n]) {
            eprintln!("[tls] {e}");
        }
        let echo = std::mem::take(&mut channel.handler_mut().echo);
        if !echo.is_empty() && channel.is_established() {
            if let Err(e) = channel.send(&echo) {
                eprintln!("[tls] send failed: {e}");
            }
        }
        if let Err(e) = flush(&mut channel, &mut stream) {
            eprintln!("[conn] write error: {e}");
            return;
        }
    }
    println!("[tls] closed");
}

fn main() {
    println!("milli-tls echo server");
    println!("=====================");

    let key = PrivateKey::generate(KeyType::Ed25519, &mut OsRng).expect("generate key");
    let cert = Certificate::self_signed(&key, "localhost").expect("self-signed certificate");
    let creds = InMemoryCredentials::new()
        .with_identity(Usage::TlsServer, vec![cert], key)
        .expect("server identity");
    let config = ChannelConfig::new(
        Arc::new(DefaultPolicy::new()),
        Arc::new(creds),
        Arc::new(InMemorySessionCache::new(256)),
    );

    let listener = TcpListener::bind("127.0.0.1:9443").expect("bind 127.0.0.1:9443");
    println!("[conn] listening on 127.0.0.1:9443");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
                println!("[conn] accepted {peer}");
                let config = config.clone();
                std::thread::spawn(move || serve(config, stream));
            }
            Err(e) => eprintln!("[conn] accept error: {e}"),
        }
    }
}
