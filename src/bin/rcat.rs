//! Reference client: relays stdin to a TCP peer and peer output to stdout,
//! driven entirely by one reactor. EOF on either side shuts the loop down
//! cleanly; an I/O failure inside a callback quits with a non-zero exit.

use std::cell::Cell;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use reactor::{net, Interval, Reactor, Timer};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Relay stdin to a TCP peer and peer output to stdout")]
struct Args {
    host: String,
    port: u16,

    /// Seconds between relay statistics log lines.
    #[arg(long, default_value_t = 10)]
    stats_interval: i64,
}

struct Session {
    stream: TcpStream,
    sent: Cell<u64>,
    received: Cell<u64>,
    failed: Cell<bool>,
}

impl Session {
    fn fail(&self, reactor: &Reactor, what: &str, err: io::Error) {
        error!(%err, "{what}");
        self.failed.set(true);
        reactor.quit();
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let stream = net::connect(&args.host, args.port)
        .with_context(|| format!("connect to {}:{}", args.host, args.port))?;
    debug!(peer = %stream.peer_addr()?, "connected");

    let reactor = Reactor::new();
    let session = Rc::new(Session {
        stream,
        sent: Cell::new(0),
        received: Cell::new(0),
        failed: Cell::new(false),
    });

    let on_stdin = {
        let session = session.clone();
        let reactor = reactor.clone();
        move || {
            let mut buf = [0u8; 4096];
            match io::stdin().lock().read(&mut buf) {
                Ok(0) => reactor.quit(),
                Ok(n) => {
                    let mut stream = &session.stream;
                    match stream.write_all(&buf[..n]) {
                        Ok(()) => session.sent.set(session.sent.get() + n as u64),
                        Err(err) => session.fail(&reactor, "send to peer failed", err),
                    }
                }
                Err(err) => session.fail(&reactor, "read from stdin failed", err),
            }
        }
    };
    reactor.register_descriptor(&io::stdin(), &on_stdin);

    let on_socket = {
        let session = session.clone();
        let reactor = reactor.clone();
        move || {
            let mut buf = [0u8; 4096];
            let mut stream = &session.stream;
            match stream.read(&mut buf) {
                Ok(0) => reactor.quit(),
                Ok(n) => {
                    let mut stdout = io::stdout().lock();
                    match stdout.write_all(&buf[..n]).and_then(|()| stdout.flush()) {
                        Ok(()) => session.received.set(session.received.get() + n as u64),
                        Err(err) => session.fail(&reactor, "write to stdout failed", err),
                    }
                }
                Err(err) => session.fail(&reactor, "read from peer failed", err),
            }
        }
    };
    reactor.register_descriptor(&session.stream, &on_socket);

    let stats = {
        let session = session.clone();
        move || {
            debug!(
                sent = session.sent.get(),
                received = session.received.get(),
                "relay totals"
            );
        }
    };
    let interval = Interval::from_secs(args.stats_interval.max(1));
    reactor.register_timer(Timer::repeating(interval, reactor.now() + interval), &stats);

    reactor.run()?;

    if session.failed.get() {
        anyhow::bail!("relay failed");
    }
    Ok(())
}
