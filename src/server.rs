//! Line-oriented statement boundary: one line in, one reply out.
//!
//! Each reply is `[OK] Processed: <statement>` plus any result text, or
//! `[ERROR] <message>`, and always ends with a newline, an EOT (0x04)
//! character and another newline so clients know where it stops.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info};

use crate::engine::{Engine, Response, SessionContext};
use crate::error::Result;

/// Marks the end of one reply.
pub const END_OF_TRANSMISSION: char = '\u{4}';

/// Formats the reply for one statement.
pub fn format_reply(statement: &str, outcome: &Result<Response>) -> String {
    let mut reply = match outcome {
        Ok(response) => {
            let mut reply = format!("[OK] Processed: {statement}\n");
            if let Some(text) = &response.text {
                reply.push_str(text);
            }
            reply
        }
        Err(e) => format!("[ERROR] {e}"),
    };
    reply.push('\n');
    reply.push(END_OF_TRANSMISSION);
    reply.push('\n');
    reply
}

/// Serves one session: reads statements line by line until EOF and writes a
/// reply after each. The working database lives only as long as the session.
pub fn handle_session<R: BufRead, W: Write>(
    engine: &Engine,
    reader: R,
    mut writer: W,
) -> io::Result<()> {
    let mut context = SessionContext::new();

    for line in reader.lines() {
        let line = line?;
        let statement = line.trim();
        if statement.is_empty() {
            continue;
        }

        let outcome = engine.perform_statement(&context, statement);
        writer.write_all(format_reply(statement, &outcome).as_bytes())?;
        writer.flush()?;

        if let Ok(response) = outcome {
            context = response.context;
        }
    }
    Ok(())
}

/// Accepts connections forever, one thread per connection.
pub fn serve(engine: Arc<Engine>, listener: TcpListener) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening for statements");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let engine = Arc::clone(&engine);
                thread::spawn(move || handle_connection(&engine, stream));
            }
            Err(e) => error!(error = %e, "failed to accept connection"),
        }
    }
    Ok(())
}

/// Binds `addr` and serves until the process stops.
pub fn run_server(engine: Arc<Engine>, addr: SocketAddr) -> io::Result<()> {
    let listener = TcpListener::bind(addr)?;
    serve(engine, listener)
}

fn handle_connection(engine: &Engine, stream: TcpStream) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(%peer, "connection established");

    let result = stream
        .try_clone()
        .and_then(|read_half| {
            handle_session(engine, BufReader::new(read_half), BufWriter::new(stream))
        });

    match result {
        Ok(()) => info!(%peer, "connection closed"),
        Err(e) => error!(%peer, error = %e, "connection lost"),
    }
}

/// Reads statements from stdin and writes replies to stdout.
pub fn run_repl(engine: &Engine) -> io::Result<()> {
    debug!("reading statements from stdin");
    let stdin = io::stdin();
    let stdout = io::stdout();
    handle_session(engine, stdin.lock(), stdout.lock())
}
