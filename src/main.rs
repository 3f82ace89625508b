use pybridge::{
    bridge::Session,
    config::BridgeConfig,
    wire::{read_instruction, WireValue},
};
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

/// Unoptimized evaluator frames are large; give nested source and deep
/// recursion room before the nesting and recursion limits apply.
const SESSION_STACK_SIZE: usize = 32 * 1024 * 1024;

fn main() {
    init_tracing();
    let config = BridgeConfig::from_env();
    info!(?config, "starting bridge");

    let fallback = config.clone();
    let worker = std::thread::Builder::new()
        .name("session".into())
        .stack_size(SESSION_STACK_SIZE)
        .spawn(move || serve(config));
    match worker {
        Ok(handle) => {
            if handle.join().is_err() {
                eprintln!("Bridge session terminated unexpectedly");
                std::process::exit(1);
            }
        }
        Err(err) => {
            warn!(%err, "failed to spawn session thread, serving on main thread");
            serve(fallback);
        }
    }
}

fn serve(config: BridgeConfig) {
    let mut session = Session::new(config);
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                eprintln!("Failed to read instruction: {}", err);
                std::process::exit(1);
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let reply = match read_instruction(&line) {
            Ok(instruction) => session.handle(instruction),
            Err(err) => {
                warn!(%err, "unreadable instruction");
                WireValue::string(err.to_string())
            }
        };
        if writeln!(out, "{}", reply).and_then(|_| out.flush()).is_err() {
            break;
        }
    }
}
