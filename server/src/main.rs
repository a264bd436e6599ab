use clap::error::ErrorKind;
use clap::Parser;
use log::{error, info};
use server::config::{ServerConfig, DEFAULT_MAX_EVENTS, DEFAULT_READ_BUFFER};
use server::network::Server;
use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;

/// Process mode selected by the first argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Server,
    Client,
}

/// Accepts `server`/`client` as well as the dash-prefixed spellings
fn parse_mode(value: &str) -> Result<Mode, String> {
    match value.trim_start_matches('-') {
        "server" => Ok(Mode::Server),
        "client" => Ok(Mode::Client),
        other => Err(format!("unknown mode '{other}', expected server or client")),
    }
}

fn parse_word(value: &str) -> Result<String, String> {
    if value.is_empty() {
        Err("words must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

/// Word-guessing game server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Process mode: server or client
    #[arg(value_parser = parse_mode, allow_hyphen_values = true)]
    mode: Mode,

    /// IP address to bind to
    address: IpAddr,

    /// Port to listen on
    port: u16,

    /// Word to play; repeat to pick randomly per game
    #[arg(short, long = "word", value_parser = parse_word)]
    words: Vec<String>,

    /// Readiness events handled per loop iteration
    #[arg(long, default_value_t = DEFAULT_MAX_EVENTS)]
    max_events: usize,

    /// Bytes read from a client at once
    #[arg(long, default_value_t = DEFAULT_READ_BUFFER)]
    buffer_size: usize,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(self.address, self.port),
            max_events: self.max_events,
            read_buffer_size: self.buffer_size,
            words: self.words.clone(),
            ..ServerConfig::default()
        }
    }
}

/// Parses arguments, then runs the server until it has drained.
fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            // Usage problems go to stdout
            println!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match args.mode {
        Mode::Server => run_server(&args.server_config()),
        Mode::Client => {
            println!("client mode is not implemented");
            ExitCode::FAILURE
        }
    }
}

fn run_server(config: &ServerConfig) -> ExitCode {
    let mut server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match server.run() {
        Ok(stats) => {
            info!(
                "Served {} games ({} completed)",
                stats.accepted, stats.completed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server stopped with error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_args() {
        let args = Args::try_parse_from(["server", "server", "127.0.0.1", "4000"]).unwrap();
        assert_eq!(args.mode, Mode::Server);
        assert_eq!(args.port, 4000);
        assert!(args.words.is_empty());

        let config = args.server_config();
        assert_eq!(config.bind_addr, "127.0.0.1:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_events, DEFAULT_MAX_EVENTS);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER);
        assert!(config.stdin_control);
    }

    #[test]
    fn test_parse_client_mode() {
        let args = Args::try_parse_from(["server", "client", "10.0.0.1", "80"]).unwrap();
        assert_eq!(args.mode, Mode::Client);
    }

    #[test]
    fn test_mode_accepts_dash_prefix() {
        assert_eq!(parse_mode("-server"), Ok(Mode::Server));
        assert_eq!(parse_mode("-client"), Ok(Mode::Client));
        assert!(parse_mode("proxy").is_err());
    }

    #[test]
    fn test_too_few_arguments() {
        assert!(Args::try_parse_from(["server"]).is_err());
        assert!(Args::try_parse_from(["server", "server"]).is_err());
        assert!(Args::try_parse_from(["server", "server", "127.0.0.1"]).is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(Args::try_parse_from(["server", "server", "localhost:x", "80"]).is_err());
        assert!(Args::try_parse_from(["server", "server", "127.0.0.1", "70000"]).is_err());
        assert!(Args::try_parse_from(["server", "game", "127.0.0.1", "80"]).is_err());
    }

    #[test]
    fn test_words_and_tuning() {
        let args = Args::try_parse_from([
            "server",
            "server",
            "0.0.0.0",
            "9000",
            "-w",
            "cat",
            "--word",
            "dog",
            "--max-events",
            "64",
            "--buffer-size",
            "512",
        ])
        .unwrap();

        let config = args.server_config();
        assert_eq!(config.words, vec!["cat", "dog"]);
        assert_eq!(config.max_events, 64);
        assert_eq!(config.read_buffer_size, 512);
    }

    #[test]
    fn test_empty_word_rejected() {
        assert!(Args::try_parse_from(["server", "server", "127.0.0.1", "80", "-w", ""]).is_err());
    }
}
