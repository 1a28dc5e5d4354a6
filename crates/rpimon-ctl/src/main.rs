//! rpimon-ctl - sends one command to a running rpimond.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{Level, debug};
use tracing_subscriber::EnvFilter;

use rpimon_core::client::{ClientError, ControlClient};
use rpimon_core::config::{DEFAULT_PORT, parse_key};
use rpimon_core::protocol::AuthKey;

#[derive(Parser)]
#[command(name = "rpimon-ctl", about = "Send a command to an rpimon agent", version)]
struct Cli {
    /// Agent host name or address.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Agent command port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Pre-shared key, hex (0x...) or decimal u32.
    #[arg(long, env = "RPIMON_KEY", default_value = "0x01020304", value_parser = parse_key, hide_env_values = true)]
    key: u32,

    /// Connect and reply timeout in seconds.
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Log connection details.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Terminate a process on the agent host.
    Kill {
        pid: u32,
    },
    /// Drive a digital output line.
    SetLine {
        line: u8,
        /// 0 or 1.
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        value: u8,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let mut filter = EnvFilter::from_default_env();
    for target in ["rpimon_ctl", "rpimon_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(cli: &Cli) -> Result<String, ClientError> {
    let addr = format!("{}:{}", cli.host, cli.port);
    let mut client = ControlClient::connect(
        &addr,
        AuthKey::new(cli.key),
        Duration::from_secs(cli.timeout),
    )?;
    debug!(peer = %client.peer(), "sending command");

    match cli.command {
        Action::Kill { pid } => {
            client.terminate(pid)?;
            Ok(format!("pid {} terminated", pid))
        }
        Action::SetLine { line, value } => {
            client.set_line(line, value == 1)?;
            Ok(format!("line {} set to {}", line, value))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(message) => {
            println!("{}", message);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("rpimon-ctl: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kill() {
        let cli = Cli::try_parse_from(["rpimon-ctl", "--host", "pi.local", "kill", "42"]).unwrap();
        assert_eq!(cli.host, "pi.local");
        assert_eq!(cli.port, DEFAULT_PORT);
        assert!(matches!(cli.command, Action::Kill { pid: 42 }));
    }

    #[test]
    fn parses_set_line_with_hex_key() {
        let cli = Cli::try_parse_from(["rpimon-ctl", "--key", "0xCAFE", "set-line", "17", "1"])
            .unwrap();
        assert_eq!(cli.key, 0xCAFE);
        assert!(matches!(cli.command, Action::SetLine { line: 17, value: 1 }));
    }

    #[test]
    fn rejects_line_value_out_of_range() {
        assert!(Cli::try_parse_from(["rpimon-ctl", "set-line", "17", "2"]).is_err());
    }
}
