use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use servedir::{ServerConfig, start_server};

/// Serve a directory over HTTP.
#[derive(Debug, Parser)]
#[command(name = "servedir", version)]
struct Cli {
    /// Prefer IPv6 when binding
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Directory to serve
    #[arg(short, long, env = "STATIC_DIR", value_name = "PATH", default_value = ".")]
    directory: PathBuf,

    /// Host name or address to bind [default: 0.0.0.0, or :: with --ipv6]
    #[arg(short = 'H', long, env = "STATIC_HOST", value_name = "NAME")]
    host: Option<String>,

    /// Port to listen on; 0 picks a free port [default: $PORT or 0]
    #[arg(short, long, env = "STATIC_PORT", value_name = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version come through here too and are not failures.
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let port = match cli.port {
        Some(port) => Some(port),
        None => port_from_env()?,
    };

    let mut config = ServerConfig::new()
        .directory(cli.directory)
        .ipv6(cli.ipv6);
    if let Some(host) = cli.host {
        config = config.host(host);
    }
    if let Some(port) = port {
        config = config.port(port);
    }

    let server = start_server(config).await?;
    server.run().await?;
    Ok(())
}

// Hosting platforms commonly hand out the port through a bare `PORT`.
fn port_from_env() -> Result<Option<u16>, String> {
    match std::env::var("PORT") {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("invalid PORT value: {value:?}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from(["servedir", "-6", "-d", "site", "-H", "::1", "-p", "8080"])
            .unwrap();
        assert!(cli.ipv6);
        assert_eq!(cli.directory, PathBuf::from("site"));
        assert_eq!(cli.host.as_deref(), Some("::1"));
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn help_and_version_are_not_errors() {
        let help = Cli::try_parse_from(["servedir", "-h"]).unwrap_err();
        assert!(!help.use_stderr());
        let version = Cli::try_parse_from(["servedir", "-V"]).unwrap_err();
        assert!(!version.use_stderr());
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = Cli::try_parse_from(["servedir", "-p", "http"]).unwrap_err();
        assert!(err.use_stderr());
    }
}
