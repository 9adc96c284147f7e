//! Serve command implementation.

use std::path::PathBuf;

use clap::Args;
use s4d_config::{CliSettings, Config};
use s4d_server::{DevServer, ServerConfig, run_server};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for serving a webroot.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Directory to serve (overrides config).
    webroot: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover s4d.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to. Use "0.0.0.0" to expose over the network [default: localhost].
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on [default: 8080].
    #[arg(short, long)]
    port: Option<u16>,

    /// Single-page application mode: serve /index.html for extensionless
    /// URLs that cannot be resolved to a file.
    #[arg(long)]
    spa: bool,

    /// Enable verbose output (request and reload logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Load configuration and run the server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            webroot: self.webroot,
            host: self.host,
            port: self.port,
            spa: self.spa.then_some(true),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let server_config = server_config_from_config(&config)?;

        tracing::debug!(
            config_file = ?config.config_path,
            ?server_config,
            "Resolved server configuration"
        );

        output.detail(&format!("Webroot: {}", server_config.webroot.display()));
        if server_config.spa {
            output.detail("SPA mode: enabled");
        }

        run_server(server_config, |server: &DevServer| {
            output.highlight(&format!("Development server started: {}", server.base_url()));
        })
        .await?;

        Ok(())
    }
}

/// Create server configuration from loaded config.
fn server_config_from_config(config: &Config) -> Result<ServerConfig, CliError> {
    Ok(ServerConfig {
        webroot: config.webroot()?.to_path_buf(),
        host: config.server.host.clone(),
        port: config.server.port,
        spa: config.spa,
        debounce_ms: config.live_reload.debounce_ms,
        ignore_patterns: config.live_reload.ignore.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    fn parse(args: &[&str]) -> Result<ServeArgs, clap::Error> {
        TestCli::try_parse_from(std::iter::once("s4d").chain(args.iter().copied()))
            .map(|cli| cli.serve)
    }

    #[test]
    fn test_parse_webroot_and_flags() {
        let args = parse(&["public", "--port", "3000", "--host", "0.0.0.0", "--spa"]).unwrap();

        assert_eq!(args.webroot, Some(PathBuf::from("public")));
        assert_eq!(args.port, Some(3000));
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert!(args.spa);
    }

    #[test]
    fn test_host_does_not_swallow_spa_flag() {
        let args = parse(&["--host", "example.test", "public"]).unwrap();

        assert_eq!(args.host.as_deref(), Some("example.test"));
        assert!(!args.spa);
    }

    #[test]
    fn test_port_out_of_range_is_rejected() {
        assert!(parse(&["public", "--port", "65536"]).is_err());
        assert!(parse(&["public", "--port", "-1"]).is_err());
        assert!(parse(&["public", "--port", "65535"]).is_ok());
        assert!(parse(&["public", "--port", "0"]).is_ok());
    }

    #[test]
    fn test_port_requires_value() {
        assert!(parse(&["public", "--port"]).is_err());
    }

    #[test]
    fn test_unexpected_extra_argument() {
        assert!(parse(&["public", "other"]).is_err());
    }

    #[test]
    fn test_server_config_from_config() {
        let mut config = Config::default();
        config.webroot_resolved = Some(PathBuf::from("/srv/site"));
        config.spa = true;
        config.server.port = 0;

        let server_config = server_config_from_config(&config).unwrap();

        assert_eq!(server_config.webroot, PathBuf::from("/srv/site"));
        assert_eq!(server_config.host, "localhost");
        assert_eq!(server_config.port, 0);
        assert!(server_config.spa);
        assert_eq!(server_config.debounce_ms, 50);
    }

    #[test]
    fn test_server_config_requires_webroot() {
        let config = Config::default();

        assert!(server_config_from_config(&config).is_err());
    }
}
