use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "resource-reconciler",
    version,
    about = "Reconciles custom-resource lifecycle events for versioned IoT policies and SNS platform applications"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile a single lifecycle event and print the response.
    Handle(HandleOpts),
    /// Serve lifecycle events over HTTP.
    Serve(ServeOpts),
    Config(ConfigOpts),
    Version,
}

#[derive(clap::Args)]
pub struct HandleOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    /// Event file; `-` or absent reads stdin.
    #[arg(short, long)]
    pub event: Option<String>,
}

#[derive(clap::Args)]
pub struct ServeOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(short, long)]
    pub port: Option<u16>,
    #[arg(short, long)]
    pub bind: Option<String>,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_handle_with_event_file() {
        let cli = Cli::try_parse_from(["resource-reconciler", "handle", "--event", "event.json"]).unwrap();
        match cli.command {
            Commands::Handle(opts) => assert_eq!(opts.event.as_deref(), Some("event.json")),
            _ => panic!("expected handle"),
        }
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["resource-reconciler", "serve", "-p", "9100", "-b", "0.0.0.0"]).unwrap();
        match cli.command {
            Commands::Serve(opts) => {
                assert_eq!(opts.port, Some(9100));
                assert_eq!(opts.bind.as_deref(), Some("0.0.0.0"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn config_requires_action() {
        assert!(Cli::try_parse_from(["resource-reconciler", "config"]).is_err());
    }
}
