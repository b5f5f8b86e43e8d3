use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uc_core::AppConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "uniclipboard-share", version, about)]
pub struct Cli {
    /// Config file. Defaults to `<config_dir>/uniclipboard-share/config.toml`.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base URL of the other node, e.g. `http://192.168.1.20:5000`.
    #[arg(short, long, value_name = "URL")]
    pub peer: Option<String>,

    /// Address the local HTTP server listens on.
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sync the clipboard with the peer until Ctrl-C (default).
    Run,
    /// Send one file to the peer and exit.
    Send {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the peer's current clipboard and adopt it if it is newer.
    Clipboard,
    /// Download a completed transfer from the peer.
    Fetch {
        #[arg(value_name = "FINGERPRINT")]
        fingerprint: String,
        /// Where to write the file. Defaults to the shared folder.
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
}

impl Cli {
    /// Flags win over the config file.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(peer) = &self.peer {
            config.peer.address = peer.clone();
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "uniclipboard-share",
            "--peer",
            "http://10.0.0.9:5000",
            "--bind",
            "127.0.0.1:7000",
        ]);
        let mut config = AppConfig::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.peer.address, "http://10.0.0.9:5000");
        assert_eq!(config.server.bind, "127.0.0.1:7000");
        assert_eq!(cli.command(), Command::Run);
    }

    #[test]
    fn missing_flags_keep_config_values() {
        let cli = Cli::parse_from(["uniclipboard-share"]);
        let mut config = AppConfig::default();
        config.peer.address = "http://peer:5000".to_string();

        cli.apply_overrides(&mut config);

        assert_eq!(config.peer.address, "http://peer:5000");
        assert_eq!(config.server.bind, AppConfig::default().server.bind);
    }

    #[test]
    fn send_takes_a_file() {
        let cli = Cli::parse_from(["uniclipboard-share", "send", "notes.txt"]);
        assert_eq!(
            cli.command(),
            Command::Send {
                file: PathBuf::from("notes.txt")
            }
        );
    }

    #[test]
    fn clipboard_takes_no_arguments() {
        let cli = Cli::parse_from(["uniclipboard-share", "clipboard"]);
        assert_eq!(cli.command(), Command::Clipboard);
    }

    #[test]
    fn fetch_takes_fingerprint_and_optional_out() {
        let cli = Cli::parse_from(["uniclipboard-share", "fetch", "ab12"]);
        assert_eq!(
            cli.command(),
            Command::Fetch {
                fingerprint: "ab12".to_string(),
                out: None
            }
        );

        let cli = Cli::parse_from(["uniclipboard-share", "fetch", "ab12", "--out", "copy.bin"]);
        assert_eq!(
            cli.command(),
            Command::Fetch {
                fingerprint: "ab12".to_string(),
                out: Some(PathBuf::from("copy.bin"))
            }
        );
        assert!(Cli::try_parse_from(["uniclipboard-share", "fetch"]).is_err());
    }
}
