use std::{path::PathBuf, sync::OnceLock};

use clap::Parser;

/// Reports task and container state changes to a control plane.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the config file. Missing means defaults.
    #[arg(short, long, default_value = "herald.toml")]
    pub config: PathBuf,
    /// Overrides `cluster` from the config file.
    #[arg(long)]
    pub cluster: Option<String>,
    /// Validate the config, print the effective settings and exit.
    #[arg(long)]
    pub check: bool,
}

static ARGS: OnceLock<Args> = OnceLock::new();

pub fn get_cli_args() -> &'static Args {
    ARGS.get_or_init(Args::parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["herald"]).unwrap();
        assert_eq!(args.config, PathBuf::from("herald.toml"));
        assert_eq!(args.cluster, None);
        assert!(!args.check);
    }

    #[test]
    fn test_overrides() {
        let args =
            Args::try_parse_from(["herald", "-c", "/etc/herald.toml", "--cluster", "prod", "--check"])
                .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/herald.toml"));
        assert_eq!(args.cluster.as_deref(), Some("prod"));
        assert!(args.check);
    }
}
