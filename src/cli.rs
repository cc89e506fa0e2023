use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::address::Network;

#[derive(Parser)]
#[command(name = "indexer-gateway")]
#[command(about = "HTTP gateway in front of an Electrum-protocol blockchain indexer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to the indexer and serve the HTTP API until Ctrl+C
    Serve {
        #[arg(short, long, help = "Path to the configuration file", default_value = "data/config.toml")]
        config: PathBuf,
        #[arg(short, long, help = "Network to serve: mainnet, testnet or regtest")]
        network: Option<Network>,
        #[arg(long, help = "Host name or IP of the indexer")]
        indexer_host: Option<String>,
        #[arg(long, help = "TCP port of the indexer")]
        indexer_port: Option<u16>,
        #[arg(short = 'p', long, help = "Port for the API server")]
        api_port: Option<u16>,
    },
    /// Print the indexer lookup key (scripthash) of an address
    Scripthash {
        #[arg(help = "Cashaddr (with or without prefix) or legacy address")]
        address: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from([
            "indexer-gateway",
            "serve",
            "--network",
            "testnet",
            "--indexer-host",
            "fulcrum.local",
            "-p",
            "8080",
        ])
        .unwrap();

        match cli.command {
            Commands::Serve {
                config,
                network,
                indexer_host,
                indexer_port,
                api_port,
            } => {
                assert_eq!(config, PathBuf::from("data/config.toml"));
                assert_eq!(network, Some(Network::Testnet));
                assert_eq!(indexer_host.as_deref(), Some("fulcrum.local"));
                assert_eq!(indexer_port, None);
                assert_eq!(api_port, Some(8080));
            },
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_unknown_network_is_rejected() {
        assert!(Cli::try_parse_from(["indexer-gateway", "serve", "--network", "dogecoin"]).is_err());
    }
}
