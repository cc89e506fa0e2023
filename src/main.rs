use clap::Parser;
use indexer_gateway::{
    address::AddressCodec,
    cli::{Cli, Commands},
    config::loader::{ConfigOverrides, load_configuration},
    daemon::Daemon,
    log::init_logging,
};
use log::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            network,
            indexer_host,
            indexer_port,
            api_port,
        } => {
            init_logging()?;

            let overrides = ConfigOverrides {
                network,
                indexer_host,
                indexer_port,
                api_port,
            };
            let gateway_config = load_configuration(&config, &overrides)?;
            info!(
                config:% = config.display(),
                indexer_host = &*gateway_config.indexer.host,
                indexer_port = gateway_config.indexer.port;
                "Configuration loaded"
            );

            Daemon::new(gateway_config).run().await?;
        },
        Commands::Scripthash { address } => {
            let key = AddressCodec::derive_lookup_key(&address)?;
            println!("{key}");
        },
    }

    Ok(())
}
