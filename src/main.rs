use azure_vwan_provisioner::azure::{
    download_vpn_configuration, ArmClient, CredentialAuthorizer, InMemoryResourceManager,
    ResourceManager, StaticTokenAuthorizer,
};
use azure_vwan_provisioner::config::{PollSettings, ResourceIdentity};
use azure_vwan_provisioner::models::{NetworkSiteConfig, Topology};
use azure_vwan_provisioner::{ConfigurationExporter, Reconciler};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "vwan-provisioner", version, about = "Provision an Azure virtual WAN topology")]
struct Cli {
    /// log4rs configuration file
    #[arg(long, default_value = "log4rs.yml")]
    log_config: PathBuf,

    /// Azure SDK auth file providing the subscription id
    #[arg(long, env = "AZURE_AUTH_LOCATION")]
    auth_file: Option<PathBuf>,

    /// Run against an in-memory backend instead of Azure
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the topology
    Apply {
        #[arg(long)]
        topology: PathBuf,
        #[arg(long)]
        site: PathBuf,
        /// Create the resource group first
        #[arg(long)]
        with_resource_group: bool,
    },
    /// Delete the topology, children first
    Destroy {
        #[arg(long)]
        topology: PathBuf,
    },
    /// Export a site's VPN configuration to a blob
    Export {
        #[arg(long)]
        vwan: String,
        #[arg(long)]
        site_id: String,
        /// Writable blob URL (SAS)
        #[arg(long)]
        url: String,
        /// Create this storage container first
        #[arg(long)]
        container: Option<String>,
    },
    /// Download an exported configuration blob and print the hub gateway IPs
    Download {
        #[arg(long)]
        url: String,
        #[arg(long)]
        output: PathBuf,
    },
}

fn build_manager(cli: &Cli) -> Result<Arc<dyn ResourceManager>, Box<dyn Error>> {
    if cli.dry_run {
        let authorizer = Arc::new(StaticTokenAuthorizer::new("dry-run"));
        let identity = ResourceIdentity::from_env(authorizer)?;
        log::warn!("{}", "dry run: using the in-memory backend".on_blue());
        return Ok(Arc::new(InMemoryResourceManager::new(identity).with_pending_polls(0)));
    }

    let authorizer = Arc::new(CredentialAuthorizer::from_environment());
    let identity = match &cli.auth_file {
        Some(path) => ResourceIdentity::from_auth_file(
            path,
            &std::env::var("AZURE_RESOURCE_GROUP").unwrap_or_default(),
            &std::env::var("AZURE_LOCATION").unwrap_or_default(),
            authorizer,
        )?
        .with_storage_account(&std::env::var("AZURE_STORAGE_ACCOUNT").unwrap_or_default()),
        None => ResourceIdentity::from_env(authorizer)?,
    };
    log::debug!("{identity:?}");
    Ok(Arc::new(ArmClient::new(identity)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    // .env must be loaded before clap reads `env = ...` defaults.
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    log4rs::init_file(&cli.log_config, Default::default())?;
    log::info!("#Start main()");

    if let Commands::Download { url, output } = &cli.command {
        for config in download_vpn_configuration(url, output).await? {
            let site = &config.vpn_site_configuration.name;
            for (instance0, instance1) in config.gateway_addresses() {
                log::info!("{} gateway {instance0} / {instance1}", site.on_blue());
                println!("{site}: {instance0} {instance1}");
            }
        }
        return Ok(());
    }

    let manager = build_manager(&cli)?;
    let poll = PollSettings::from_env()?;

    match &cli.command {
        Commands::Apply {
            topology,
            site,
            with_resource_group,
        } => {
            let topology = Topology::load(topology)?;
            let site = NetworkSiteConfig::load(site)?;
            let defaults = topology.defaults.clone().with_env_overrides();
            let mut reconciler = Reconciler::new(manager, defaults, poll);
            if *with_resource_group {
                reconciler.ensure_resource_group().await?;
            }
            let report = reconciler.apply(&topology, &site).await?;
            println!("virtual wan:  {}", report.virtual_wan_id);
            println!("virtual hub:  {}", report.virtual_hub_id);
            if let Some(site_id) = &report.vpn_site_id {
                println!("vpn site:     {site_id}");
            }
            println!("vpn gateway:  {}", report.vpn_gateway_id);
        }
        Commands::Destroy { topology } => {
            let topology = Topology::load(topology)?;
            let defaults = topology.defaults.clone();
            let mut reconciler = Reconciler::new(manager, defaults, poll);
            let deleted = reconciler.teardown(&topology).await?;
            println!("deleted {deleted} resource(s)");
        }
        Commands::Export {
            vwan,
            site_id,
            url,
            container,
        } => {
            if let Some(container) = container {
                let mut reconciler = Reconciler::new(manager.clone(), Default::default(), poll);
                reconciler.ensure_storage_container(container).await?;
            }
            ConfigurationExporter::new(manager, poll)
                .export_site_config(vwan, site_id, url)
                .await?;
            println!("exported {site_id}");
        }
        Commands::Download { .. } => {}
    }

    log::info!("#End main()");
    Ok(())
}
