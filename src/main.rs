use color_eyre::eyre::{Result, WrapErr};
use fwdproxy::{ConfigFile, DescriptorSource, ProxyConfig, ProxyServer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fwdproxy=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(config_path) = args.get(1).map(PathBuf::from) else {
        eprintln!("Usage: fwdproxy <config.json>");
        eprintln!();
        eprintln!("The config file is JSON:");
        eprintln!("  {{");
        eprintln!("    \"mail\": \"operator@example.com\",");
        eprintln!("    \"blocked\": [\"/secret.html\"],");
        eprintln!("    \"forbidden_words\": [{{\"proxy\": \"[REDACTED]\"}}],");
        eprintln!("    \"listen\": \"127.0.0.1:8888\"");
        eprintln!("  }}");
        std::process::exit(1);
    };

    // Fail fast on a broken config; connections re-read it afterwards
    let file = ConfigFile::load(&config_path)
        .await
        .wrap_err("Failed to load proxy configuration")?;
    let config = ProxyConfig::default().with_file_overrides(&file);

    info!(
        address = %config.bind_addr,
        max_connections = config.max_connections,
        config = %config_path.display(),
        blocked = file.blocked.len(),
        forbidden_words = file.forbidden_words.len(),
        "Starting forwarding proxy"
    );

    let server = ProxyServer::new(config, DescriptorSource::File(config_path));
    server.run().await.wrap_err("Failed to run forwarding proxy")?;

    Ok(())
}
