//! Echohook Provisioner - sets up the receiver on a Debian/Ubuntu host.
//!
//! Installs nginx (plus certbot when a certificate is requested), writes the
//! systemd unit and the nginx site, starts the service, and checks `/health`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use echohook::provision::{
    generate_token, render_to, DryRunRunner, ProvisionConfig, Provisioner, SystemRunner,
};

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "echohook-provision",
    about = "Provision the echohook webhook receiver behind nginx",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install packages, write config, start services, request a certificate
    Install(HostArgs),
    /// Write the unit, environment file and nginx site into a directory
    Render {
        #[command(flatten)]
        host: HostArgs,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Print a freshly generated webhook token
    Token,
}

#[derive(Args)]
struct HostArgs {
    /// Public domain name (omit to serve any host name over HTTP)
    #[arg(long, env = "ECHOHOOK_DOMAIN")]
    domain: Option<String>,
    /// Contact email for the certificate authority
    #[arg(long, env = "ECHOHOOK_EMAIL")]
    email: Option<String>,
    /// Shared secret (generated when omitted)
    #[arg(long, env = "WEBHOOK_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Loopback port for the receiver
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,
    /// Largest request body accepted, in bytes (nginx and receiver)
    #[arg(long, env = "WEBHOOK_MAX_BODY_BYTES", default_value = "1048576")]
    max_body_bytes: usize,
    /// Path of the installed receiver binary
    #[arg(long, env = "ECHOHOOK_BINARY", default_value = "/usr/local/bin/echohook")]
    binary: PathBuf,
    /// Service account
    #[arg(long, env = "ECHOHOOK_USER", default_value = "www-data")]
    user: String,
    /// Filesystem root that config files are written under
    #[arg(long, env = "ECHOHOOK_ROOT", default_value = "/")]
    root: PathBuf,
    /// Skip certificate issuance
    #[arg(long)]
    no_tls: bool,
    /// Log commands and files instead of applying them
    #[arg(long)]
    dry_run: bool,
}

impl HostArgs {
    fn into_config(self) -> ProvisionConfig {
        let token = match self.token.filter(|t| !t.trim().is_empty()) {
            Some(t) => t,
            None => {
                let t = generate_token();
                println!("generated webhook token: {t}");
                t
            }
        };

        ProvisionConfig {
            domain: self.domain.filter(|d| !d.trim().is_empty()),
            email: self.email.filter(|e| !e.trim().is_empty()),
            token,
            port: self.port,
            max_body_bytes: self.max_body_bytes,
            binary: self.binary,
            user: self.user,
            root: self.root,
            tls: !self.no_tls,
            dry_run: self.dry_run,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    match cli.command {
        Commands::Install(host) => cmd_install(host.into_config()).await,
        Commands::Render { host, out } => cmd_render(host.into_config(), out).await,
        Commands::Token => {
            println!("{}", generate_token());
            Ok(())
        }
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_install(config: ProvisionConfig) -> Result<()> {
    let result = if config.dry_run {
        Provisioner::new(config, DryRunRunner).run().await
    } else {
        Provisioner::new(config, SystemRunner).run().await
    };
    result.context("provisioning failed")?;

    info!("provisioner_finished");
    Ok(())
}

async fn cmd_render(config: ProvisionConfig, out: PathBuf) -> Result<()> {
    let written = render_to(&config, &out)
        .await
        .with_context(|| format!("render into {}", out.display()))?;

    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}
