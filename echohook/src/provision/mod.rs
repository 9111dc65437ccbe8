//! Host provisioning for the receiver.
//!
//! Installs nginx (and certbot when a certificate is wanted), writes the
//! systemd unit and nginx site, starts everything, and probes `/health`.
//!
//! ## Flow
//!
//! ```text
//! validate → apt-get → env + unit → systemctl → nginx site → nginx -t/reload → certbot → /health
//! ```

pub mod health;
pub mod nginx;
pub mod packages;
pub mod runner;
pub mod systemd;
pub mod tls;
pub mod token;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::info;

pub use runner::{CommandLine, CommandRunner, DryRunRunner, SystemRunner};
pub use tls::TlsPlan;
pub use token::generate_token;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed with {status}")]
    CommandFailed { command: String, status: String },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("receiver not healthy after {attempts} attempt(s): {last_error}")]
    HealthCheck { attempts: u32, last_error: String },
}

/// Settings for one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Public host name; `None` serves any name over plain HTTP
    pub domain: Option<String>,

    /// Contact address for the certificate authority
    pub email: Option<String>,

    /// Shared secret written into the service environment
    pub token: String,

    /// Loopback port the receiver listens on
    pub port: u16,

    /// Largest request body accepted by nginx and the receiver
    pub max_body_bytes: usize,

    /// Installed receiver binary
    pub binary: PathBuf,

    /// Account the service runs as
    pub user: String,

    /// Filesystem root that config paths are written under
    pub root: PathBuf,

    /// Request a certificate when a domain is set
    pub tls: bool,

    /// Log commands and files instead of applying them
    pub dry_run: bool,
}

impl ProvisionConfig {
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        if self.max_body_bytes == 0 {
            return Err(invalid("max body size must be non-zero"));
        }

        if self.token.is_empty()
            || !self
                .token
                .chars()
                .all(|c| c.is_ascii_graphic() && !matches!(c, '"' | '\'' | '\\'))
        {
            return Err(invalid(
                "token must be non-empty printable ASCII without quotes or backslashes",
            ));
        }

        if let Some(domain) = &self.domain {
            if !is_valid_domain(domain) {
                return Err(invalid(format!("invalid domain {domain:?}")));
            }
        }

        if let Some(email) = &self.email {
            let mut parts = email.split('@');
            let well_formed = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(local), Some(host), None) if !local.is_empty() && !host.is_empty()
            );
            if !well_formed || email.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(invalid(format!("invalid email {email:?}")));
            }
        }

        if self.user.is_empty()
            || !self
                .user
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid(format!("invalid service user {:?}", self.user)));
        }

        if !self.binary.is_absolute() {
            return Err(invalid("binary path must be absolute"));
        }

        Ok(())
    }

    /// Receiver binary as seen under `root`.
    pub fn binary_under_root(&self) -> PathBuf {
        let relative = self.binary.strip_prefix("/").unwrap_or(&self.binary);
        self.root.join(relative)
    }

    /// Fail unless the receiver binary exists and is executable.
    ///
    /// systemd would otherwise start a unit whose `ExecStart` is missing.
    pub async fn check_binary(&self) -> Result<(), ProvisionError> {
        let path = self.binary_under_root();
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            invalid(format!("receiver binary {} not found: {e}", path.display()))
        })?;

        if !metadata.is_file() {
            return Err(invalid(format!(
                "receiver binary {} is not a file",
                path.display()
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(invalid(format!(
                    "receiver binary {} is not executable",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    pub fn health_url(&self) -> String {
        format!("http://127.0.0.1:{}/health", self.port)
    }
}

fn invalid(msg: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidConfig(msg.into())
}

fn is_valid_domain(domain: &str) -> bool {
    domain.len() <= 253
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Runs the provisioning steps through a [`CommandRunner`].
pub struct Provisioner<R> {
    config: ProvisionConfig,
    runner: R,
    health_attempts: u32,
    health_delay: Duration,
}

impl<R: CommandRunner> Provisioner<R> {
    pub fn new(config: ProvisionConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            health_attempts: 10,
            health_delay: Duration::from_secs(1),
        }
    }

    pub fn with_health_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.health_attempts = attempts;
        self.health_delay = delay;
        self
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Provision the host end to end.
    pub async fn run(&self) -> Result<(), ProvisionError> {
        let config = &self.config;
        config.validate()?;
        let tls_plan = tls::plan(config)?;
        if !config.dry_run {
            config.check_binary().await?;
        }

        info!(
            domain = ?config.domain,
            port = config.port,
            issue_certificate = tls_plan.issues_certificate(),
            dry_run = config.dry_run,
            root = %config.root.display(),
            "provision_starting"
        );

        self.run_all(packages::install_commands(tls_plan.issues_certificate()))
            .await?;

        self.write(systemd::ENV_PATH, &systemd::render_env(config), 0o600)
            .await?;
        self.write(systemd::UNIT_PATH, &systemd::render_unit(config), 0o644)
            .await?;
        self.run_all(systemd::service_commands()).await?;

        self.write(nginx::SITE_AVAILABLE_PATH, &nginx::render_site(config), 0o644)
            .await?;
        self.enable_site().await?;
        self.run_all(nginx::reload_commands()).await?;

        if let TlsPlan::Issue { domain, email } = &tls_plan {
            self.runner
                .run(&tls::certbot_command(domain, email))
                .await?;
        }

        if config.dry_run {
            info!(url = %config.health_url(), "health_check_skipped");
        } else {
            health::wait_healthy(&config.health_url(), self.health_attempts, self.health_delay)
                .await?;
        }

        info!(domain = ?config.domain, "provision_complete");
        Ok(())
    }

    async fn run_all(&self, commands: Vec<CommandLine>) -> Result<(), ProvisionError> {
        for command in &commands {
            self.runner.run(command).await?;
        }
        Ok(())
    }

    async fn write(&self, relative: &str, contents: &str, mode: u32) -> Result<(), ProvisionError> {
        let path = self.config.root.join(relative);
        if self.config.dry_run {
            info!(path = %path.display(), bytes = contents.len(), "provision_file_skipped");
            return Ok(());
        }
        write_file(&path, contents, mode).await
    }

    async fn enable_site(&self) -> Result<(), ProvisionError> {
        let target = self.config.root.join(nginx::SITE_AVAILABLE_PATH);
        let link = self.config.root.join(nginx::SITE_ENABLED_PATH);
        let default_site = self.config.root.join(nginx::DEFAULT_SITE_PATH);

        if self.config.dry_run {
            info!(link = %link.display(), target = %target.display(), "provision_link_skipped");
            return Ok(());
        }

        remove_if_present(&default_site).await?;
        remove_if_present(&link).await?;
        create_parent(&link).await?;

        #[cfg(unix)]
        let linked = tokio::fs::symlink(&target, &link).await;
        #[cfg(not(unix))]
        let linked = tokio::fs::copy(&target, &link).await.map(|_| ());

        linked.map_err(|source| ProvisionError::Io {
            path: link.clone(),
            source,
        })?;

        info!(link = %link.display(), target = %target.display(), "nginx_site_enabled");
        Ok(())
    }
}

/// Write the unit, environment file and nginx site into `dir` without
/// touching the system.
pub async fn render_to(config: &ProvisionConfig, dir: &Path) -> Result<Vec<PathBuf>, ProvisionError> {
    config.validate()?;

    let files = [
        ("echohook.service", systemd::render_unit(config), 0o644),
        ("echohook.env", systemd::render_env(config), 0o600),
        ("echohook.nginx.conf", nginx::render_site(config), 0o644),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, contents, mode) in files {
        let path = dir.join(name);
        write_file(&path, &contents, mode).await?;
        written.push(path);
    }

    Ok(written)
}

async fn create_parent(path: &Path) -> Result<(), ProvisionError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ProvisionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<(), ProvisionError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!(path = %path.display(), "provision_file_removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ProvisionError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn write_file(path: &Path, contents: &str, mode: u32) -> Result<(), ProvisionError> {
    create_parent(path).await?;

    let io_err = |source| ProvisionError::Io {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(path, contents).await.map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(io_err)?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    info!(path = %path.display(), bytes = contents.len(), "provision_file_written");
    Ok(())
}
