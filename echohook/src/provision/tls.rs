//! Certificate issuance through certbot's nginx plugin.

use tracing::warn;

use super::runner::CommandLine;
use super::{ProvisionConfig, ProvisionError};

/// What to do about TLS for a given configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsPlan {
    /// Plain HTTP only.
    Disabled,
    /// TLS was requested but there is no domain to issue for.
    NoDomain,
    Issue { domain: String, email: String },
}

impl TlsPlan {
    pub fn issues_certificate(&self) -> bool {
        matches!(self, TlsPlan::Issue { .. })
    }
}

/// Decide the TLS plan. A domain without an email is a configuration error.
pub fn plan(config: &ProvisionConfig) -> Result<TlsPlan, ProvisionError> {
    if !config.tls {
        return Ok(TlsPlan::Disabled);
    }

    let Some(domain) = config.domain.clone() else {
        warn!("tls_skipped_no_domain");
        return Ok(TlsPlan::NoDomain);
    };

    match config.email.clone() {
        Some(email) => Ok(TlsPlan::Issue { domain, email }),
        None => Err(ProvisionError::InvalidConfig(
            "an email is required to request a certificate (use --email or --no-tls)".into(),
        )),
    }
}

/// certbot obtains the certificate and rewrites the nginx site for HTTPS.
pub fn certbot_command(domain: &str, email: &str) -> CommandLine {
    CommandLine::new(
        "certbot",
        [
            "--nginx",
            "--non-interactive",
            "--agree-tos",
            "-m",
            email,
            "-d",
            domain,
            "--redirect",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::tests::sample_config;

    #[test]
    fn test_plan_disabled() {
        let mut config = sample_config();
        config.tls = false;
        config.domain = Some("hooks.example.com".into());
        assert_eq!(plan(&config).unwrap(), TlsPlan::Disabled);
    }

    #[test]
    fn test_plan_without_domain() {
        let config = sample_config();
        assert_eq!(plan(&config).unwrap(), TlsPlan::NoDomain);
    }

    #[test]
    fn test_plan_requires_email() {
        let mut config = sample_config();
        config.domain = Some("hooks.example.com".into());
        assert!(matches!(
            plan(&config),
            Err(ProvisionError::InvalidConfig(_))
        ));

        config.email = Some("ops@example.com".into());
        let tls = plan(&config).unwrap();
        assert!(tls.issues_certificate());
    }

    #[test]
    fn test_certbot_command() {
        let cmd = certbot_command("hooks.example.com", "ops@example.com");
        assert_eq!(
            cmd.to_string(),
            "certbot --nginx --non-interactive --agree-tos -m ops@example.com \
             -d hooks.example.com --redirect"
        );
    }
}
