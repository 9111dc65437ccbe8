//! System packages installed with apt.

use super::runner::CommandLine;

/// Reverse proxy, always installed.
pub const BASE_PACKAGES: &[&str] = &["nginx"];

/// Certificate tooling, installed only when a certificate will be issued.
pub const TLS_PACKAGES: &[&str] = &["certbot", "python3-certbot-nginx"];

/// Packages required for this run.
pub fn required_packages(with_tls: bool) -> Vec<&'static str> {
    let mut packages = BASE_PACKAGES.to_vec();
    if with_tls {
        packages.extend_from_slice(TLS_PACKAGES);
    }
    packages
}

/// `apt-get update` followed by a non-interactive install.
pub fn install_commands(with_tls: bool) -> Vec<CommandLine> {
    let mut install = vec!["install".to_string(), "-y".to_string()];
    install.extend(required_packages(with_tls).into_iter().map(String::from));

    vec![
        CommandLine::new("apt-get", ["update"]),
        CommandLine::new("apt-get", install),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_packages() {
        assert_eq!(required_packages(false), vec!["nginx"]);
        assert_eq!(
            required_packages(true),
            vec!["nginx", "certbot", "python3-certbot-nginx"]
        );
    }

    #[test]
    fn test_install_commands() {
        let cmds = install_commands(true);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].to_string(), "apt-get update");
        assert_eq!(
            cmds[1].to_string(),
            "apt-get install -y nginx certbot python3-certbot-nginx"
        );
    }
}
