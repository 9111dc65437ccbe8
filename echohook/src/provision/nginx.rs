//! nginx reverse-proxy site.

use super::runner::CommandLine;
use super::ProvisionConfig;

/// Site file location, relative to the provisioning root.
pub const SITE_AVAILABLE_PATH: &str = "etc/nginx/sites-available/echohook";

/// Enabled-site link, relative to the provisioning root.
pub const SITE_ENABLED_PATH: &str = "etc/nginx/sites-enabled/echohook";

/// Distribution default site, unlinked so it cannot shadow ours.
pub const DEFAULT_SITE_PATH: &str = "etc/nginx/sites-enabled/default";

/// Render the server block proxying to the loopback receiver.
///
/// nginx's body limit is the same byte count the receiver is given through
/// `WEBHOOK_MAX_BODY_BYTES`.
pub fn render_site(config: &ProvisionConfig) -> String {
    let server_name = config.domain.as_deref().unwrap_or("_");

    format!(
        r#"server {{
    listen 80;
    listen [::]:80;
    server_name {server_name};

    client_max_body_size {max_body};

    location / {{
        proxy_pass http://127.0.0.1:{port};
        proxy_http_version 1.1;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }}
}}
"#,
        port = config.port,
        max_body = config.max_body_bytes,
    )
}

/// Validate the configuration, then reload.
pub fn reload_commands() -> Vec<CommandLine> {
    vec![
        CommandLine::new("nginx", ["-t"]),
        CommandLine::new("systemctl", ["reload", "nginx"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::tests::sample_config;

    #[test]
    fn test_render_site_with_domain() {
        let mut config = sample_config();
        config.domain = Some("hooks.example.com".to_string());
        config.port = 5000;
        config.max_body_bytes = 8_388_608;

        let site = render_site(&config);
        assert!(site.contains("server_name hooks.example.com;"));
        assert!(site.contains("proxy_pass http://127.0.0.1:5000;"));
        assert!(site.contains("proxy_set_header X-Forwarded-Proto $scheme;"));
        assert!(site.contains("client_max_body_size 8388608;"));
    }

    #[test]
    fn test_render_site_catch_all() {
        let site = render_site(&sample_config());
        assert!(site.contains("server_name _;"));
        assert!(site.starts_with("server {\n"));
        assert!(site.ends_with("}\n"));
    }
}
