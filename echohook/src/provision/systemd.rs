//! systemd unit and environment file.

use super::runner::CommandLine;
use super::ProvisionConfig;

pub const SERVICE_NAME: &str = "echohook";

/// Unit file location, relative to the provisioning root.
pub const UNIT_PATH: &str = "etc/systemd/system/echohook.service";

/// Environment file location, relative to the provisioning root.
pub const ENV_PATH: &str = "etc/echohook/echohook.env";

/// Render the service unit.
///
/// systemd restarts the receiver whenever it exits. `Type=exec` makes
/// `systemctl start` fail when the binary cannot be executed.
pub fn render_unit(config: &ProvisionConfig) -> String {
    format!(
        r#"[Unit]
Description=Echohook webhook receiver
After=network-online.target
Wants=network-online.target

[Service]
Type=exec
User={user}
EnvironmentFile=/{env_path}
ExecStart={binary}
Restart=always
RestartSec=3
NoNewPrivileges=true

[Install]
WantedBy=multi-user.target
"#,
        user = config.user,
        env_path = ENV_PATH,
        binary = config.binary.display(),
    )
}

/// Render the environment file read by the unit.
pub fn render_env(config: &ProvisionConfig) -> String {
    format!(
        "HOST=127.0.0.1\nPORT={}\nWEBHOOK_TOKEN={}\nWEBHOOK_MAX_BODY_BYTES={}\nRUST_LOG=info\n",
        config.port, config.token, config.max_body_bytes
    )
}

/// Reload units, enable the service, and restart it so new settings apply.
pub fn service_commands() -> Vec<CommandLine> {
    vec![
        CommandLine::new("systemctl", ["daemon-reload"]),
        CommandLine::new("systemctl", ["enable", "--now", SERVICE_NAME]),
        CommandLine::new("systemctl", ["restart", SERVICE_NAME]),
    ]
}
