//! Config subcommand handlers.

use std::fmt::Write;

use uhome_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "poll_interval = {}", cfg.defaults.poll_interval);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "client_id = \"{}\"", p.client_id);
        if p.client_secret.is_some() {
            let _ = writeln!(out, "client_secret = \"****\"");
        }
        if let Some(ref env) = p.client_secret_env {
            let _ = writeln!(out, "client_secret_env = \"{env}\"");
        }
        for (key, value) in [
            ("scope", &p.scope),
            ("redirect_uri", &p.redirect_uri),
            ("api_url", &p.api_url),
            ("authorize_url", &p.authorize_url),
            ("token_url", &p.token_url),
        ] {
            if let Some(value) = value {
                let _ = writeln!(out, "{key} = \"{value}\"");
            }
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(interval) = p.poll_interval {
            let _ = writeln!(out, "poll_interval = {interval}");
        }
        let _ = writeln!(out, "push_enabled = {}", p.push_enabled);
        if !p.push_devices.is_empty() {
            let _ = writeln!(out, "push_devices = {:?}", p.push_devices);
        }
    }

    out
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(uhome_config::config_path);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
        }

        ConfigCommand::Show => {
            let cfg = uhome_config::load_config_from(&path)?;
            let out = match global.output {
                OutputFormat::Json | OutputFormat::JsonCompact => {
                    let mut redacted = serde_json::to_value(&cfg)?;
                    if let Some(profiles) = redacted
                        .get_mut("profiles")
                        .and_then(serde_json::Value::as_object_mut)
                    {
                        for profile in profiles.values_mut() {
                            if let Some(secret) = profile.get_mut("client_secret") {
                                if !secret.is_null() {
                                    *secret = "****".into();
                                }
                            }
                        }
                    }
                    output::render_json(&redacted, global.output == OutputFormat::JsonCompact)
                }
                _ => format_config_redacted(&cfg),
            };
            output::print_output(out.trim_end(), global.quiet);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use uhome_config::Profile;

    use super::*;

    #[test]
    fn redacted_output_masks_client_secret() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                client_id: "abc".into(),
                client_secret: Some("hunter2".into()),
                ..Profile::default()
            },
        );
        let out = format_config_redacted(&cfg);
        assert!(out.contains("[profiles.home]"));
        assert!(out.contains("client_secret = \"****\""));
        assert!(!out.contains("hunter2"));
    }
}
