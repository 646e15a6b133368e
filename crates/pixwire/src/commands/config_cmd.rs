//! Config subcommand handlers.

use std::collections::BTreeMap;

use dialoguer::{Confirm, Input};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Defaults, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "auto_snap = {}", cfg.defaults.auto_snap);
    let _ = writeln!(out, "snap_radius = {}", cfg.defaults.snap_radius);
    let _ = writeln!(out, "feed = {}", cfg.defaults.feed);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        if let Some(ref server) = p.server {
            let _ = writeln!(out, "server = \"{server}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(feed) = p.feed {
            let _ = writeln!(out, "feed = {feed}");
        }
        if let Some(auto_snap) = p.auto_snap {
            let _ = writeln!(out, "auto_snap = {auto_snap}");
        }
        if let Some(radius) = p.snap_radius {
            let _ = writeln!(out, "snap_radius = {radius}");
        }
        if let Some(ports) = p.ports_per_board {
            let _ = writeln!(out, "ports_per_board = {ports}");
        }
        if let Some(ref names) = p.shared_port_names {
            let quoted: Vec<_> = names.iter().map(|n| format!("\"{n}\"")).collect();
            let _ = writeln!(out, "shared_port_names = [{}]", quoted.join(", "));
        }
        if let Some(max) = p.shared_port_max_pixels {
            let _ = writeln!(out, "shared_port_max_pixels = {max}");
        }
    }

    out
}

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    CliError::ProfileNotFound {
        name,
        available: config::available_profiles(cfg),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("pixwire configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let server: String = Input::new()
                .with_prompt("Diagram server URL (blank for file-only use)")
                .default("http://localhost:3001".into())
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;

            let ports_per_board: usize = Input::new()
                .with_prompt("Ports per differential board")
                .default(usize::from(pixwire_core::config::DEFAULT_PORTS_PER_BOARD.get()))
                .interact_text()
                .map_err(prompt_err)?;

            let feed = Confirm::new()
                .with_prompt("Follow the controller feed?")
                .default(true)
                .interact()
                .map_err(prompt_err)?;

            let profile = Profile {
                server: (!server.trim().is_empty()).then(|| server.trim().to_owned()),
                feed: Some(feed),
                ports_per_board: Some(ports_per_board),
                ..Profile::default()
            };

            // Validate before touching disk.
            config::resolve_profile(&profile, &Defaults::default())?;

            let mut profiles = BTreeMap::new();
            profiles.insert(profile_name.clone(), profile);
            let cfg = Config {
                default_profile: Some(profile_name.clone()),
                defaults: Defaults::default(),
                profiles,
            };

            let written = config::save_config(&cfg)?;
            eprintln!("\n✓ Configuration written to {}", written.display());
            eprintln!("  Active profile: {profile_name}");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(&global.output, &cfg, format_config, |c| {
                config::active_profile_name(global, c)
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = config::active_profile_name(global, &cfg);
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: pixwire config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if *name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn formatted_config_lists_profile_overrides() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "stage".into(),
            Profile {
                server: Some("http://stage:3001".into()),
                shared_port_names: Some(vec!["A".into(), "B".into()]),
                ..Profile::default()
            },
        );
        let text = format_config(&cfg);
        assert!(text.contains("default_profile = \"default\""));
        assert!(text.contains("[profiles.stage]"));
        assert!(text.contains("server = \"http://stage:3001\""));
        assert!(text.contains("shared_port_names = [\"A\", \"B\"]"));
        assert!(!text.contains("ports_per_board"));
    }
}
