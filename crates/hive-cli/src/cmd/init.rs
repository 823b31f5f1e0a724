use crate::output::print_json;
use anyhow::{bail, Context};
use hive_core::backend::open_backend;
use hive_core::config::{ApiKeyEntry, BackendKind, Config, Role};
use hive_core::{io, paths, state::SharedState};
use hive_inbox::auth::{generate_api_key, generate_secret};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, backend: &str, json: bool) -> anyhow::Result<()> {
    if paths::config_path(root).exists() {
        bail!("already initialized: {} exists", paths::CONFIG_FILE);
    }

    let backend = match backend {
        "json" => BackendKind::Json,
        "sqlite" => BackendKind::Sqlite,
        other => bail!("unknown backend '{other}' (expected json or sqlite)"),
    };

    let project = match name {
        Some(n) => n.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "hive".to_string()),
    };

    io::ensure_dir(&paths::hive_dir(root))?;

    let admin_key = generate_api_key();
    let mut config = Config::new(&project);
    config.backend = backend;
    config.auth_secret = generate_secret();
    config.api_keys.push(ApiKeyEntry {
        key: admin_key.clone(),
        name: "admin".to_string(),
        role: Role::Admin,
    });
    config.save(root).context("failed to write config")?;

    // Write an empty state document so the first load is not a cold miss.
    let state = SharedState::new();
    open_backend(root, &config)?
        .save(&state)
        .context("failed to write initial state")?;

    if json {
        print_json(&serde_json::json!({
            "project": project,
            "backend": backend,
            "admin_key": admin_key,
        }))?;
    } else {
        println!("Initialized hive project '{project}' ({} backend)", config.backend);
        println!("Admin API key (store this, it is not shown again): {admin_key}");
    }
    Ok(())
}
