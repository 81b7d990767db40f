use std::path::PathBuf;

use crate::migrate::ValidationMode;

use super::{Config, ConfigLayer};

/// Applies `layers` in order onto the defaults; later layers win.
pub fn merge_layers(layers: impl IntoIterator<Item = ConfigLayer>) -> Config {
    let mut config = Config::default();
    for layer in layers {
        layer.apply_to(&mut config);
    }
    config
}

pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// [`apply_env_overrides`] with an explicit variable lookup.
pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| {
        lookup(key)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    };

    if let Some(raw) = var("MIGRATE_CHANNEL_CAPACITY") {
        match raw.parse::<usize>() {
            Ok(value) => config.pipeline.channel_capacity = value,
            Err(err) => tracing::warn!("invalid MIGRATE_CHANNEL_CAPACITY, ignoring: {err}"),
        }
    }

    if let Some(raw) = var("MIGRATE_VALIDATION") {
        match ValidationMode::parse(&raw) {
            Some(mode) => config.validation = mode,
            None => tracing::warn!("invalid MIGRATE_VALIDATION `{raw}`, ignoring"),
        }
    }

    if let Some(raw) = var("MIGRATE_PROGRESS_PATH") {
        config.progress.path = Some(PathBuf::from(raw));
    }
}
