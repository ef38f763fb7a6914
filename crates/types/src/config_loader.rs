// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::path::PathBuf;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::debug;

use crate::config::{InvalidConfigurationError, SourceCoordinationOptions};

const ENV_PREFIX: &str = "SLUICE_";

#[derive(thiserror::Error, Debug)]
pub enum ConfigLoadError {
    #[error("configuration loading error: {0}")]
    Figment(Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] InvalidConfigurationError),
}

// Because thiserror doesn't support auto-boxing or auto implements From with boxing.
impl From<figment::Error> for ConfigLoadError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

/// Loads [`SourceCoordinationOptions`] by layering, in increasing precedence: defaults,
/// an optional TOML file, and `SLUICE_`-prefixed environment variables
/// (`SLUICE_DEFAULT_LEASE_DURATION=5m` sets `default-lease-duration`).
#[derive(Debug, Default, derive_builder::Builder)]
#[builder(default)]
pub struct ConfigLoader {
    #[builder(setter(strip_option, into))]
    path: Option<PathBuf>,
    load_env: bool,
    #[builder(setter(strip_option))]
    custom_default: Option<SourceCoordinationOptions>,
}

impl ConfigLoader {
    pub fn load_once(&self) -> Result<SourceCoordinationOptions, ConfigLoadError> {
        let defaults = self.custom_default.clone().unwrap_or_default();

        let mut figment = Figment::from(Serialized::defaults(defaults));
        if let Some(path) = &self.path {
            debug!(path = %path.display(), "Loading source coordination options");
            figment = figment.merge(Toml::file_exact(path.as_path()));
        }

        if self.load_env {
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .split("__")
                    .map(|k| k.as_str().replace('_', "-").into()),
            );
        }

        let options: SourceCoordinationOptions = figment.extract()?;
        options.validate()?;

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use figment::Jail;

    use super::*;
    use crate::identifiers::OwnerId;

    #[test]
    fn toml_file_overrides_defaults() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            r#"
source-identifier = "orders-db"
partition-prefix = "pipeline-a"
owner-id = "node-7"
default-lease-duration = "45s"
"#
        )?;

        let options = ConfigLoaderBuilder::default()
            .path(file.path())
            .build()?
            .load_once()?;

        assert_eq!(
            options.source_identifier()?.to_string(),
            "pipeline-a|orders-db"
        );
        assert_eq!(options.owner_id(), OwnerId::new("node-7"));
        assert_eq!(options.default_lease_duration(), Duration::from_secs(45));
        Ok(())
    }

    #[test]
    fn invalid_file_content_is_rejected() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, r#"source-identifier = "orders|db""#)?;

        let result = ConfigLoaderBuilder::default()
            .path(file.path())
            .build()?
            .load_once();

        assert!(matches!(result, Err(ConfigLoadError::InvalidConfiguration(_))));
        Ok(())
    }

    #[test]
    fn environment_overrides_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "sluice.toml",
                r#"
source-identifier = "orders-db"
default-lease-duration = "45s"
"#,
            )?;
            jail.set_env("SLUICE_DEFAULT_LEASE_DURATION", "5m");
            jail.set_env("SLUICE_OWNER_ID", "node-env");

            let options = ConfigLoaderBuilder::default()
                .path("sluice.toml")
                .load_env(true)
                .build()
                .map_err(|e| e.to_string())?
                .load_once()
                .map_err(|e| e.to_string())?;

            assert_eq!(options.default_lease_duration(), Duration::from_secs(300));
            assert_eq!(options.owner_id(), OwnerId::new("node-env"));
            let source_identifier = options.source_identifier().map_err(|e| e.to_string())?;
            assert_eq!(source_identifier.to_string(), "orders-db");
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() -> anyhow::Result<()> {
        let result = ConfigLoaderBuilder::default()
            .path("/definitely/not/here/sluice.toml")
            .build()?
            .load_once();

        assert!(matches!(result, Err(ConfigLoadError::Figment(_))));
        Ok(())
    }
}
