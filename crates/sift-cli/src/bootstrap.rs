use sift_config::SiftConfig;

use crate::cli::GlobalFlags;

/// Load layered configuration and apply command-line overrides.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<SiftConfig> {
    let mut config = SiftConfig::load_with_dotenv()?;
    apply_overrides(&mut config, flags);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut SiftConfig, flags: &GlobalFlags) {
    if let Some(db) = &flags.db {
        tracing::debug!(path = %db, "database path overridden from command line");
        config.database.path.clone_from(db);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::cli::{GlobalFlags, OutputFormat};

    use super::*;

    fn flags(db: Option<&str>) -> GlobalFlags {
        GlobalFlags {
            format: OutputFormat::Json,
            limit: None,
            quiet: false,
            verbose: false,
            db: db.map(str::to_string),
        }
    }

    #[test]
    fn db_flag_overrides_config_path() {
        let mut config = SiftConfig::default();
        apply_overrides(&mut config, &flags(Some("/tmp/other.db")));
        assert_eq!(config.database.path, "/tmp/other.db");
    }

    #[test]
    fn no_flag_keeps_config_path() {
        let mut config = SiftConfig::default();
        let before = config.database.path.clone();
        apply_overrides(&mut config, &flags(None));
        assert_eq!(config.database.path, before);
    }
}
