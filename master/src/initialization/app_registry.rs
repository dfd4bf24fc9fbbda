use apps::{builtin_apps, load_app_configs, AppRegistry, AppRegistryBuilder};
use config::Config;
use errors::*;

/// Registers the built-in applications plus any described in `--apps`.
pub fn initialize_app_registry(config: &Config) -> Result<AppRegistry> {
    let mut builder = AppRegistryBuilder::new();
    builder.apps(builtin_apps());

    if let Some(ref apps_file) = config.apps_file {
        let apps = load_app_configs(apps_file).chain_err(|| {
            format!("Unable to load applications from {}", apps_file.display())
        })?;
        builder.apps(apps);
    }

    let registry = builder.build().chain_err(
        || "Unable to build application registry",
    )?;
    debug!("{} applications registered", registry.len());
    Ok(registry)
}
