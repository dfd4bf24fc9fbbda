use std::collections::HashMap;
use std::sync::Arc;

use apps::AppDescriptor;
use errors::*;

/// `AppRegistry` maps an application name to its `AppDescriptor`.
///
/// It is built once at startup with the `AppRegistryBuilder` and is read-only afterwards, so it
/// can be shared between the scheduling loop and the job monitors without locking.
#[derive(Debug, Default)]
pub struct AppRegistry {
    apps: HashMap<String, Arc<AppDescriptor>>,
}

impl AppRegistry {
    /// Looks an application up by exact name.
    pub fn resolve(&self, name: &str) -> Result<Arc<AppDescriptor>> {
        match self.apps.get(name) {
            Some(app) => Ok(Arc::clone(app)),
            None => Err(ErrorKind::AppNotFound(name.to_owned()).into()),
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.apps.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// `AppRegistryBuilder` is used to create an `AppRegistry`.
#[derive(Default)]
pub struct AppRegistryBuilder {
    apps: Vec<AppDescriptor>,
}

impl AppRegistryBuilder {
    pub fn new() -> AppRegistryBuilder {
        Default::default()
    }

    pub fn app(&mut self, app: AppDescriptor) -> &mut AppRegistryBuilder {
        self.apps.push(app);
        self
    }

    pub fn apps<I: IntoIterator<Item = AppDescriptor>>(&mut self, apps: I) -> &mut AppRegistryBuilder {
        self.apps.extend(apps);
        self
    }

    /// Fails if two descriptors share a name.
    pub fn build(&mut self) -> Result<AppRegistry> {
        let mut apps = HashMap::new();
        for app in self.apps.drain(..) {
            if apps.contains_key(&app.name) {
                return Err(ErrorKind::DuplicateApp(app.name).into());
            }
            info!("Registered app {} ({})", app.name, app.image_reference());
            apps.insert(app.name.clone(), Arc::new(app));
        }

        Ok(AppRegistry { apps: apps })
    }
}
