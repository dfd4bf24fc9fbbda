//! The App Registry: one `AppDescriptor` per supported application, looked up by exact name.

pub use self::builtin::{builtin_apps, TestApp};
pub use self::descriptor::{AppDescriptor, AppHandler, VolumeMount, WorkdirPolicy};
pub use self::registry::{AppRegistry, AppRegistryBuilder};
pub use self::templates::{load_app_configs, AppConfig, ResultExtractor, TemplateApp};

mod builtin;
mod descriptor;
mod registry;
mod templates;
