use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json;
use serde_json::Value;

use apps::{AppDescriptor, AppHandler, VolumeMount, WorkdirPolicy};
use common::Job;
use errors::*;

/// How a finished job's stdout is turned into its result payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultExtractor {
    None,
    /// Lines made of exactly two whitespace separated columns become `{key: value}`, with dots
    /// in keys replaced by underscores.
    KeyValue,
    /// The whole of stdout is parsed as a JSON document.
    StdoutJson,
}

impl Default for ResultExtractor {
    fn default() -> Self {
        ResultExtractor::None
    }
}

fn default_tag() -> String {
    "latest".to_owned()
}

/// `AppConfig` is the on-disk form of an application, as found in the `--apps` file.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub image: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub threads: Option<u32>,
    #[serde(default)]
    pub memory_gb: Option<u64>,
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
    #[serde(default)]
    pub create_dir: bool,
    pub command: String,
    #[serde(default)]
    pub result: ResultExtractor,
}

/// `TemplateApp` expands a command template such as `rabin2 -I {input}`.
///
/// Supported placeholders are `{input}`, `{workdir}` and `{param.<key>}`. The expanded command
/// is split on whitespace.
pub struct TemplateApp {
    template: String,
    extractor: ResultExtractor,
}

impl TemplateApp {
    pub fn new<S: Into<String>>(template: S, extractor: ResultExtractor) -> Result<Self> {
        let template = template.into();
        validate_template(&template)?;
        Ok(TemplateApp {
            template: template,
            extractor: extractor,
        })
    }
}

impl AppHandler for TemplateApp {
    fn command(&self, job: &Job) -> Result<Vec<String>> {
        let expanded = expand(&self.template, job)?;
        Ok(expanded.split_whitespace().map(|s| s.to_owned()).collect())
    }

    fn extract_result(&self, job: &Job) -> Result<Option<Value>> {
        match self.extractor {
            ResultExtractor::None => Ok(None),
            ResultExtractor::KeyValue => Ok(Some(key_value_result(&job.stdout))),
            ResultExtractor::StdoutJson => {
                let document = job.stdout.join("\n");
                let value = serde_json::from_str(&document).chain_err(
                    || "Standard output is not a JSON document",
                )?;
                Ok(Some(value))
            }
        }
    }
}

fn key_value_result(lines: &[String]) -> Value {
    let mut result = BTreeMap::new();
    for line in lines {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() == 2 {
            result.insert(columns[0].replace('.', "_"), Value::String(columns[1].to_owned()));
        }
    }
    json!(result)
}

// Returns the placeholder names used in a template, in order.
fn placeholders(template: &str) -> Result<Vec<&str>> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let end = rest[start..].find('}').chain_err(|| {
            format!("Unterminated placeholder in command '{}'", template)
        })?;
        names.push(&rest[start + 1..start + end]);
        rest = &rest[start + end + 1..];
    }
    Ok(names)
}

fn validate_template(template: &str) -> Result<()> {
    if template.trim().is_empty() {
        return Err("Command template is empty".into());
    }
    for name in placeholders(template)? {
        let known = name == "input" || name == "workdir" ||
            (name.starts_with("param.") && name.len() > "param.".len());
        if !known {
            return Err(format!("Unknown placeholder {{{}}} in command '{}'", name, template).into());
        }
    }
    Ok(())
}

fn placeholder_value(name: &str, job: &Job) -> Result<String> {
    if name == "input" {
        return job.input.clone().chain_err(|| "Job has no input");
    }
    if name == "workdir" {
        let workdir = job.workdir.as_ref().chain_err(
            || "App has no working directory",
        )?;
        return Ok(workdir.to_string_lossy().into_owned());
    }

    let key = &name["param.".len()..];
    match job.params.get(key) {
        Some(&Value::String(ref s)) => Ok(s.clone()),
        Some(value) => Ok(value.to_string()),
        None => Err(format!("Job has no parameter '{}'", key).into()),
    }
}

fn expand(template: &str, job: &Job) -> Result<String> {
    let mut expanded = String::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let end = rest[start..].find('}').chain_err(|| {
            format!("Unterminated placeholder in command '{}'", template)
        })?;
        expanded.push_str(&rest[..start]);
        expanded.push_str(&placeholder_value(&rest[start + 1..start + end], job)?);
        rest = &rest[start + end + 1..];
    }
    expanded.push_str(rest);
    Ok(expanded)
}

impl AppConfig {
    pub fn into_descriptor(self) -> Result<AppDescriptor> {
        if self.threads == Some(0) {
            return Err(format!("App {} requests zero threads", self.name).into());
        }
        let name = self.name.clone();
        let handler = TemplateApp::new(self.command, self.result).chain_err(|| {
            format!("Malformed command for app {}", name)
        })?;

        let mut app = AppDescriptor::new(self.name, self.image, Box::new(handler));
        app.tag = self.tag;
        app.threads = self.threads;
        app.memory_gb = self.memory_gb;
        app.volumes = self.volumes;
        app.workdir = if self.create_dir {
            WorkdirPolicy::PerJob
        } else {
            WorkdirPolicy::None
        };
        Ok(app)
    }
}

/// Loads application descriptors from a JSON file holding an array of `AppConfig`s.
pub fn load_app_configs(path: &Path) -> Result<Vec<AppDescriptor>> {
    let mut file = File::open(path).chain_err(|| {
        format!("Unable to open apps file {}", path.display())
    })?;
    let mut data = String::new();
    file.read_to_string(&mut data).chain_err(
        || "Unable to read apps file",
    )?;

    let configs: Vec<AppConfig> = serde_json::from_str(&data).chain_err(|| {
        format!("Malformed apps file {}", path.display())
    })?;

    let mut apps = Vec::new();
    for config in configs {
        apps.push(config.into_descriptor()?);
    }
    Ok(apps)
}
