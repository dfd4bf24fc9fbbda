use serde_json::Value;

use apps::{AppDescriptor, AppHandler};
use common::Job;
use errors::*;

/// `TestApp` runs a shell in a small image. It echoes `params.app.echo`, sleeps for
/// `params.app.time` seconds and exits with `params.app.exit_code`, which makes it handy for
/// checking a fleet end to end.
pub struct TestApp;

impl TestApp {
    pub fn descriptor() -> AppDescriptor {
        let mut app = AppDescriptor::new("Test", "alpine", Box::new(TestApp));
        app.threads = Some(1);
        app
    }
}

fn app_param<'a>(job: &'a Job, key: &str) -> Option<&'a Value> {
    job.params.get("app").and_then(|app| app.get(key))
}

impl AppHandler for TestApp {
    fn command(&self, job: &Job) -> Result<Vec<String>> {
        let echo = match app_param(job, "echo") {
            Some(&Value::String(ref s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "test".to_owned(),
        };
        let time = match app_param(job, "time") {
            Some(value) => value.as_u64().chain_err(|| "params.app.time must be an integer")?,
            None => 0,
        };
        let exit_code = match app_param(job, "exit_code") {
            Some(value) => {
                value.as_i64().chain_err(
                    || "params.app.exit_code must be an integer",
                )?
            }
            None => 0,
        };

        let script = format!(
            "echo '{}'; sleep {}; exit {}",
            echo.replace('\'', "'\\''"),
            time,
            exit_code
        );
        Ok(vec!["sh".to_owned(), "-c".to_owned(), script])
    }

    fn extract_result(&self, job: &Job) -> Result<Option<Value>> {
        Ok(Some(json!({ "lines": job.stdout.len() })))
    }
}

/// Applications compiled into the master.
pub fn builtin_apps() -> Vec<AppDescriptor> {
    vec![TestApp::descriptor()]
}
