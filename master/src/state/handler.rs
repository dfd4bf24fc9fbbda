use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json;
use serde_json::Value;

use errors::*;
use store::MemoryJobStore;
use util::state::SimpleStateHandling;

const DUMP_FILE: &str = "master.dump";
const TEMP_DUMP_FILE: &str = "temp.dump";

/// `StateHandler` saves the job store to `<dir>/master.dump` and restores it at startup.
pub struct StateHandler {
    store: Arc<MemoryJobStore>,
    dump_dir: PathBuf,
}

impl StateHandler {
    pub fn new(store: Arc<MemoryJobStore>, create_dir: bool, dir: &Path) -> Result<Self> {
        if create_dir {
            fs::create_dir_all(dir).chain_err(|| {
                format!("Unable to create state directory {}", dir.display())
            })?;
        }

        Ok(StateHandler {
            store: store,
            dump_dir: dir.to_owned(),
        })
    }

    pub fn dump_file(&self) -> PathBuf {
        self.dump_dir.join(DUMP_FILE)
    }

    pub fn dump_state(&self) -> Result<()> {
        let dump = json!({
            "store": self.store.dump_state().chain_err(|| "Unable to dump job store")?,
        });

        // The previous dump is only replaced once the new one is fully written.
        let temp_path = self.dump_dir.join(TEMP_DUMP_FILE);
        {
            let file = File::create(&temp_path).chain_err(|| {
                format!("Unable to create {}", temp_path.display())
            })?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &dump).chain_err(
                || "Unable to write state dump",
            )?;
            writer.flush().chain_err(|| "Unable to flush state dump")?;
        }

        fs::rename(&temp_path, self.dump_file()).chain_err(|| {
            format!("Unable to move state dump into {}", self.dump_file().display())
        })?;

        Ok(())
    }

    pub fn load_state(&self) -> Result<()> {
        let path = self.dump_file();
        info!("Loading job store from {}", path.display());

        let file = File::open(&path).chain_err(|| {
            format!("Unable to open {}", path.display())
        })?;
        let mut dump: Value = serde_json::from_reader(BufReader::new(file)).chain_err(
            || "State dump is not valid JSON",
        )?;

        let store_json = match dump.get_mut("store") {
            Some(store) if !store.is_null() => store.take(),
            _ => return Err("State dump has no job store".into()),
        };

        self.store.load_state(store_json).chain_err(
            || "Unable to restore job store",
        )?;
        Ok(())
    }
}
