use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use errors::*;
use store::JobStore;
use submission::{find_batch, write_batch};

/// Submits every job spec of a JSON lines file. The new job ids are not needed by the caller
/// so they are discarded.
///
/// With a batch name the file is submitted only if no batch of that name exists yet, so a
/// restarted master does not submit the same jobs twice.
pub fn submit_from_file(store: &JobStore, path: &Path, batch: Option<&str>) -> Result<usize> {
    if let Some(name) = batch {
        if let Some(ids) = find_batch(store, name)? {
            info!("Batch {} already holds {} jobs, not submitting {}", name, ids.len(), path.display());
            return Ok(0);
        }
    }

    let file = File::open(path).chain_err(|| {
        format!("Unable to open job specs file {}", path.display())
    })?;

    let submitted = write_batch(store, BufReader::new(file), &mut io::sink(), batch)
        .chain_err(|| format!("Unable to submit jobs from {}", path.display()))?;
    info!("Submitted {} jobs from {}", submitted, path.display());
    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use store::{JobFilter, MemoryJobStore};
    use tempfile;

    fn specs_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"app\": \"Test\", \"input\": \"/bin/ls\"}}").unwrap();
        writeln!(file, "{{\"app\": \"Test\", \"input\": \"/bin/cat\"}}").unwrap();
        file
    }

    #[test]
    fn test_submit_from_file() {
        let store = MemoryJobStore::new();
        let file = specs_file();
        assert_eq!(2, submit_from_file(&store, file.path(), None).unwrap());
        assert_eq!(2, submit_from_file(&store, file.path(), None).unwrap());
        assert_eq!(4, store.count(&JobFilter::all()).unwrap());
    }

    #[test]
    fn test_named_batch_submitted_once() {
        let store = MemoryJobStore::new();
        let file = specs_file();
        assert_eq!(2, submit_from_file(&store, file.path(), Some("startup")).unwrap());
        assert_eq!(0, submit_from_file(&store, file.path(), Some("startup")).unwrap());
        assert_eq!(2, store.count(&JobFilter::all()).unwrap());
        assert_eq!(2, store.find_batch("startup").unwrap().unwrap().len());
    }

    #[test]
    fn test_missing_file() {
        let store = MemoryJobStore::new();
        assert!(submit_from_file(&store, Path::new("/nonexistent/jobs.jsonl"), None).is_err());
    }
}
