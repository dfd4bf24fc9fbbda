use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use serde_json;

use common::{JobId, JobSpec, JobStatus};
use errors::*;
use store::{JobFilter, JobStore};

/// Stores a new job. It starts `unscheduled` and is picked up by the next scheduling pass.
pub fn create_job(store: &JobStore, spec: JobSpec) -> Result<JobId> {
    let app = spec.app.clone();
    let id = store.insert(spec).chain_err(|| "Unable to store job")?;
    info!("Created job {} for app {}", id, app);
    Ok(id)
}

/// `BatchSubmission` creates one job per spec as it is iterated, yielding each job's raw
/// 12-byte identifier in submission order. A named batch records its ids under that name once
/// the specs run out; a failure to record them is yielded as a final error.
pub struct BatchSubmission<'a, I> {
    store: &'a JobStore,
    specs: I,
    name: Option<&'a str>,
    ids: Vec<JobId>,
}

impl<'a, I> Iterator for BatchSubmission<'a, I>
where
    I: Iterator<Item = JobSpec>,
{
    type Item = Result<[u8; 12]>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.specs.next() {
            Some(spec) => {
                let created = create_job(self.store, spec);
                if let Ok(ref id) = created {
                    self.ids.push(*id);
                }
                Some(created.map(|id| id.bytes()))
            }
            None => {
                let name = self.name.take()?;
                save_batch(self.store, name, &self.ids).err().map(Err)
            }
        }
    }
}

pub fn submit_batch<'a, I>(
    store: &'a JobStore,
    specs: I,
    name: Option<&'a str>,
) -> BatchSubmission<'a, I::IntoIter>
where
    I: IntoIterator<Item = JobSpec>,
{
    BatchSubmission {
        store: store,
        specs: specs.into_iter(),
        name: name,
        ids: Vec::new(),
    }
}

fn save_batch(store: &JobStore, name: &str, ids: &[JobId]) -> Result<()> {
    store.save_batch(name, ids).chain_err(
        || format!("Unable to record batch {}", name),
    )?;
    info!("Recorded batch {} with {} jobs", name, ids.len());
    Ok(())
}

/// Ids of the jobs submitted under `name`, in submission order, if such a batch exists.
pub fn find_batch(store: &JobStore, name: &str) -> Result<Option<Vec<JobId>>> {
    store.find_batch(name).chain_err(
        || format!("Unable to look up batch {}", name),
    )
}

/// Reads one JSON job spec per line and writes each created job's 12-byte id as soon as it is
/// stored. Blank lines are ignored, malformed lines are logged and skipped. A named batch is
/// recorded after the last line, replacing any earlier batch of the same name.
///
/// Returns the number of jobs created.
pub fn write_batch<R: BufRead, W: Write>(
    store: &JobStore,
    reader: R,
    writer: &mut W,
    name: Option<&str>,
) -> Result<usize> {
    let mut ids = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.chain_err(|| "Unable to read job specs")?;
        if line.trim().is_empty() {
            continue;
        }

        let spec: JobSpec = match serde_json::from_str(&line) {
            Ok(spec) => spec,
            Err(err) => {
                warn!("Skipping malformed job spec on line {}: {}", number + 1, err);
                continue;
            }
        };

        let id = create_job(store, spec)?;
        writer.write_all(&id.bytes()).chain_err(
            || "Unable to write job id",
        )?;
        writer.flush().chain_err(|| "Unable to flush job id")?;
        ids.push(id);
    }

    if let Some(name) = name {
        save_batch(store, name, &ids)?;
    }
    Ok(ids.len())
}

/// Number of jobs in each status present in the store.
pub fn count_by_status(store: &JobStore) -> Result<BTreeMap<JobStatus, usize>> {
    let mut counts = BTreeMap::new();
    for status in store.distinct_statuses()? {
        counts.insert(status, store.count(&JobFilter::with_status(status))?);
    }
    Ok(counts)
}
