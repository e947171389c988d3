//! Name-based process discovery.
//!
//! The launched game may spawn children or replace its own process image, so
//! existence checks look at every process carrying the tracked image name
//! rather than at the identifier captured at spawn time.

use arcade_common::{ImageName, ProcessError, ProcessResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use sysinfo::{Process, System};
use tracing::debug;

/// Answers "is any process with this image name still running?".
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    async fn image_running(&self, image: &ImageName) -> ProcessResult<bool>;
}

/// Probe backed by the OS process table (via `sysinfo`).
#[derive(Debug, Default, Clone)]
pub struct SystemProcessProbe;

impl SystemProcessProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessProbe for SystemProcessProbe {
    async fn image_running(&self, image: &ImageName) -> ProcessResult<bool> {
        let pids = find_processes_by_image(image).await?;
        debug!("Probe for {}: {} matching process(es)", image, pids.len());
        Ok(!pids.is_empty())
    }
}

/// List the identifiers of every running process whose image matches.
///
/// The process table walk is blocking, so it runs on the blocking pool.
pub async fn find_processes_by_image(image: &ImageName) -> ProcessResult<Vec<u32>> {
    let image = image.clone();
    let label = image.to_string();
    tokio::task::spawn_blocking(move || {
        let system = process_snapshot();
        matching_pids(&system, &image)
    })
    .await
    .map_err(|e| ProcessError::probe_failed(label, format!("process listing task failed: {}", e)))
}

/// Take a fresh snapshot of the process table.
pub(crate) fn process_snapshot() -> System {
    let mut system = System::new();
    system.refresh_processes();
    system
}

/// Identifiers of processes in `system` matching `image`, excluding ourselves.
pub(crate) fn matching_pids(system: &System, image: &ImageName) -> Vec<u32> {
    let own_pid = std::process::id();
    let mut pids: Vec<u32> = system
        .processes()
        .iter()
        .filter(|(_, process)| process_matches(process, image))
        .map(|(pid, _)| pid.as_u32())
        .filter(|pid| *pid != own_pid)
        .collect();
    pids.sort_unstable();
    pids
}

/// Expand `roots` with every descendant found through parent links.
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) fn with_descendants(system: &System, roots: &[u32]) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, process) in system.processes() {
        if let Some(parent) = process.parent() {
            children
                .entry(parent.as_u32())
                .or_default()
                .push(pid.as_u32());
        }
    }
    expand_tree(&children, roots)
}

#[cfg_attr(not(unix), allow(dead_code))]
fn expand_tree(children: &HashMap<u32, Vec<u32>>, roots: &[u32]) -> Vec<u32> {
    let mut seen: HashSet<u32> = HashSet::new();
    let mut queue: VecDeque<u32> = roots.iter().copied().collect();
    let mut ordered = Vec::new();

    while let Some(pid) = queue.pop_front() {
        if !seen.insert(pid) {
            continue;
        }
        ordered.push(pid);
        if let Some(kids) = children.get(&pid) {
            queue.extend(kids.iter().copied());
        }
    }
    ordered
}

fn process_matches(process: &Process, image: &ImageName) -> bool {
    let exe_file = process
        .exe()
        .and_then(|exe| exe.file_name())
        .map(|file| file.to_string_lossy());
    identity_matches(image, process.name(), exe_file.as_deref())
}

/// Exact, case-insensitive match on the process name or the executable's
/// file name. Linux truncates process names to 15 bytes, so the executable
/// path is the reliable source there.
fn identity_matches(image: &ImageName, name: &str, exe_file: Option<&str>) -> bool {
    image.matches(name) || exe_file.map_or(false, |file| image.matches(file))
}
