//! Parallel resolution of independent root templates.
//!
//! Each root gets its own expander, macro table and inclusion context; workers share
//! nothing but the read-only options and a cursor into the list of roots.

use crate::api::{resolve_file, Resolution};
use crate::config::ResolveOptions;
use crate::error::ConfcError;
use crate::schema::Schema;
use log::{debug, error};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Batch processing configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_threads: usize,
    /// Stop handing out roots after the first failure.
    pub fail_fast: bool,
    /// Validate every resolved document against this schema.
    pub schema: Option<Schema>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_threads: std::thread::available_parallelism()
                .map(|n| n.get().min(8))
                .unwrap_or(4),
            fail_fast: false,
            schema: None,
        }
    }
}

/// Outcome of one root.
pub type RootResult = Result<Resolution, ConfcError>;

/// Batch processing results, in the order the roots were given.
#[derive(Debug, Default)]
pub struct BatchResults {
    pub outcomes: Vec<(PathBuf, RootResult)>,
    /// Roots never started, because an earlier one failed with `fail_fast` set.
    pub skipped: Vec<PathBuf>,
    pub processing_duration: Duration,
}

impl BatchResults {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0 && self.skipped.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} root(s) processed, {} resolved, {} failed, {} skipped, {:.2}s total",
            self.outcomes.len(),
            self.success_count(),
            self.failure_count(),
            self.skipped.len(),
            self.processing_duration.as_secs_f64()
        )
    }
}

fn process_root(path: &Path, options: &ResolveOptions, schema: Option<&Schema>) -> RootResult {
    let resolution = resolve_file(path, options)?;
    if let Some(schema) = schema {
        resolution.validate(schema)?;
    }
    Ok(resolution)
}

/// Resolves every root, using up to `config.max_threads` worker threads.
pub fn resolve_all(roots: &[PathBuf], options: &ResolveOptions, config: &BatchConfig) -> BatchResults {
    let start = Instant::now();
    let workers = config.max_threads.clamp(1, roots.len().max(1));
    let next = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    debug!("resolving {} root(s) on {} thread(s)", roots.len(), workers);

    let slots: Mutex<Vec<Slot>> = Mutex::new(roots.iter().map(|_| Slot::Pending).collect());
    let set_slot = |index: usize, slot: Slot| {
        slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = slot;
    };

    let panic_reason = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| loop {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(path) = roots.get(index) else {
                        break;
                    };
                    set_slot(index, Slot::Started);
                    let result = process_root(path, options, config.schema.as_ref());
                    if result.is_err() && config.fail_fast {
                        stop.store(true, Ordering::Relaxed);
                    }
                    set_slot(index, Slot::Done(result));
                })
            })
            .collect();

        let mut panic_reason = None;
        for handle in handles {
            if let Err(payload) = handle.join() {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown cause".to_string());
                error!("a resolution worker panicked: {}", reason);
                panic_reason.get_or_insert(reason);
            }
        }
        panic_reason
    });

    let slots = slots.into_inner().unwrap_or_else(PoisonError::into_inner);
    let mut results = collect_results(roots, slots, panic_reason.as_deref());
    results.processing_duration = start.elapsed();
    debug!("{}", results.summary());
    results
}

/// Progress of one root while the workers run.
#[derive(Debug)]
enum Slot {
    Pending,
    Started,
    Done(RootResult),
}

/// Roots a worker started but never finished count as failures; roots never started
/// are skipped.
fn collect_results(roots: &[PathBuf], slots: Vec<Slot>, panic_reason: Option<&str>) -> BatchResults {
    let mut results = BatchResults::default();
    for (path, slot) in roots.iter().zip(slots) {
        match slot {
            Slot::Done(result) => results.outcomes.push((path.clone(), result)),
            Slot::Started => {
                let aborted = ConfcError::Aborted {
                    path: path.display().to_string(),
                    reason: panic_reason.unwrap_or("worker stopped").to_string(),
                };
                results.outcomes.push((path.clone(), Err(aborted)));
            }
            Slot::Pending => results.skipped.push(path.clone()),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_results_keep_input_order() {
        let dir = tempdir().unwrap();
        let mut roots = Vec::new();
        for i in 0..6 {
            let path = dir.path().join(format!("run{}.js", i));
            fs::write(&path, format!("{{ \"run\": {} }}", i)).unwrap();
            roots.push(path);
        }
        let config = BatchConfig {
            max_threads: 3,
            ..Default::default()
        };
        let results = resolve_all(&roots, &ResolveOptions::default(), &config);
        assert!(results.is_success());
        assert_eq!(results.success_count(), 6);
        for (i, (path, result)) in results.outcomes.iter().enumerate() {
            assert_eq!(path, &roots[i]);
            let resolution = result.as_ref().unwrap();
            assert_eq!(resolution.to_value()["run"], i as i64);
        }
    }

    #[test]
    fn test_failures_are_collected() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.js");
        fs::write(&good, "{ \"a\": 1 }").unwrap();
        let bad = dir.path().join("bad.js");
        fs::write(&bad, "{ \"a\": }").unwrap();
        let missing = dir.path().join("missing.js");

        let roots = vec![good, bad, missing];
        let results = resolve_all(&roots, &ResolveOptions::default(), &BatchConfig::default());
        assert_eq!(results.success_count(), 1);
        assert_eq!(results.failure_count(), 2);
        assert!(!results.is_success());
        assert!(results.summary().starts_with("3 root(s) processed, 1 resolved, 2 failed"));
    }

    #[test]
    fn test_fail_fast_single_thread_skips_rest() {
        let dir = tempdir().unwrap();
        let bad = dir.path().join("bad.js");
        fs::write(&bad, "{").unwrap();
        let good = dir.path().join("good.js");
        fs::write(&good, "{}").unwrap();

        let config = BatchConfig {
            max_threads: 1,
            fail_fast: true,
            schema: None,
        };
        let results = resolve_all(&[bad, good.clone()], &ResolveOptions::default(), &config);
        assert_eq!(results.failure_count(), 1);
        assert_eq!(results.skipped, vec![good]);
    }

    #[test]
    fn test_unfinished_roots_after_panic_are_failures() {
        let roots = vec![PathBuf::from("a.js"), PathBuf::from("b.js"), PathBuf::from("c.js")];
        let slots = vec![
            Slot::Done(Err(ConfcError::Output {
                path: "a".to_string(),
                reason: "x".to_string(),
            })),
            Slot::Started,
            Slot::Pending,
        ];
        let results = collect_results(&roots, slots, Some("index out of bounds"));
        assert_eq!(results.failure_count(), 2);
        assert_eq!(results.skipped, vec![PathBuf::from("c.js")]);
        match &results.outcomes[1] {
            (path, Err(err @ ConfcError::Aborted { .. })) => {
                assert_eq!(path, &PathBuf::from("b.js"));
                assert_eq!(err.to_string(), "resolving b.js was aborted: index out of bounds");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_schema_failures() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("run.js");
        fs::write(&root, "{ \"sim_name\": \"x\" }").unwrap();
        let config = BatchConfig {
            schema: Some(Schema::simulation()),
            ..Default::default()
        };
        let results = resolve_all(&[root], &ResolveOptions::default(), &config);
        match &results.outcomes[0].1 {
            Err(ConfcError::Validation(report)) => assert_eq!(report.errors.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}
