//! Sharded sync driver.
//!
//! Splits very large target sets into shards, runs the aspect build once
//! per shard through an [`AspectInvoker`], and retries out-of-memory
//! shards at half size with the halves re-queued at the front. Individual
//! shard failures are reported and mark the project, never abort the
//! whole sync. The resolution pipeline itself runs once over the union of
//! everything the shards produced.

use std::collections::{HashSet, VecDeque};

use thiserror::Error;
use tracing::{info, warn};

use crate::core::label::Label;
use crate::core::language::LanguageClass;
use crate::core::project::Project;
use crate::core::target_info::{PathsResolver, TargetInfo};
use crate::core::workspace::{RepoMapping, WorkspaceContext};
use crate::resolver::errors::SyncError;
use crate::resolver::jdeps::ResolveCaches;
use crate::resolver::mapper;
use crate::util::cancel::CancellationToken;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("build tool ran out of memory")]
    OutOfMemory,
    #[error("aspect build failed: {0}")]
    Failed(String),
}

/// What one shard's aspect build produced.
#[derive(Debug, Default)]
pub struct AspectBuildResult {
    pub targets: Vec<TargetInfo>,
    pub has_error: bool,
}

/// Abstraction over the build-tool invocation; the engine never spawns
/// processes itself.
pub trait AspectInvoker: Sync {
    fn build_shard(
        &self,
        targets: &[Label],
        cancel: &CancellationToken,
    ) -> Result<AspectBuildResult, InvokeError>;
}

#[derive(Debug)]
pub struct ShardFailure {
    pub targets: Vec<Label>,
    pub reason: String,
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub project: Project,
    pub failed_shards: Vec<ShardFailure>,
    /// Shard size that worked after OOM halving, worth persisting in
    /// configuration.
    pub suggested_shard_size: Option<usize>,
}

/// Run a full sync: aspect builds per shard, then one resolution over the
/// union of results.
#[allow(clippy::too_many_arguments)]
pub fn run_sync(
    invoker: &dyn AspectInvoker,
    roots: &HashSet<Label>,
    ctx: &WorkspaceContext,
    repo_mapping: &RepoMapping,
    resolver: &PathsResolver,
    build_tool_release: &str,
    cancel: &CancellationToken,
) -> Result<SyncOutcome, SyncError> {
    let mut sorted_roots: Vec<Label> = roots.iter().copied().collect();
    sorted_roots.sort();

    let shard_size = if ctx.shard_sync {
        ctx.target_shard_size.max(1)
    } else {
        sorted_roots.len().max(1)
    };
    let mut queue: VecDeque<Vec<Label>> = sorted_roots
        .chunks(shard_size)
        .map(|chunk| chunk.to_vec())
        .collect();
    let total_shards = queue.len();
    info!(targets = sorted_roots.len(), shards = total_shards, "starting sync");

    let mut collected: Vec<TargetInfo> = Vec::new();
    let mut failed_shards: Vec<ShardFailure> = Vec::new();
    let mut suggested_shard_size: Option<usize> = None;
    let mut halved = false;
    let mut built = 0usize;

    while let Some(shard) = queue.pop_front() {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        match invoker.build_shard(&shard, cancel) {
            Ok(result) => {
                built += 1;
                info!(shard = built, size = shard.len(), "shard built");
                if halved {
                    // The smallest size that succeeded after halving
                    suggested_shard_size = Some(match suggested_shard_size {
                        Some(current) => current.min(shard.len()),
                        None => shard.len(),
                    });
                }
                if result.has_error {
                    failed_shards.push(ShardFailure {
                        targets: shard,
                        reason: "aspect build reported errors".to_string(),
                    });
                }
                collected.extend(result.targets);
            }
            Err(InvokeError::OutOfMemory) if shard.len() > 1 => {
                let half = shard.len() / 2;
                warn!(size = shard.len(), retry_size = half, "shard ran out of memory, halving");
                halved = true;
                let (front, back) = shard.split_at(half);
                // Retry the halves before the untouched remainder
                queue.push_front(back.to_vec());
                queue.push_front(front.to_vec());
            }
            Err(InvokeError::OutOfMemory) => {
                let err = SyncError::ShardExhausted {
                    size: shard.len(),
                    reason: InvokeError::OutOfMemory.to_string(),
                };
                warn!(%err, "shard failed at minimum size");
                failed_shards.push(ShardFailure {
                    targets: shard,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                warn!(%err, size = shard.len(), "shard build failed");
                failed_shards.push(ShardFailure {
                    targets: shard,
                    reason: err.to_string(),
                });
            }
        }
    }

    let caches = ResolveCaches::new();
    let mut project = mapper::resolve_project(
        collected,
        roots,
        ctx,
        repo_mapping,
        resolver,
        build_tool_release,
        &caches,
        cancel,
    )?;
    project.has_error = !failed_shards.is_empty();

    if let Some(size) = suggested_shard_size {
        info!(suggested_shard_size = size, "consider persisting a smaller shard size");
    }

    Ok(SyncOutcome {
        project,
        failed_shards,
        suggested_shard_size,
    })
}

/// Re-sync a subset of targets over a prior project.
///
/// Runs a full sync restricted to `roots`, then merges the result over
/// `prior` via [`Project::merge`]: re-synced modules replace their old
/// versions, untouched modules and libraries carry over.
#[allow(clippy::too_many_arguments)]
pub fn run_partial_sync(
    invoker: &dyn AspectInvoker,
    prior: &Project,
    roots: &HashSet<Label>,
    ctx: &WorkspaceContext,
    repo_mapping: &RepoMapping,
    resolver: &PathsResolver,
    build_tool_release: &str,
    cancel: &CancellationToken,
) -> Result<SyncOutcome, SyncError> {
    let outcome = run_sync(
        invoker,
        roots,
        ctx,
        repo_mapping,
        resolver,
        build_tool_release,
        cancel,
    )?;
    Ok(SyncOutcome {
        project: Project::merge(prior, &outcome.project),
        failed_shards: outcome.failed_shards,
        suggested_shard_size: outcome.suggested_shard_size,
    })
}

/// Fail fast before anything is invoked when a debug request names a
/// module whose languages have no debugger support.
pub fn ensure_debuggable(project: &Project, module: &Label) -> Result<(), SyncError> {
    let found = project
        .modules
        .iter()
        .find(|m| m.label == *module)
        .ok_or(SyncError::ModuleNotFound(*module))?;
    if found.languages.iter().any(LanguageClass::is_debuggable) {
        Ok(())
    } else {
        Err(SyncError::DebuggerUnsupported {
            module: *module,
            languages: found.languages.iter().copied().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted invoker: fails with OOM for shards above a size limit,
    /// records every invocation.
    struct OomAbove {
        limit: usize,
        calls: Mutex<Vec<usize>>,
    }

    impl AspectInvoker for OomAbove {
        fn build_shard(
            &self,
            targets: &[Label],
            _cancel: &CancellationToken,
        ) -> Result<AspectBuildResult, InvokeError> {
            self.calls.lock().unwrap().push(targets.len());
            if targets.len() > self.limit {
                return Err(InvokeError::OutOfMemory);
            }
            Ok(AspectBuildResult {
                targets: targets
                    .iter()
                    .map(|label| TargetInfo::new(*label, "java_library"))
                    .collect(),
                has_error: false,
            })
        }
    }

    fn roots(n: usize) -> HashSet<Label> {
        (0..n)
            .map(|i| Label::parse(&format!("//gen:t{i}")).unwrap())
            .collect()
    }

    fn shard_ctx(size: usize) -> WorkspaceContext {
        WorkspaceContext {
            shard_sync: true,
            target_shard_size: size,
            ..WorkspaceContext::default()
        }
    }

    fn run(
        invoker: &dyn AspectInvoker,
        roots: &HashSet<Label>,
        ctx: &WorkspaceContext,
        dir: &TempDir,
    ) -> Result<SyncOutcome, SyncError> {
        let resolver = PathsResolver::new(dir.path(), dir.path());
        run_sync(
            invoker,
            roots,
            ctx,
            &RepoMapping::default(),
            &resolver,
            "7.0.0",
            &CancellationToken::new(),
        )
    }

    #[test]
    fn test_oom_shards_are_halved_and_retried() {
        let dir = TempDir::new().unwrap();
        let invoker = OomAbove {
            limit: 2,
            calls: Mutex::new(Vec::new()),
        };

        let outcome = run(&invoker, &roots(8), &shard_ctx(8), &dir).unwrap();

        assert!(outcome.failed_shards.is_empty());
        assert!(!outcome.project.has_error);
        assert_eq!(outcome.project.modules.len(), 8);
        assert_eq!(outcome.suggested_shard_size, Some(2));

        let calls = invoker.calls.lock().unwrap();
        // 8 -> OOM, 4+4 -> OOM each, then four shards of 2 succeed
        assert_eq!(*calls, vec![8, 4, 2, 2, 4, 2, 2]);
    }

    #[test]
    fn test_unsplittable_shard_fails_locally_only() {
        let dir = TempDir::new().unwrap();
        let invoker = OomAbove {
            limit: 0,
            calls: Mutex::new(Vec::new()),
        };

        let outcome = run(&invoker, &roots(2), &shard_ctx(1), &dir).unwrap();

        assert_eq!(outcome.failed_shards.len(), 2);
        assert!(outcome.project.has_error);
        assert!(outcome.project.modules.is_empty());
    }

    #[test]
    fn test_cancellation_between_shards() {
        struct CancelAfterFirst<'a> {
            cancel: &'a CancellationToken,
        }
        impl AspectInvoker for CancelAfterFirst<'_> {
            fn build_shard(
                &self,
                targets: &[Label],
                _cancel: &CancellationToken,
            ) -> Result<AspectBuildResult, InvokeError> {
                self.cancel.cancel();
                Ok(AspectBuildResult {
                    targets: targets
                        .iter()
                        .map(|label| TargetInfo::new(*label, "java_library"))
                        .collect(),
                    has_error: false,
                })
            }
        }

        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let invoker = CancelAfterFirst { cancel: &cancel };
        let resolver = PathsResolver::new(dir.path(), dir.path());

        let result = run_sync(
            &invoker,
            &roots(4),
            &shard_ctx(2),
            &RepoMapping::default(),
            &resolver,
            "7.0.0",
            &cancel,
        );
        assert!(matches!(result, Err(SyncError::Cancelled)));
    }

    #[test]
    fn test_partial_sync_merges_over_prior_project() {
        let dir = TempDir::new().unwrap();
        let invoker = OomAbove {
            limit: usize::MAX,
            calls: Mutex::new(Vec::new()),
        };

        let mut all = HashSet::new();
        all.insert(Label::parse("//lib:a").unwrap());
        all.insert(Label::parse("//lib:b").unwrap());
        let prior = run(&invoker, &all, &WorkspaceContext::default(), &dir)
            .unwrap()
            .project;
        assert_eq!(prior.modules.len(), 2);

        // Re-sync only //lib:a; //lib:b must survive from the prior run
        struct KotlinInvoker;
        impl AspectInvoker for KotlinInvoker {
            fn build_shard(
                &self,
                targets: &[Label],
                _cancel: &CancellationToken,
            ) -> Result<AspectBuildResult, InvokeError> {
                Ok(AspectBuildResult {
                    targets: targets
                        .iter()
                        .map(|label| TargetInfo::new(*label, "kt_jvm_library"))
                        .collect(),
                    has_error: false,
                })
            }
        }
        let subset: HashSet<Label> = [Label::parse("//lib:a").unwrap()].into();
        let resolver = PathsResolver::new(dir.path(), dir.path());
        let merged = run_partial_sync(
            &KotlinInvoker,
            &prior,
            &subset,
            &WorkspaceContext::default(),
            &RepoMapping::default(),
            &resolver,
            "7.0.0",
            &CancellationToken::new(),
        )
        .unwrap()
        .project;

        assert_eq!(merged.modules.len(), 2);
        let a = merged
            .modules
            .iter()
            .find(|m| m.label.as_str() == "//lib:a")
            .unwrap();
        assert_eq!(a.kind, "kt_jvm_library");
        assert!(merged.modules.iter().any(|m| m.label.as_str() == "//lib:b"));
    }

    #[test]
    fn test_ensure_debuggable() {
        let dir = TempDir::new().unwrap();
        let invoker = OomAbove {
            limit: usize::MAX,
            calls: Mutex::new(Vec::new()),
        };
        let mut all = HashSet::new();
        all.insert(Label::parse("//lib:jvm").unwrap());
        let outcome = run(&invoker, &all, &WorkspaceContext::default(), &dir).unwrap();

        let jvm = Label::parse("//lib:jvm").unwrap();
        assert!(ensure_debuggable(&outcome.project, &jvm).is_ok());

        let missing = Label::parse("//lib:none").unwrap();
        assert!(matches!(
            ensure_debuggable(&outcome.project, &missing),
            Err(SyncError::ModuleNotFound(_))
        ));
    }
}
