//! libgit2-backed clone and update

use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{CheckoutNotificationType, Cred, ErrorClass, ErrorCode, FetchOptions, Oid, Remote, RemoteCallbacks, Repository};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::repo::GitRepo;
use super::url::normalize_remote;
use crate::pull::{CloneRequest, GitBackend, GitFailure, ProgressReporter, PullSuccess};

/// Username sent with a token when no account is configured
const TOKEN_USERNAME: &str = "x-access-token";

/// Pulls with libgit2
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Backend;

impl Git2Backend {
    /// Create a new backend
    pub fn new() -> Self {
        Self
    }
}

impl GitBackend for Git2Backend {
    fn pull(
        &self,
        request: &CloneRequest,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PullSuccess, GitFailure> {
        let result = match inspect_destination(&request.destination, &request.repository_url)? {
            Destination::Fresh => clone_fresh(request, progress, cancel),
            Destination::Existing(repo) => update(&repo, request, progress, cancel),
        };
        cancelled_as_failure(result, cancel)
    }
}

/// An aborted transfer or checkout surfaces as a generic callback error
fn cancelled_as_failure<T>(
    result: Result<T, GitFailure>,
    cancel: &CancellationToken,
) -> Result<T, GitFailure> {
    match result {
        Err(GitFailure::Git(err)) if cancel.is_cancelled() => {
            debug!(error = %err, "Aborted after cancellation");
            Err(GitFailure::Cancelled)
        }
        other => other,
    }
}

enum Destination {
    Fresh,
    Existing(GitRepo),
}

/// Decide between a fresh clone and an update
///
/// Missing and empty directories are cloned into. A working tree whose origin
/// matches the request is updated. Anything else is refused rather than
/// overwritten.
fn inspect_destination(destination: &Path, url: &str) -> Result<Destination, GitFailure> {
    if !destination.exists() {
        return Ok(Destination::Fresh);
    }

    if !destination.is_dir() {
        return Err(GitFailure::InvalidDestination(format!(
            "{} exists and is not a directory",
            destination.display()
        )));
    }

    if std::fs::read_dir(destination)?.next().is_none() {
        return Ok(Destination::Fresh);
    }

    let repo = GitRepo::open(destination).map_err(|_| {
        GitFailure::InvalidDestination(format!(
            "{} exists and is not a git working tree",
            destination.display()
        ))
    })?;

    match repo.origin_url() {
        Some(origin) if normalize_remote(&origin) == normalize_remote(url) => {
            Ok(Destination::Existing(repo))
        }
        Some(origin) => Err(GitFailure::InvalidDestination(format!(
            "{} is a clone of {}, not {}",
            destination.display(),
            origin,
            url
        ))),
        None => Err(GitFailure::InvalidDestination(format!(
            "{} has no origin remote",
            destination.display()
        ))),
    }
}

fn clone_fresh(
    request: &CloneRequest,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<PullSuccess, GitFailure> {
    let destination = &request.destination;

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    progress.emit(format!("Cloning into '{}'...", destination.display()));

    let mut builder = RepoBuilder::new();
    builder
        .fetch_options(fetch_options(request, progress, cancel))
        .with_checkout(checkout_builder(progress, cancel));
    if let Some(branch) = request.branch.as_deref() {
        builder.branch(branch);
    }

    let repo = builder.clone(&request.repository_url, destination)?;
    let branch = checked_out_branch(&repo)?;

    progress.emit(format!("Checked out branch '{}'", branch));
    info!(
        url = %request.repository_url,
        destination = %destination.display(),
        %branch,
        "Cloned repository"
    );

    Ok(PullSuccess::Cloned { branch })
}

fn update(
    repo: &GitRepo,
    request: &CloneRequest,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<PullSuccess, GitFailure> {
    let git = repo.inner();

    progress.emit("Fetching updates from origin");
    let mut remote = git.find_remote("origin")?;
    let mut options = fetch_options(request, progress, cancel);
    remote.fetch(&[] as &[&str], Some(&mut options), None)?;

    if cancel.is_cancelled() {
        return Err(GitFailure::Cancelled);
    }

    let branch = match request.branch.clone() {
        Some(branch) => branch,
        None => remote_default_branch(&remote)
            .or_else(|| repo.remote_head_branch())
            .ok_or_else(|| {
                GitFailure::BranchResolution(
                    "could not determine the default branch of origin".to_string(),
                )
            })?,
    };

    let tracking = format!("refs/remotes/origin/{}", branch);
    let target = git
        .find_reference(&tracking)
        .and_then(|reference| reference.peel_to_commit())
        .map_err(|e| GitFailure::BranchResolution(format!("{}: {}", tracking, e.message())))?;

    let on_branch = repo.current_branch().ok().flatten().as_deref() == Some(branch.as_str());
    let head = repo.head_oid();

    if on_branch {
        if let Some(head) = head {
            // Local commits on top of the remote tip leave nothing to pull
            if head == target.id() || git.graph_descendant_of(head, target.id())? {
                progress.emit(format!("Already up to date with origin/{}", branch));
                return Ok(PullSuccess::UpToDate);
            }
        }
    }

    let local_name = format!("refs/heads/{}", branch);
    if let Some(local) = git.find_reference(&local_name).ok().and_then(|r| r.target()) {
        if local != target.id() && !git.graph_descendant_of(target.id(), local)? {
            return Err(GitFailure::InvalidDestination(format!(
                "local branch '{}' has diverged from origin/{}",
                branch, branch
            )));
        }
    }

    progress.emit(format!(
        "Updating {} to origin/{} ({})",
        head.map(short_id).unwrap_or_else(|| "(none)".to_string()),
        branch,
        short_id(target.id())
    ));

    let mut checkout = checkout_builder(progress, cancel);
    checkout.safe();
    git.checkout_tree(target.as_object(), Some(&mut checkout))?;

    match git.find_reference(&local_name) {
        Ok(mut local) => {
            local.set_target(
                target.id(),
                &format!("gallery: fast-forward to origin/{}", branch),
            )?;
        }
        Err(_) => {
            let mut created = git.branch(&branch, &target, false)?;
            created.set_upstream(Some(&format!("origin/{}", branch)))?;
        }
    }
    git.set_head(&local_name)?;

    progress.emit(format!("Checked out branch '{}'", branch));
    info!(
        destination = %request.destination.display(),
        %branch,
        commit = %target.id(),
        "Updated repository"
    );

    Ok(PullSuccess::Updated { branch })
}

fn fetch_options<'a>(
    request: &'a CloneRequest,
    progress: &'a ProgressReporter,
    cancel: &'a CancellationToken,
) -> FetchOptions<'a> {
    let mut options = FetchOptions::new();
    options.remote_callbacks(remote_callbacks(request, progress, cancel));
    if let Some(depth) = request.depth {
        options.depth(i32::try_from(depth).unwrap_or(i32::MAX));
    }
    options
}

fn remote_callbacks<'a>(
    request: &'a CloneRequest,
    progress: &'a ProgressReporter,
    cancel: &'a CancellationToken,
) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();

    let mut meter = TransferMeter::default();
    callbacks.transfer_progress(move |stats| {
        if cancel.is_cancelled() {
            return false;
        }
        meter.observe(&stats, progress);
        true
    });

    callbacks.sideband_progress(move |data| {
        for line in String::from_utf8_lossy(data).split(['\r', '\n']) {
            let line = line.trim();
            if !line.is_empty() {
                progress.emit(format!("remote: {}", line));
            }
        }
        !cancel.is_cancelled()
    });

    if let Some(token) = request.auth_token.as_deref() {
        let username = request.account.as_deref().unwrap_or(TOKEN_USERNAME);
        let mut offered = false;
        // libgit2 asks again when the remote rejects what we sent
        callbacks.credentials(move |_url, _username_from_url, _allowed| {
            if offered {
                return Err(git2::Error::new(
                    ErrorCode::Auth,
                    ErrorClass::Http,
                    "remote rejected the supplied credentials",
                ));
            }
            offered = true;
            Cred::userpass_plaintext(username, token)
        });
    }

    callbacks
}

fn checkout_builder<'a>(
    progress: &'a ProgressReporter,
    cancel: &'a CancellationToken,
) -> CheckoutBuilder<'a> {
    let mut checkout = CheckoutBuilder::new();
    // Progress cannot abort a checkout; returning false from notify does
    checkout
        .notify_on(CheckoutNotificationType::all())
        .notify(move |_kind, _path, _baseline, _target, _workdir| !cancel.is_cancelled());
    let mut last = None;
    checkout.progress(move |_path, completed, total| {
        if total == 0 {
            return;
        }
        let percent = completed * 100 / total;
        if last != Some(percent) {
            last = Some(percent);
            progress.emit(format!(
                "Checking out files: {:>3}% ({}/{})",
                percent, completed, total
            ));
        }
    });
    checkout
}

/// Turns libgit2 transfer statistics into at most one line per percent
#[derive(Debug, Default)]
struct TransferMeter {
    receiving: Option<usize>,
    resolving: Option<usize>,
}

impl TransferMeter {
    fn observe(&mut self, stats: &git2::Progress<'_>, progress: &ProgressReporter) {
        let total = stats.total_objects();
        if total > 0 {
            let received = stats.received_objects();
            let percent = received * 100 / total;
            if self.receiving != Some(percent) {
                self.receiving = Some(percent);
                progress.emit(format!(
                    "Receiving objects: {:>3}% ({}/{}), {}",
                    percent,
                    received,
                    total,
                    human_bytes(stats.received_bytes())
                ));
            }
        }

        let deltas = stats.total_deltas();
        if deltas > 0 {
            let indexed = stats.indexed_deltas();
            let percent = indexed * 100 / deltas;
            if self.resolving != Some(percent) {
                self.resolving = Some(percent);
                progress.emit(format!(
                    "Resolving deltas: {:>3}% ({}/{})",
                    percent, indexed, deltas
                ));
            }
        }
    }
}

fn human_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let bytes = bytes as f64;
    if bytes >= MIB {
        format!("{:.2} MiB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}

fn short_id(oid: Oid) -> String {
    oid.to_string().chars().take(7).collect()
}

fn remote_default_branch(remote: &Remote<'_>) -> Option<String> {
    let head = remote.default_branch().ok()?;
    head.as_str()?.strip_prefix("refs/heads/").map(str::to_string)
}

fn checked_out_branch(repo: &Repository) -> Result<String, GitFailure> {
    let head = repo.find_reference("HEAD")?;
    head.symbolic_target()
        .and_then(|target| target.strip_prefix("refs/heads/"))
        .map(str::to_string)
        .ok_or_else(|| GitFailure::BranchResolution("HEAD does not point at a branch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pull::{CloneOutcome, ProgressEvent, Puller};
    use futures_util::StreamExt;
    use git2::{RepositoryInitOptions, Signature};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn upstream(dir: &Path) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir, &opts).unwrap();
        commit_file(&repo, "README.md", "# Demo\n", "initial");
        repo
    }

    fn commit_file(repo: &Repository, name: &str, contents: &str, message: &str) {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), contents).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = Signature::now("Gallery", "gallery@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    fn url(path: &Path) -> String {
        path.to_str().unwrap().to_string()
    }

    fn request(source: &Path, destination: PathBuf) -> CloneRequest {
        CloneRequest::new(url(source), destination, Duration::from_secs(30))
    }

    async fn run(request: CloneRequest) -> (Vec<ProgressEvent>, CloneOutcome) {
        Puller::new(Arc::new(Git2Backend::new()))
            .run(request)
            .unwrap()
            .wait_with_progress()
            .await
    }

    #[tokio::test]
    async fn test_fresh_clone_creates_parents() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upstream");
        upstream(&source);
        let destination = temp.path().join("workspace").join("nested").join("demo");

        let (events, outcome) = run(request(&source, destination.clone())).await;

        assert_eq!(
            outcome,
            CloneOutcome::Success {
                branch: "main".to_string()
            }
        );
        assert!(destination.join("README.md").exists());
        assert!(events[0].message.starts_with("Cloning into"));
        assert!(events.windows(2).all(|w| w[1].sequence == w[0].sequence + 1));
    }

    #[tokio::test]
    async fn test_clone_into_empty_directory() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upstream");
        upstream(&source);
        let destination = temp.path().join("demo");
        std::fs::create_dir(&destination).unwrap();

        let (_, outcome) = run(request(&source, destination.clone())).await;
        assert!(outcome.is_success());
        assert!(GitRepo::is_git_repo(&destination));
    }

    #[tokio::test]
    async fn test_clone_specific_branch() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upstream");
        let repo = upstream(&source);
        {
            let head = repo.head().unwrap().peel_to_commit().unwrap();
            repo.branch("dev", &head, false).unwrap();
        }

        let destination = temp.path().join("demo");
        let (_, outcome) = run(request(&source, destination).with_branch("dev")).await;
        assert_eq!(
            outcome,
            CloneOutcome::Success {
                branch: "dev".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_up_to_date_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upstream");
        upstream(&source);
        let destination = temp.path().join("demo");

        let (_, first) = run(request(&source, destination.clone())).await;
        assert!(matches!(first, CloneOutcome::Success { .. }));

        for _ in 0..2 {
            let (events, outcome) = run(request(&source, destination.clone())).await;
            assert_eq!(outcome, CloneOutcome::AlreadyUpToDate);
            let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
            assert_eq!(
                messages,
                vec![
                    "Fetching updates from origin",
                    "Already up to date with origin/main"
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_update_fast_forwards() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upstream");
        let repo = upstream(&source);
        let destination = temp.path().join("demo");

        let (_, first) = run(request(&source, destination.clone())).await;
        assert!(first.is_success());

        commit_file(&repo, "notebook.ipynb", "{}", "add notebook");
        let upstream_head = repo.head().unwrap().target().unwrap();

        let (_, outcome) = run(request(&source, destination.clone())).await;
        assert_eq!(
            outcome,
            CloneOutcome::Success {
                branch: "main".to_string()
            }
        );
        assert!(destination.join("notebook.ipynb").exists());

        let local = GitRepo::open(&destination).unwrap();
        assert_eq!(local.head_oid(), Some(upstream_head));
        assert_eq!(local.updates_available().unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_non_git_destination_refused() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upstream");
        upstream(&source);
        let destination = temp.path().join("demo");
        std::fs::create_dir(&destination).unwrap();
        std::fs::write(destination.join("notes.txt"), "mine").unwrap();

        let (_, outcome) = run(request(&source, destination.clone())).await;
        assert!(matches!(outcome, CloneOutcome::InvalidDestination { .. }));
        // Untouched
        assert_eq!(
            std::fs::read_to_string(destination.join("notes.txt")).unwrap(),
            "mine"
        );
    }

    #[tokio::test]
    async fn test_clone_of_other_remote_refused() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        upstream(&first);
        upstream(&second);
        let destination = temp.path().join("demo");

        let (_, outcome) = run(request(&first, destination.clone())).await;
        assert!(outcome.is_success());

        let (_, outcome) = run(request(&second, destination)).await;
        match outcome {
            CloneOutcome::InvalidDestination { detail } => assert!(detail.contains("is a clone of")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_repository() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("not-a-repo");
        std::fs::create_dir(&source).unwrap();

        let (_, outcome) = run(request(&source, temp.path().join("demo"))).await;
        assert_eq!(outcome, CloneOutcome::RepositoryNotFound);
    }

    #[tokio::test]
    async fn test_events_stream_ends_with_outcome() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upstream");
        upstream(&source);

        let handle = Puller::new(Arc::new(Git2Backend::new()))
            .run(request(&source, temp.path().join("demo")))
            .unwrap();
        let events: Vec<_> = handle.into_events().collect().await;

        assert!(matches!(
            events.last(),
            Some(crate::pull::PullEvent::Finished(CloneOutcome::Success { .. }))
        ));
    }

    #[test]
    fn test_checkout_stops_once_cancelled() {
        let temp = TempDir::new().unwrap();
        let repo = upstream(&temp.path().join("upstream"));
        let initial = repo.head().unwrap().peel_to_commit().unwrap();
        commit_file(&repo, "README.md", "# Changed\n", "edit readme");

        let (reporter, _progress) = ProgressReporter::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut checkout = checkout_builder(&reporter, &cancel);
        checkout.safe();
        let result = repo
            .checkout_tree(initial.as_object(), Some(&mut checkout))
            .map_err(GitFailure::from);

        assert!(matches!(
            cancelled_as_failure(result, &cancel),
            Err(GitFailure::Cancelled)
        ));
        let readme = repo.workdir().unwrap().join("README.md");
        assert_eq!(std::fs::read_to_string(readme).unwrap(), "# Changed\n");
    }

    #[test]
    fn test_checkout_runs_when_not_cancelled() {
        let temp = TempDir::new().unwrap();
        let repo = upstream(&temp.path().join("upstream"));
        let initial = repo.head().unwrap().peel_to_commit().unwrap();
        commit_file(&repo, "README.md", "# Changed\n", "edit readme");

        let (reporter, _progress) = ProgressReporter::channel();
        let cancel = CancellationToken::new();

        let mut checkout = checkout_builder(&reporter, &cancel);
        checkout.safe();
        repo.checkout_tree(initial.as_object(), Some(&mut checkout))
            .unwrap();

        let readme = repo.workdir().unwrap().join("README.md");
        assert_eq!(std::fs::read_to_string(readme).unwrap(), "# Demo\n");
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 bytes");
        assert_eq!(human_bytes(2048), "2.00 KiB");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.00 MiB");
    }
}
