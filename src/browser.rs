// Repository browser.
// Wires the three cached resource classes (trees, file contents, highlighted
// renderings) to their collaborators.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::cache::{
    BoundedStore, DEFAULT_TREE_TTL, FreshnessPolicy, KeyedCache, Medium, Namespace, fingerprint,
};
use crate::error::Result;
use crate::fetch::{Fetched, Orchestrator, Outcome, Request, RequestIdentity, Snapshot};
use crate::github::{RepoRef, Tree, TreeEntry};
use crate::highlight::{DEFAULT_THEME, Highlighter, Rendering};
use crate::sources::{ContentSource, TreeSource};

pub const TREE_COMPONENT: &str = "tree";
pub const BLOB_COMPONENT: &str = "blob";
pub const HIGHLIGHT_COMPONENT: &str = "highlight";

/// Bump when a cached payload's shape changes; old entries are then ignored.
pub const SCHEMA_VERSION: u32 = 1;

/// Largest file that will be fetched for preview.
pub const DEFAULT_MAX_PREVIEW_BYTES: u64 = 1_000_000;

/// Limits and policies for the browser's caches.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub tree_ttl: Duration,
    pub max_trees: usize,
    pub max_blobs: usize,
    pub max_highlights: usize,
    pub max_preview_bytes: u64,
    pub schema_version: u32,
    pub theme: String,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            tree_ttl: DEFAULT_TREE_TTL,
            max_trees: 20,
            max_blobs: 200,
            max_highlights: 100,
            max_preview_bytes: DEFAULT_MAX_PREVIEW_BYTES,
            schema_version: SCHEMA_VERSION,
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

/// Counts of entries removed per namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removed {
    pub trees: usize,
    pub blobs: usize,
    pub highlights: usize,
}

/// Cached access to repository trees, file contents, and renderings.
pub struct Browser {
    trees: Arc<Orchestrator<Tree>>,
    blobs: Arc<Orchestrator<String>>,
    highlights: Arc<Orchestrator<Rendering>>,
    tree_source: Arc<dyn TreeSource>,
    content_source: Arc<dyn ContentSource>,
    highlighter: Arc<dyn Highlighter>,
    theme: String,
}

impl Browser {
    pub fn new(
        medium: Arc<dyn Medium>,
        options: BrowserOptions,
        tree_source: Arc<dyn TreeSource>,
        content_source: Arc<dyn ContentSource>,
        highlighter: Arc<dyn Highlighter>,
    ) -> Self {
        let namespace = |component| Namespace::new(component, options.schema_version);
        let trees = KeyedCache::new(
            BoundedStore::new(medium.clone(), namespace(TREE_COMPONENT), options.max_trees),
            FreshnessPolicy::Ttl(options.tree_ttl),
        );
        let blobs = KeyedCache::new(
            BoundedStore::new(medium.clone(), namespace(BLOB_COMPONENT), options.max_blobs),
            FreshnessPolicy::Fingerprint,
        );
        let highlights = KeyedCache::new(
            BoundedStore::new(
                medium,
                namespace(HIGHLIGHT_COMPONENT),
                options.max_highlights,
            ),
            FreshnessPolicy::Fingerprint,
        );

        Self {
            trees: Arc::new(Orchestrator::new(trees)),
            blobs: Arc::new(Orchestrator::new(blobs).with_max_bytes(options.max_preview_bytes)),
            highlights: Arc::new(Orchestrator::new(highlights)),
            tree_source,
            content_source,
            highlighter,
            theme: options.theme,
        }
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn subscribe_tree(&self) -> watch::Receiver<Snapshot<Tree>> {
        self.trees.subscribe()
    }

    pub fn subscribe_file(&self) -> watch::Receiver<Snapshot<String>> {
        self.blobs.subscribe()
    }

    pub fn subscribe_highlight(&self) -> watch::Receiver<Snapshot<Rendering>> {
        self.highlights.subscribe()
    }

    /// Load a repository tree, from cache while its TTL holds.
    pub async fn open_tree(&self, repo: &RepoRef) -> Outcome<Tree> {
        let source = &self.tree_source;
        self.trees
            .resolve(Request::new(tree_identity(repo)), async move {
                source.fetch_tree(repo).await.map(Fetched::untracked)
            })
            .await
    }

    /// Load a tree in the background, superseding any previous tree request.
    pub fn select_tree(&self, repo: &RepoRef) {
        let source = Arc::clone(&self.tree_source);
        let repo = repo.clone();
        self.trees.spawn(Request::new(tree_identity(&repo)), async move {
            source.fetch_tree(&repo).await.map(Fetched::untracked)
        });
    }

    /// Load a file: cached text is shown at once and revalidated.
    pub async fn open_file(&self, repo: &RepoRef, entry: &TreeEntry) -> Outcome<String> {
        let source = &self.content_source;
        let path = entry.path.as_str();
        self.blobs
            .resolve(file_request(repo, entry), async move {
                source.fetch_content(repo, path).await.map(fingerprinted)
            })
            .await
    }

    /// Load a file in the background, superseding any previous file request.
    pub fn select_file(&self, repo: &RepoRef, entry: &TreeEntry) {
        let source = Arc::clone(&self.content_source);
        let repo = repo.clone();
        let path = entry.path.clone();
        self.blobs.spawn(file_request(&repo, entry), async move {
            source.fetch_content(&repo, &path).await.map(fingerprinted)
        });
    }

    /// Highlight file content. A cached rendering whose source fingerprint
    /// matches `content` is reused without rendering again.
    pub async fn highlight(
        &self,
        repo: &RepoRef,
        path: &str,
        content: &str,
        language: &str,
        theme: Option<&str>,
    ) -> Outcome<Rendering> {
        let theme = theme.unwrap_or(self.theme.as_str());
        let source_fingerprint = fingerprint(content);
        let request = Request::new(highlight_identity(repo, path, language, theme))
            .with_current_fingerprint(source_fingerprint.clone());
        let highlighter = &self.highlighter;

        self.highlights
            .resolve(request, async move {
                let rendering = highlighter.highlight(content, language, theme).await?;
                Ok(Fetched::new(rendering, Some(source_fingerprint)))
            })
            .await
    }

    /// Drop the cached tree for a repository.
    pub fn invalidate_tree(&self, repo: &RepoRef) {
        self.trees.invalidate(&tree_identity(repo));
    }

    /// Drop the cached text for one file.
    pub fn invalidate_file(&self, repo: &RepoRef, path: &str) {
        self.blobs.invalidate(&file_identity(repo, path));
    }

    /// Enforce every namespace's entry limit.
    pub fn prune(&self) -> Removed {
        let prune = |store: &BoundedStore| store.prune(store.max_entries());
        Removed {
            trees: prune(self.trees.cache().store()),
            blobs: prune(self.blobs.cache().store()),
            highlights: prune(self.highlights.cache().store()),
        }
    }

    /// Remove every cached entry.
    pub fn clear(&self) -> Removed {
        Removed {
            trees: self.trees.cache().store().clear(),
            blobs: self.blobs.cache().store().clear(),
            highlights: self.highlights.cache().store().clear(),
        }
    }

    /// Stop every in-flight request.
    pub fn cancel_all(&self) {
        self.trees.cancel();
        self.blobs.cancel();
        self.highlights.cancel();
    }
}

fn fingerprinted(text: String) -> Fetched<String> {
    let fp = fingerprint(&text);
    Fetched::new(text, Some(fp))
}

fn tree_identity(repo: &RepoRef) -> RequestIdentity {
    RequestIdentity::new([
        repo.owner.as_str(),
        repo.repo.as_str(),
        repo.reference.as_str(),
    ])
}

fn file_identity(repo: &RepoRef, path: &str) -> RequestIdentity {
    RequestIdentity::new([
        repo.owner.as_str(),
        repo.repo.as_str(),
        repo.reference.as_str(),
        path,
    ])
}

fn file_request(repo: &RepoRef, entry: &TreeEntry) -> Request {
    let request = Request::new(file_identity(repo, &entry.path));
    match entry.size {
        Some(size) => request.with_declared_size(size),
        None => request,
    }
}

fn highlight_identity(repo: &RepoRef, path: &str, language: &str, theme: &str) -> RequestIdentity {
    RequestIdentity::new([repo.blob_url(path).as_str(), language, theme])
}

/// Load a file's text and, when possible, its highlighted rendering.
pub async fn open_and_highlight(
    browser: &Browser,
    repo: &RepoRef,
    entry: &TreeEntry,
    language: &str,
    theme: Option<&str>,
) -> Result<(String, Rendering)> {
    let text = browser.open_file(repo, entry).await.into_result()?;
    let rendering = browser
        .highlight(repo, &entry.path, &text, language, theme)
        .await
        .into_result()?;
    Ok((text, rendering))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DiskMedium, MemoryMedium};
    use crate::error::GroveError;
    use crate::fetch::{LoadState, Origin};
    use crate::github::EntryKind;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeGitHub {
        tree_calls: AtomicUsize,
        content_calls: AtomicUsize,
        files: Mutex<HashMap<String, String>>,
    }

    impl FakeGitHub {
        fn with_file(path: &str, text: &str) -> Arc<Self> {
            let fake = Self::default();
            fake.set_file(path, text);
            Arc::new(fake)
        }

        fn set_file(&self, path: &str, text: &str) {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), text.to_string());
        }
    }

    #[async_trait]
    impl TreeSource for FakeGitHub {
        async fn fetch_tree(&self, _repo: &RepoRef) -> Result<Tree> {
            self.tree_calls.fetch_add(1, Ordering::SeqCst);
            let files = self.files.lock().unwrap();
            let mut entries: Vec<TreeEntry> = files
                .iter()
                .map(|(path, text)| TreeEntry {
                    path: path.clone(),
                    kind: EntryKind::Blob,
                    size: Some(text.len() as u64),
                })
                .collect();
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(Tree {
                sha: "abc".to_string(),
                entries,
                truncated: false,
            })
        }
    }

    #[async_trait]
    impl ContentSource for FakeGitHub {
        async fn fetch_content(&self, _repo: &RepoRef, path: &str) -> Result<String> {
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| GroveError::NotFound(path.to_string()))
        }
    }

    #[derive(Default)]
    struct FakeHighlighter {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl Highlighter for FakeHighlighter {
        async fn highlight(&self, content: &str, language: &str, theme: &str) -> Result<Rendering> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(GroveError::Other("highlighter unavailable".to_string()));
            }
            Ok(Rendering {
                html: format!("<pre data-lang=\"{language}\" data-theme=\"{theme}\">{content}</pre>"),
                background: Some("#ffffff".to_string()),
                foreground: None,
            })
        }
    }

    fn browser(
        medium: Arc<dyn Medium>,
        github: &Arc<FakeGitHub>,
        highlighter: &Arc<FakeHighlighter>,
    ) -> Browser {
        Browser::new(
            medium,
            BrowserOptions::default(),
            github.clone(),
            github.clone(),
            highlighter.clone(),
        )
    }

    fn repo() -> RepoRef {
        RepoRef::new("octo", "hello", "main")
    }

    fn entry(path: &str, size: u64) -> TreeEntry {
        TreeEntry {
            path: path.to_string(),
            kind: EntryKind::Blob,
            size: Some(size),
        }
    }

    #[tokio::test]
    async fn test_tree_served_from_cache_within_ttl() {
        let github = FakeGitHub::with_file("src/lib.rs", "pub fn hi() {}\n");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);

        let first = browser.open_tree(&repo()).await.into_result().unwrap();
        let second = browser.open_tree(&repo()).await;

        assert!(matches!(second, Outcome::Cached(ref tree) if *tree == first));
        assert_eq!(github.tree_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tree_cache_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let github = FakeGitHub::with_file("README.md", "# hello\n");
        let highlighter = Arc::new(FakeHighlighter::default());

        {
            let browser = browser(Arc::new(DiskMedium::new(temp_dir.path())), &github, &highlighter);
            browser.open_tree(&repo()).await.into_result().unwrap();
        }

        let browser = browser(Arc::new(DiskMedium::new(temp_dir.path())), &github, &highlighter);
        let outcome = browser.open_tree(&repo()).await;
        assert!(matches!(outcome, Outcome::Cached(_)));
        assert_eq!(github.tree_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_schema_bump_ignores_old_entries() {
        let github = FakeGitHub::with_file("a.txt", "a");
        let highlighter = Arc::new(FakeHighlighter::default());
        let medium: Arc<dyn Medium> = Arc::new(MemoryMedium::new());

        let v1 = browser(medium.clone(), &github, &highlighter);
        v1.open_tree(&repo()).await;

        let v2 = Browser::new(
            medium,
            BrowserOptions {
                schema_version: SCHEMA_VERSION + 1,
                ..BrowserOptions::default()
            },
            github.clone(),
            github.clone(),
            highlighter.clone(),
        );
        let outcome = v2.open_tree(&repo()).await;
        assert!(matches!(outcome, Outcome::Fetched(_)));
        assert_eq!(github.tree_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_tree_forces_refetch() {
        let github = FakeGitHub::with_file("a.txt", "a");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);

        browser.open_tree(&repo()).await;
        browser.invalidate_tree(&repo());
        browser.open_tree(&repo()).await;
        assert_eq!(github.tree_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_file_revalidates_and_picks_up_changes() {
        let github = FakeGitHub::with_file("src/lib.rs", "v1");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);

        let first = browser.open_file(&repo(), &entry("src/lib.rs", 2)).await;
        assert!(matches!(first, Outcome::Fetched(ref text) if text == "v1"));

        github.set_file("src/lib.rs", "v2");
        let second = browser.open_file(&repo(), &entry("src/lib.rs", 2)).await;
        assert!(matches!(second, Outcome::Fetched(ref text) if text == "v2"));
        assert_eq!(github.content_calls.load(Ordering::SeqCst), 2);

        let snapshot = browser.subscribe_file().borrow().clone();
        assert_eq!(
            snapshot.state,
            LoadState::Ready {
                value: "v2".to_string(),
                origin: Origin::Network
            }
        );
    }

    #[tokio::test]
    async fn test_oversized_file_is_not_fetched() {
        let github = FakeGitHub::with_file("big.bin", "x");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);

        let outcome = browser.open_file(&repo(), &entry("big.bin", 2_000_000)).await;
        assert!(matches!(outcome, Outcome::TooLarge { size: 2_000_000, limit: 1_000_000 }));
        assert_eq!(github.content_calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            browser.subscribe_file().borrow().state,
            LoadState::TooLarge { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_file_reports_failure() {
        let github = FakeGitHub::with_file("a.txt", "a");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);

        let outcome = browser.open_file(&repo(), &entry("missing.txt", 10)).await;
        assert!(matches!(outcome, Outcome::Failed(GroveError::NotFound(_))));
        assert!(matches!(
            browser.subscribe_file().borrow().state,
            LoadState::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_highlight_reused_while_content_unchanged() {
        let github = FakeGitHub::with_file("src/lib.rs", "fn a() {}");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);
        let file = entry("src/lib.rs", 9);

        let (_, first) = open_and_highlight(&browser, &repo(), &file, "rs", None)
            .await
            .unwrap();
        let (_, second) = open_and_highlight(&browser, &repo(), &file, "rs", None)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(highlighter.calls.load(Ordering::SeqCst), 1);

        github.set_file("src/lib.rs", "fn b() {}");
        let (_, third) = open_and_highlight(&browser, &repo(), &file, "rs", None)
            .await
            .unwrap();
        assert!(third.html.contains("fn b()"));
        assert_eq!(highlighter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_render_never_shows_old_content() {
        let github = FakeGitHub::with_file("a.rs", "OLD CONTENT");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);

        let old = browser
            .highlight(&repo(), "a.rs", "OLD CONTENT", "rs", None)
            .await;
        assert!(matches!(old, Outcome::Fetched(ref r) if r.html.contains("OLD CONTENT")));

        highlighter.failing.store(true, Ordering::SeqCst);
        let new = browser
            .highlight(&repo(), "a.rs", "NEW CONTENT", "rs", None)
            .await;
        assert!(matches!(new, Outcome::Failed(_)));
        assert!(matches!(
            browser.subscribe_highlight().borrow().state,
            LoadState::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_theme_is_part_of_highlight_key() {
        let github = FakeGitHub::with_file("a.rs", "x");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);

        browser
            .highlight(&repo(), "a.rs", "x", "rs", Some("light"))
            .await;
        let dark = browser
            .highlight(&repo(), "a.rs", "x", "rs", Some("dark"))
            .await;
        assert!(matches!(dark, Outcome::Fetched(ref r) if r.html.contains("dark")));
        assert_eq!(highlighter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_storage_still_works() {
        let github = FakeGitHub::with_file("a.txt", "a");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::failing()), &github, &highlighter);

        for _ in 0..2 {
            let tree = browser.open_tree(&repo()).await.into_result().unwrap();
            assert_eq!(tree.entries.len(), 1);
        }
        assert_eq!(github.tree_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_select_file_keeps_latest_selection() {
        let github = FakeGitHub::with_file("a.txt", "alpha");
        github.set_file("b.txt", "beta");
        let highlighter = Arc::new(FakeHighlighter::default());
        let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);
        let mut rx = browser.subscribe_file();

        browser.select_file(&repo(), &entry("a.txt", 5));
        browser.select_file(&repo(), &entry("b.txt", 4));

        let snapshot = rx
            .wait_for(|snap| snap.state.is_ready())
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.state.value().map(String::as_str), Some("beta"));
        assert_eq!(snapshot.identity.unwrap().parts().last().unwrap(), "b.txt");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_select_file_latest_wins_across_threads() {
        let github = FakeGitHub::with_file("a.txt", "alpha");
        github.set_file("b.txt", "beta");
        let highlighter = Arc::new(FakeHighlighter::default());

        for round in 0..100 {
            let browser = browser(Arc::new(MemoryMedium::new()), &github, &highlighter);
            let mut rx = browser.subscribe_file();

            browser.select_file(&repo(), &entry("a.txt", 5));
            browser.select_file(&repo(), &entry("b.txt", 4));

            let snapshot = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                rx.wait_for(|snap| {
                    snap.state.is_ready()
                        && snap
                            .identity
                            .as_ref()
                            .and_then(|id| id.parts().last())
                            .is_some_and(|last| last == "b.txt")
                }),
            )
            .await
            .unwrap_or_else(|_| panic!("round {round}: b.txt never became ready"))
            .unwrap()
            .clone();
            assert_eq!(snapshot.state.value().map(String::as_str), Some("beta"));

            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            let last = browser.subscribe_file().borrow().clone();
            assert_eq!(last.state.value().map(String::as_str), Some("beta"), "round {round}");
        }
    }

    #[tokio::test]
    async fn test_prune_and_clear() {
        let github = FakeGitHub::with_file("a.txt", "a");
        let highlighter = Arc::new(FakeHighlighter::default());
        let medium = Arc::new(MemoryMedium::new());
        let browser = browser(medium.clone(), &github, &highlighter);

        browser.open_tree(&repo()).await;
        browser.open_file(&repo(), &entry("a.txt", 1)).await;
        assert_eq!(browser.prune(), Removed::default());

        let removed = browser.clear();
        assert_eq!(removed.trees, 1);
        assert_eq!(removed.blobs, 1);
        assert!(medium.is_empty());
    }
}
