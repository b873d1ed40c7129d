//! Async loading of the data directory: domain registry, per-domain
//! bundles, and the video catalog.
//!
//! These are the core's only suspension points — everything downstream of
//! a loaded bundle is synchronous. Loads are not cancellable; if two
//! loads of the same domain race, the one that completes later replaces
//! the cache entry, and cached bundles live for the whole session (they
//! are finite and small, so there is no eviction).
//!
//! Progress events are throttled to one per [`DEFAULT_PROGRESS_THROTTLE`]
//! while bytes arrive; the final event is always delivered so the UI can
//! settle its progress bar at 100%.

use core_model::{DomainBundle, DomainRegistry, Video};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{info, warn};

mod error;

pub use error::LoadError;

/// Minimum gap between two progress notifications.
pub const DEFAULT_PROGRESS_THROTTLE: Duration = Duration::from_millis(100);

const READ_CHUNK_BYTES: usize = 16 * 1024;

/// One progress notification during a bundle read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadProgress {
    pub domain_id: String,
    pub loaded_bytes: u64,
    pub total_bytes: u64,
}

/// Optional observer callbacks for one `load` call. Errors are also
/// returned from `load` itself; `on_error` exists so UI code can route
/// them without owning the future.
#[derive(Default)]
pub struct LoadHooks {
    pub on_progress: Option<Box<dyn Fn(&LoadProgress)>>,
    pub on_complete: Option<Box<dyn Fn(&DomainBundle)>>,
    pub on_error: Option<Box<dyn Fn(&LoadError)>>,
}

pub struct Loader {
    data_dir: PathBuf,
    throttle: Duration,
    registry: OnceCell<Arc<DomainRegistry>>,
    bundles: Mutex<HashMap<String, Arc<DomainBundle>>>,
    videos: OnceCell<Arc<Vec<Video>>>,
}

impl Loader {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            throttle: DEFAULT_PROGRESS_THROTTLE,
            registry: OnceCell::new(),
            bundles: Mutex::new(HashMap::new()),
            videos: OnceCell::new(),
        }
    }

    /// Override the progress throttle (configuration hook; tests also
    /// use it to force per-chunk events).
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    fn domains_dir(&self) -> PathBuf {
        self.data_dir.join("domains")
    }

    /// The domain registry, read once and cached.
    pub async fn registry(&self) -> Result<Arc<DomainRegistry>, LoadError> {
        self.registry
            .get_or_try_init(|| async {
                let path = self.domains_dir().join("index.json");
                let registry: DomainRegistry = read_json(&path).await?;
                info!(
                    target: "loader",
                    domains = registry.domains.len(),
                    schema = registry.schema_version.as_str(),
                    "domain registry loaded"
                );
                Ok(Arc::new(registry))
            })
            .await
            .cloned()
    }

    /// Cached bundle lookup without touching the filesystem.
    pub fn cached(&self, domain_id: &str) -> Option<Arc<DomainBundle>> {
        self.bundles
            .lock()
            .expect("bundle cache lock poisoned")
            .get(domain_id)
            .cloned()
    }

    /// Load one domain bundle, reporting throttled progress. Serves from
    /// cache when possible; a completed load (re)places the cache entry.
    pub async fn load(
        &self,
        domain_id: &str,
        hooks: &LoadHooks,
    ) -> Result<Arc<DomainBundle>, LoadError> {
        if let Some(bundle) = self.cached(domain_id) {
            if let Some(cb) = &hooks.on_complete {
                cb(&bundle);
            }
            return Ok(bundle);
        }

        match self.read_bundle(domain_id, hooks).await {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                self.bundles
                    .lock()
                    .expect("bundle cache lock poisoned")
                    .insert(domain_id.to_string(), Arc::clone(&bundle));
                if let Some(cb) = &hooks.on_complete {
                    cb(&bundle);
                }
                Ok(bundle)
            }
            Err(err) => {
                warn!(target: "loader", domain = domain_id, error = %err, "bundle load failed");
                if let Some(cb) = &hooks.on_error {
                    cb(&err);
                }
                Err(err)
            }
        }
    }

    async fn read_bundle(
        &self,
        domain_id: &str,
        hooks: &LoadHooks,
    ) -> Result<DomainBundle, LoadError> {
        let path = self.domains_dir().join(format!("{domain_id}.json"));
        let bytes = self
            .read_with_progress(domain_id, &path, hooks)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => LoadError::UnknownDomain(domain_id.to_string()),
                _ => LoadError::Io {
                    path: path.clone(),
                    source,
                },
            })?;
        let bundle: DomainBundle =
            serde_json::from_slice(&bytes).map_err(|source| LoadError::Malformed {
                path: path.clone(),
                source,
            })?;
        bundle.validate();
        Ok(bundle)
    }

    /// Chunked read with throttled progress events; the final event is
    /// always delivered.
    async fn read_with_progress(
        &self,
        domain_id: &str,
        path: &Path,
        hooks: &LoadHooks,
    ) -> Result<Vec<u8>, std::io::Error> {
        let mut file = tokio::fs::File::open(path).await?;
        let total_bytes = file.metadata().await?.len();
        let mut out = Vec::with_capacity(total_bytes as usize);
        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        let mut last_notify: Option<Instant> = None;

        loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
            if let Some(cb) = &hooks.on_progress {
                let now = Instant::now();
                let due = last_notify
                    .map(|t| now.duration_since(t) >= self.throttle)
                    .unwrap_or(true);
                if due && (out.len() as u64) < total_bytes {
                    cb(&LoadProgress {
                        domain_id: domain_id.to_string(),
                        loaded_bytes: out.len() as u64,
                        total_bytes,
                    });
                    last_notify = Some(now);
                }
            }
        }

        if let Some(cb) = &hooks.on_progress {
            cb(&LoadProgress {
                domain_id: domain_id.to_string(),
                loaded_bytes: out.len() as u64,
                total_bytes,
            });
        }
        Ok(out)
    }

    /// The video catalog, read once and cached.
    pub async fn videos(&self) -> Result<Arc<Vec<Video>>, LoadError> {
        self.videos
            .get_or_try_init(|| async {
                let path = self.data_dir.join("videos").join("catalog.json");
                let catalog: Vec<Video> = read_json(&path).await?;
                info!(target: "loader", videos = catalog.len(), "video catalog loaded");
                Ok(Arc::new(catalog))
            })
            .await
            .cloned()
    }

    /// Kick off the video-catalog read without waiting for it; the next
    /// `videos()` call then resolves from cache. Failures are logged and
    /// retried by the next explicit call.
    pub fn start_background_load(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = loader.videos().await {
                warn!(target: "loader", error = %err, "background video catalog load failed");
            }
        })
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| LoadError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
