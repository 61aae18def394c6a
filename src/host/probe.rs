//! Worker pool that reads image dimensions off the main thread.
//!
//! The engine marks images `Loading`; the app forwards them here and feeds
//! the results back as `set_image_size` + `mark_image_loaded`, or
//! `mark_image_error`. Results carry the chapter generation they were
//! requested for so the app can drop answers for a chapter it already left.

use std::collections::HashSet;
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use flume::{Receiver, Sender};
use image::codecs::gif::GifDecoder;
use image::{ImageDecoder, ImageFormat, ImageReader};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

const DEFAULT_WORKERS: usize = 2;
const MAX_WORKERS: usize = 8;
/// Maximum number of queued requests.
const MAX_QUEUE_SIZE: usize = 256;
/// Dimensions remembered across chapter switches.
const CACHE_CAPACITY: usize = 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Worker count from `MANGAFLOW_PROBE_WORKERS`, clamped to the pool limits.
pub fn workers_from_env() -> usize {
    std::env::var("MANGAFLOW_PROBE_WORKERS")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_WORKERS)
        .min(MAX_WORKERS)
}

#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub generation: u64,
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Loaded {
        generation: u64,
        index: usize,
        width: u32,
        height: u32,
    },
    Failed {
        generation: u64,
        index: usize,
        error: String,
    },
}

impl ProbeResult {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Loaded { generation, .. } | Self::Failed { generation, .. } => *generation,
        }
    }
}

type DimensionCache = Arc<Mutex<LruCache<PathBuf, (u32, u32)>>>;

pub struct ProbePool {
    request_tx: Sender<ProbeRequest>,
    result_rx: Receiver<ProbeResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    /// `(generation, index)` pairs queued or in flight.
    pending: Arc<Mutex<HashSet<(u64, usize)>>>,
    cache: DimensionCache,
}

impl ProbePool {
    pub fn new(workers: usize) -> Result<Self> {
        let num_workers = workers.clamp(1, MAX_WORKERS);

        let (request_tx, request_rx) = flume::bounded(MAX_QUEUE_SIZE);
        let (result_tx, result_rx) = flume::unbounded();

        let shutdown = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(Mutex::new(HashSet::new()));
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        let cache: DimensionCache = Arc::new(Mutex::new(LruCache::new(capacity)));

        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let rx = request_rx.clone();
            let tx = result_tx.clone();
            let shutdown = Arc::clone(&shutdown);
            let pending = Arc::clone(&pending);
            let cache = Arc::clone(&cache);

            let handle = thread::Builder::new()
                .name(format!("probe-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, rx, tx, shutdown, pending, cache))
                .context("Failed to spawn probe worker")?;
            handles.push(handle);
        }

        debug!(num_workers, "Started dimension probe pool");

        Ok(Self {
            request_tx,
            result_rx,
            workers: handles,
            shutdown,
            pending,
            cache,
        })
    }

    /// Queue a probe. Returns false if it is already pending or the queue is full.
    pub fn request(&self, req: ProbeRequest) -> bool {
        let key = (req.generation, req.index);
        if !self.pending.lock().insert(key) {
            trace!(index = req.index, "Probe already pending");
            return false;
        }

        match self.request_tx.try_send(req) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(req)) => {
                warn!(index = req.index, "Probe queue full, dropping request");
                self.pending.lock().remove(&key);
                false
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                error!("Probe queue disconnected");
                self.pending.lock().remove(&key);
                false
            }
        }
    }

    pub fn results(&self) -> &Receiver<ProbeResult> {
        &self.result_rx
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("Dimension probe pool stopped");
    }
}

impl Drop for ProbePool {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Relaxed) {
            self.shutdown();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Receiver<ProbeRequest>,
    tx: Sender<ProbeResult>,
    shutdown: Arc<AtomicBool>,
    pending: Arc<Mutex<HashSet<(u64, usize)>>>,
    cache: DimensionCache,
) {
    trace!(worker_id, "Probe worker started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(req) => {
                let result = process_request(&req, &cache);
                pending.lock().remove(&(req.generation, req.index));
                if let Err(e) = tx.send(result) {
                    warn!(worker_id, error = ?e, "Failed to send probe result");
                }
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    trace!(worker_id, "Probe worker stopped");
}

fn process_request(req: &ProbeRequest, cache: &DimensionCache) -> ProbeResult {
    let cached = cache.lock().get(&req.path).copied();
    let dims = match cached {
        Some(dims) => Ok(dims),
        None => read_dimensions(&req.path),
    };

    match dims {
        Ok((width, height)) => {
            cache.lock().put(req.path.clone(), (width, height));
            ProbeResult::Loaded {
                generation: req.generation,
                index: req.index,
                width,
                height,
            }
        }
        Err(e) => {
            warn!(path = ?req.path, error = %e, "Failed to probe image");
            ProbeResult::Failed {
                generation: req.generation,
                index: req.index,
                error: format!("{e:#}"),
            }
        }
    }
}

/// Pixel size of the image at `path`, read from the header where possible.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    let format = image::guess_format(&bytes).ok();

    let (width, height) = if format == Some(ImageFormat::Gif) {
        GifDecoder::new(Cursor::new(bytes))
            .with_context(|| format!("Failed to decode GIF: {:?}", path))?
            .dimensions()
    } else {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .context("Failed to guess image format")?
            .into_dimensions()
            .with_context(|| format!("Failed to read dimensions: {:?}", path))?
    };

    if width == 0 || height == 0 {
        return Err(anyhow!("Image has no pixels: {:?}", path));
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = image::RgbImage::new(width, height);
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    fn recv(pool: &ProbePool) -> ProbeResult {
        pool.results()
            .recv_timeout(Duration::from_secs(5))
            .expect("probe result")
    }

    #[test]
    fn test_read_dimensions() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.png");
        write_png(&path, 3, 7);
        assert_eq!(read_dimensions(&path).unwrap(), (3, 7));
    }

    #[test]
    fn test_read_dimensions_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        fs::write(&path, b"definitely not an image").unwrap();
        assert!(read_dimensions(&path).is_err());
        assert!(read_dimensions(&tmp.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_pool_reports_loaded_and_failed() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.png");
        write_png(&good, 10, 20);
        let bad = tmp.path().join("bad.png");
        fs::write(&bad, b"nope").unwrap();

        let pool = ProbePool::new(2).unwrap();
        assert!(pool.request(ProbeRequest {
            generation: 1,
            index: 0,
            path: good.clone(),
        }));
        assert!(pool.request(ProbeRequest {
            generation: 1,
            index: 1,
            path: bad,
        }));

        let mut results = vec![recv(&pool), recv(&pool)];
        results.sort_by_key(|r| match r {
            ProbeResult::Loaded { index, .. } | ProbeResult::Failed { index, .. } => *index,
        });
        assert_eq!(
            results[0],
            ProbeResult::Loaded {
                generation: 1,
                index: 0,
                width: 10,
                height: 20,
            }
        );
        assert!(matches!(results[1], ProbeResult::Failed { index: 1, .. }));
        assert_eq!(results[1].generation(), 1);
        assert_eq!(pool.cached_count(), 1);
    }

    #[test]
    fn test_duplicate_requests_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.png");
        write_png(&path, 1, 1);

        let pool = ProbePool::new(1).unwrap();
        let req = ProbeRequest {
            generation: 3,
            index: 5,
            path,
        };
        let first = pool.request(req.clone());
        let second = pool.request(req.clone());
        assert!(first);
        // The worker may already have finished the first one.
        if second {
            recv(&pool);
        }
        recv(&pool);
        assert_eq!(pool.pending_count(), 0);
    }

    #[test]
    fn test_workers_from_env_default() {
        // Only checks the bounds; the variable is normally unset in tests.
        let n = workers_from_env();
        assert!((1..=MAX_WORKERS).contains(&n));
    }
}
