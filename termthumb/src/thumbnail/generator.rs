// ABOUTME: Thumbnail generation front end with caching, single-flight renders, and background work
// ABOUTME: Owns the render configuration and invalidates the cache whenever it changes

use super::cache::{CacheStats, EvictionPolicy, ThumbnailCache};
use crate::config::{RenderConfig, ThumbnailSettings};
use crate::error::{Result, ThumbnailError};
use crate::protocols::{
    scaling, CapabilityDetector, GraphicsProtocol, ImageMetadata, ImageRenderer, Renderer,
};
use image::DynamicImage;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Result slot shared by the leader of a render and everyone waiting on it
struct Flight {
    result: Mutex<Option<Result<String>>>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn publish(&self, result: Result<String>) {
        *self.result.lock() = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<String> {
        let mut slot = self.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut slot);
        }
    }
}

/// Held by the thread doing a render; publishes on completion or unwinding
struct FlightLease<'a> {
    in_flight: &'a Mutex<HashMap<String, Arc<Flight>>>,
    key: String,
    flight: Arc<Flight>,
    finished: bool,
}

impl FlightLease<'_> {
    fn complete(mut self, result: &Result<String>) {
        self.finish(result.clone());
    }

    fn finish(&mut self, result: Result<String>) {
        self.in_flight.lock().remove(&self.key);
        self.flight.publish(result);
        self.finished = true;
    }
}

impl Drop for FlightLease<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(Err(ThumbnailError::EncodeFailure(format!(
                "render of {} was aborted",
                self.key
            ))));
        }
    }
}

enum Role<'a> {
    Lead(FlightLease<'a>),
    Wait(Arc<Flight>),
}

struct Inner {
    config: RwLock<RenderConfig>,
    sixel_dithering: AtomicBool,
    in_flight: Mutex<HashMap<String, Arc<Flight>>>,
    cache: ThumbnailCache,
}

/// Produces terminal-ready thumbnails and remembers them by source path.
///
/// Cloning is cheap and every clone shares the same cache and configuration.
/// Locks are always taken in the order configuration, in-flight map, cache.
#[derive(Clone)]
pub struct ThumbnailGenerator {
    inner: Arc<Inner>,
}

impl ThumbnailGenerator {
    /// Default configuration with the clear-on-overflow cache
    pub fn new(capacity: usize) -> Self {
        Self::with_config(RenderConfig::default(), capacity)
    }

    pub fn with_config(config: RenderConfig, capacity: usize) -> Self {
        Self::with_cache(config, ThumbnailCache::new(capacity))
    }

    pub fn with_policy(
        config: RenderConfig,
        capacity: usize,
        policy: Box<dyn EvictionPolicy>,
    ) -> Self {
        Self::with_cache(config, ThumbnailCache::with_policy(capacity, policy))
    }

    pub fn with_cache(config: RenderConfig, cache: ThumbnailCache) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                sixel_dithering: AtomicBool::new(true),
                in_flight: Mutex::new(HashMap::new()),
                cache,
            }),
        }
    }

    /// Build from loaded settings, detecting the protocol when none is configured
    pub fn from_settings(settings: &ThumbnailSettings) -> Self {
        let protocol = settings
            .protocol
            .unwrap_or_else(|| CapabilityDetector::new().detect());
        let generator = Self::with_policy(
            settings.render_config(protocol),
            settings.capacity(),
            settings.eviction_policy(),
        );
        generator
            .inner
            .sixel_dithering
            .store(settings.dithering(), Ordering::Relaxed);
        generator
    }

    /// Default size and color mode with the protocol `detector` reports
    pub fn detected(detector: &CapabilityDetector, capacity: usize) -> Self {
        let mut config = RenderConfig::default();
        config.protocol = detector.detect();
        Self::with_config(config, capacity)
    }

    /// Render the image at `path`, serving repeated requests from the cache.
    ///
    /// Concurrent calls for the same path share a single render. Failures are
    /// returned to every waiter and never cached.
    pub fn generate(&self, path: &Path) -> Result<String> {
        let key = cache_key(path);

        // Held until the result is stored so a config change cannot interleave
        let config = self.inner.config.read();

        if let Some(hit) = self.inner.cache.get(&key) {
            log::debug!("Thumbnail cache hit: {}", key);
            return Ok(hit);
        }

        let role = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(&key) {
                Some(flight) => Role::Wait(Arc::clone(flight)),
                None => {
                    let flight = Arc::new(Flight::new());
                    in_flight.insert(key.clone(), Arc::clone(&flight));
                    Role::Lead(FlightLease {
                        in_flight: &self.inner.in_flight,
                        key: key.clone(),
                        flight,
                        finished: false,
                    })
                }
            }
        };

        let lease = match role {
            Role::Wait(flight) => {
                log::debug!("Waiting on in-flight render: {}", key);
                return flight.wait();
            }
            Role::Lead(lease) => lease,
        };

        // A render may have finished between the cache check and taking the lead
        let result = match self.inner.cache.get(&key) {
            Some(hit) => Ok(hit),
            None => {
                log::debug!("Thumbnail cache miss, rendering {} as {}", key, config.protocol);
                let result = self.renderer_for(&config).render_file(path);
                if let Ok(rendered) = &result {
                    self.inner.cache.insert(&key, rendered.clone());
                }
                result
            }
        };

        lease.complete(&result);
        if let Err(e) = &result {
            log::debug!("Thumbnail render failed for {}: {}", key, e);
        }
        result
    }

    /// Render an in-memory image with the current configuration; never cached
    pub fn generate_from_image(&self, img: &DynamicImage) -> Result<String> {
        let config = self.inner.config.read();
        self.renderer_for(&config).render_image(img)
    }

    /// Run `generate` on a blocking task and hand the result to `callback`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn generate_async<P, F>(&self, path: P, callback: F) -> JoinHandle<()>
    where
        P: Into<PathBuf>,
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let generator = self.clone();
        let path = path.into();
        tokio::task::spawn_blocking(move || {
            let result = generator.generate(&path);
            callback(result);
        })
    }

    /// Warm the cache with one independent task per path
    pub fn preload<I, P>(&self, paths: I) -> Vec<JoinHandle<()>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.preload_with_callback(paths, |path: &Path, result: Result<String>| {
            if let Err(e) = result {
                log::debug!("Preload failed for {}: {}", path.display(), e);
            }
        })
    }

    /// Like `preload`, reporting each path's result in completion order
    pub fn preload_with_callback<I, P, F>(&self, paths: I, callback: F) -> Vec<JoinHandle<()>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
        F: Fn(&Path, Result<String>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        paths
            .into_iter()
            .map(|path| {
                let path = path.into();
                let callback = Arc::clone(&callback);
                let generator = self.clone();
                tokio::task::spawn_blocking(move || {
                    let result = generator.generate(&path);
                    callback(&path, result);
                })
            })
            .collect()
    }

    pub fn set_protocol(&self, protocol: GraphicsProtocol) {
        let mut config = self.inner.config.write();
        if config.protocol != protocol {
            log::debug!("Switching protocol {} -> {}", config.protocol, protocol);
            config.protocol = protocol;
            self.inner.cache.clear();
        }
    }

    /// Zero values are ignored
    pub fn set_dimensions(&self, width: u32, height: u32) {
        let mut config = self.inner.config.write();
        if config.set_dimensions(width, height) {
            self.inner.cache.clear();
        }
    }

    pub fn set_colored(&self, colored: bool) {
        let mut config = self.inner.config.write();
        if config.colored != colored {
            config.colored = colored;
            self.inner.cache.clear();
        }
    }

    /// Toggle Floyd-Steinberg dithering for Sixel output
    pub fn set_dithering(&self, dithering: bool) {
        let _config = self.inner.config.write();
        if self.inner.sixel_dithering.swap(dithering, Ordering::Relaxed) != dithering {
            self.inner.cache.clear();
        }
    }

    pub fn config(&self) -> RenderConfig {
        *self.inner.config.read()
    }

    pub fn protocol(&self) -> GraphicsProtocol {
        self.inner.config.read().protocol
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Returns whether an entry was removed
    pub fn remove_from_cache(&self, path: &Path) -> bool {
        self.inner.cache.remove(&cache_key(path)).is_some()
    }

    pub fn cache_size(&self) -> usize {
        self.inner.cache.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Check that `path` exists, has an accepted extension, and decodes; does not render
    pub fn validate(&self, path: &Path) -> (bool, Option<ThumbnailError>) {
        match scaling::check_source(path) {
            Ok(_) => (true, None),
            Err(e) => (false, Some(e)),
        }
    }

    /// Header-level facts about a source after the same checks as `validate`
    pub fn metadata(&self, path: &Path) -> Result<ImageMetadata> {
        scaling::check_source(path)
    }

    fn renderer_for(&self, config: &RenderConfig) -> Renderer {
        Renderer::for_config(config)
            .with_sixel_dithering(self.inner.sixel_dithering.load(Ordering::Relaxed))
    }
}

impl fmt::Debug for ThumbnailGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailGenerator")
            .field("config", &*self.inner.config.read())
            .field("cache", &self.inner.cache)
            .finish()
    }
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::thread;
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.path().join(name);
        RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
            .save(&path)
            .unwrap();
        path
    }

    fn halfblock(width: u32, height: u32) -> RenderConfig {
        RenderConfig::new(width, height, GraphicsProtocol::HalfBlock, false)
    }

    #[test]
    fn test_flight_delivers_to_waiters() {
        let flight = Arc::new(Flight::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let flight = Arc::clone(&flight);
                thread::spawn(move || flight.wait())
            })
            .collect();

        flight.publish(Ok("done".to_string()));
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Ok("done".to_string()));
        }
    }

    #[test]
    fn test_dropped_lease_publishes_failure() {
        let in_flight = Mutex::new(HashMap::new());
        let flight = Arc::new(Flight::new());
        in_flight
            .lock()
            .insert("a.png".to_string(), Arc::clone(&flight));

        drop(FlightLease {
            in_flight: &in_flight,
            key: "a.png".to_string(),
            flight: Arc::clone(&flight),
            finished: false,
        });

        assert!(in_flight.lock().is_empty());
        assert!(matches!(flight.wait(), Err(ThumbnailError::EncodeFailure(_))));
    }

    #[test]
    fn test_generate_populates_cache_once() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "a.png", 8, 8);
        let generator = ThumbnailGenerator::with_config(halfblock(4, 2), 10);

        let first = generator.generate(&path).unwrap();
        let second = generator.generate(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(generator.cache_size(), 1);
        assert!(generator.inner.in_flight.lock().is_empty());
    }

    #[test]
    fn test_concurrent_generate_renders_once() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "shared.png", 64, 64);
        let generator = ThumbnailGenerator::with_config(halfblock(16, 8), 10);

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                let path = path.clone();
                thread::spawn(move || generator.generate(&path))
            })
            .collect();

        let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(generator.cache_size(), 1);
    }

    #[test]
    fn test_set_dithering_clears_cache_on_change() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "a.png", 8, 8);
        let generator = ThumbnailGenerator::with_config(
            RenderConfig::new(2, 1, GraphicsProtocol::Sixel, true),
            10,
        );

        generator.generate(&path).unwrap();
        generator.set_dithering(true);
        assert_eq!(generator.cache_size(), 1);
        generator.set_dithering(false);
        assert_eq!(generator.cache_size(), 0);
    }

    #[test]
    fn test_detected_uses_detector() {
        let detector = CapabilityDetector::new();
        detector.force(GraphicsProtocol::Sixel);
        let generator = ThumbnailGenerator::detected(&detector, 5);
        assert_eq!(generator.protocol(), GraphicsProtocol::Sixel);
        assert_eq!(generator.cache_stats().capacity, 5);
    }
}
