//! Sandboxed file-system capability exposed as `fileSystemHandler`.
//!
//! Event-style operations report their outcome through events: a success
//! event named after the operation, or `errorOccurred` with a readable
//! message. Listings can also be returned directly and are cached per
//! requested path.

pub mod cache;
pub mod launcher;
pub mod listing;
pub mod sandbox;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use woda_bridge::{Capability, EventEmitter, MemberDescriptor, Value, WorkerPool};
use woda_common::CapabilityError;

use crate::data_uri::decode_payload;
use cache::{DirectoryCache, Lookup};
use launcher::{Launcher, SystemLauncher};
use listing::{loading_listing, read_listing, to_json};
use sandbox::{relative_display, Sandbox};

pub const OBJECT_ID: &str = "fileSystemHandler";

pub const MEMBERS: &[MemberDescriptor] = &[
    MemberDescriptor::method("readFile", &["path"]),
    MemberDescriptor::method("createFile", &["path", "content"]),
    MemberDescriptor::method("changeFileContent", &["path", "content"]),
    MemberDescriptor::method("deleteFile", &["path"]),
    MemberDescriptor::method("createDirectory", &["path"]),
    MemberDescriptor::method("deleteDirectory", &["path"]),
    MemberDescriptor::method("listDirectory", &["path"]),
    MemberDescriptor::method("getDirectoryContents", &["path"]),
    MemberDescriptor::method("getCachedDirectoryContents", &["path"]),
    MemberDescriptor::method("openFile", &["path"]),
    MemberDescriptor::method("saveDroppedFile", &["dirPath", "fileName", "fileContent"]),
    MemberDescriptor::event("fileRead", &["path", "content"]),
    MemberDescriptor::event("fileCreated", &["path"]),
    MemberDescriptor::event("fileChanged", &["path"]),
    MemberDescriptor::event("fileDeleted", &["path"]),
    MemberDescriptor::event("directoryCreated", &["path"]),
    MemberDescriptor::event("directoryDeleted", &["path"]),
    MemberDescriptor::event("directoryListed", &["path", "listing"]),
    MemberDescriptor::event("fileOpened", &["path"]),
    MemberDescriptor::event("errorOccurred", &["message"]),
];

struct Inner {
    sandbox: Sandbox,
    cache: DirectoryCache,
    workers: WorkerPool,
    launcher: Arc<dyn Launcher>,
    refreshes: TaskTracker,
}

/// File operations confined to one base directory. Cheap to clone; clones
/// share the sandbox, cache and worker pool.
#[derive(Clone)]
pub struct FileSystemCapability {
    inner: Arc<Inner>,
}

impl FileSystemCapability {
    pub fn new(sandbox: Sandbox, workers: WorkerPool) -> Self {
        Self::with_launcher(sandbox, workers, Arc::new(SystemLauncher))
    }

    pub fn with_launcher(
        sandbox: Sandbox,
        workers: WorkerPool,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        info!(base = %sandbox.root().display(), "file system capability ready");
        Self {
            inner: Arc::new(Inner {
                sandbox,
                cache: DirectoryCache::new(),
                workers,
                launcher,
                refreshes: TaskTracker::new(),
            }),
        }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.inner.sandbox
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.inner.cache
    }

    /// Run `job` on the worker pool with access to the shared state.
    async fn blocking<F, T>(&self, job: F) -> Result<T, CapabilityError>
    where
        F: FnOnce(&Inner) -> Result<T, CapabilityError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner.workers.run(move || job(&inner)).await?
    }

    fn report(&self, events: &EventEmitter, action: &str, path: &str, err: &CapabilityError) {
        let message = format!("Error {action} {path}: {err}");
        warn!(object = OBJECT_ID, "{message}");
        events.emit("errorOccurred", vec![Value::from(message)]);
    }

    pub async fn read_file(&self, path: &str, events: &EventEmitter) {
        let target = path.to_string();
        let result = self
            .blocking(move |inner| {
                let absolute = inner.sandbox.resolve(&target)?;
                if absolute.is_dir() {
                    return Err(CapabilityError::IsADirectory(target));
                }
                Ok(std::fs::read_to_string(absolute)?)
            })
            .await;

        match result {
            Ok(content) => {
                events.emit("fileRead", vec![path.into(), content.into()]);
            }
            Err(e) => self.report(events, "reading file", path, &e),
        }
    }

    /// Write `content`, creating parent directories and overwriting.
    pub async fn create_file(&self, path: &str, content: &str, events: &EventEmitter) {
        let (target, content) = (path.to_string(), content.to_string());
        let result = self
            .blocking(move |inner| {
                let absolute = inner.sandbox.resolve(&target)?;
                if let Some(parent) = absolute.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&absolute, content)?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => {
                debug!(path, "file created");
                events.emit("fileCreated", vec![path.into()]);
            }
            Err(e) => self.report(events, "creating file", path, &e),
        }
    }

    /// Overwrite `path`; the parent directory must already exist.
    pub async fn change_file_content(&self, path: &str, content: &str, events: &EventEmitter) {
        let (target, content) = (path.to_string(), content.to_string());
        let result = self
            .blocking(move |inner| {
                let absolute = inner.sandbox.resolve(&target)?;
                std::fs::write(&absolute, content)?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => {
                events.emit("fileChanged", vec![path.into()]);
            }
            Err(e) => self.report(events, "changing file content", path, &e),
        }
    }

    pub async fn delete_file(&self, path: &str, events: &EventEmitter) {
        let target = path.to_string();
        let result = self
            .blocking(move |inner| {
                let absolute = inner.sandbox.resolve(&target)?;
                if absolute.is_dir() {
                    return Err(CapabilityError::NotAFile(target));
                }
                std::fs::remove_file(&absolute)?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => {
                events.emit("fileDeleted", vec![path.into()]);
            }
            Err(e) => self.report(events, "deleting file", path, &e),
        }
    }

    /// Recursive; succeeds if the directory already exists.
    pub async fn create_directory(&self, path: &str, events: &EventEmitter) {
        let target = path.to_string();
        let result = self
            .blocking(move |inner| {
                let absolute = inner.sandbox.resolve(&target)?;
                std::fs::create_dir_all(&absolute)?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => {
                events.emit("directoryCreated", vec![path.into()]);
            }
            Err(e) => self.report(events, "creating directory", path, &e),
        }
    }

    /// Removes an empty directory. The base directory itself is refused.
    pub async fn delete_directory(&self, path: &str, events: &EventEmitter) {
        let target = path.to_string();
        let result = self
            .blocking(move |inner| {
                let absolute = inner.sandbox.resolve(&target)?;
                if inner.sandbox.is_root(&absolute) {
                    return Err(CapabilityError::InvalidArgument(
                        "cannot delete the base directory".into(),
                    ));
                }
                std::fs::remove_dir(&absolute)?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => {
                events.emit("directoryDeleted", vec![path.into()]);
            }
            Err(e) => self.report(events, "deleting directory", path, &e),
        }
    }

    async fn listing_json(&self, path: &str) -> Result<String, CapabilityError> {
        let target = path.to_string();
        self.blocking(move |inner| {
            let relative = Sandbox::normalize(&target)?;
            let absolute = inner.sandbox.resolve(&target)?;
            Ok(to_json(&read_listing(&absolute, &relative)?))
        })
        .await
    }

    /// Emit `directoryListed(path, listing)` and refresh the cache entry.
    pub async fn list_directory(&self, path: &str, events: &EventEmitter) {
        match self.listing_json(path).await {
            Ok(listing) => {
                self.inner.cache.insert(path, listing.clone());
                events.emit("directoryListed", vec![path.into(), listing.into()]);
            }
            Err(e) => self.report(events, "listing directory", path, &e),
        }
    }

    /// Return the listing, refresh the cache entry for `path` and emit
    /// `directoryListed`. Failures are reported and returned.
    pub async fn get_directory_contents(
        &self,
        path: &str,
        events: &EventEmitter,
    ) -> Result<String, CapabilityError> {
        match self.listing_json(path).await {
            Ok(listing) => {
                self.inner.cache.insert(path, listing.clone());
                events.emit("directoryListed", vec![path.into(), listing.clone().into()]);
                Ok(listing)
            }
            Err(e) => {
                self.report(events, "listing directory", path, &e);
                Err(e)
            }
        }
    }

    /// Return the cached listing for `path`. On a miss, start a refresh in
    /// the background unless one is already running, and return the loading
    /// placeholder.
    pub fn get_cached_directory_contents(&self, path: &str, events: &EventEmitter) -> String {
        match self.inner.cache.lookup(path) {
            Lookup::Hit(listing) => {
                debug!(path, "directory cache hit");
                return listing;
            }
            Lookup::Pending => debug!(path, "directory cache miss; refresh already running"),
            Lookup::Claimed => {
                debug!(path, "directory cache miss; refreshing");
                let this = self.clone();
                let events = events.clone();
                let target = path.to_string();
                self.inner.refreshes.spawn(async move {
                    // Failures were already reported as errorOccurred.
                    let _ = this.get_directory_contents(&target, &events).await;
                    this.inner.cache.finish_refresh(&target);
                });
            }
        }
        to_json(&loading_listing())
    }

    /// Wait for background cache refreshes to finish.
    pub async fn wait_refreshes(&self) {
        self.inner.refreshes.close();
        self.inner.refreshes.wait().await;
        self.inner.refreshes.reopen();
    }

    /// Hand `path` to the OS default application.
    pub async fn open_file(&self, path: &str, events: &EventEmitter) {
        let target = path.to_string();
        let result = self
            .blocking(move |inner| {
                if target.trim().is_empty() {
                    return Err(CapabilityError::EmptyPath);
                }
                let absolute = inner.sandbox.resolve(&target)?;
                if !absolute.exists() {
                    return Err(CapabilityError::NotFound(target));
                }
                if absolute.is_dir() {
                    return Err(CapabilityError::IsADirectory(target));
                }
                inner.launcher.open(&absolute)
            })
            .await;

        match result {
            Ok(()) => {
                events.emit("fileOpened", vec![path.into()]);
            }
            Err(e) => self.report(events, "opening file", path, &e),
        }
    }

    /// Decode `content` (data URI, bare base64 or text) and write it to
    /// `dir_path/file_name`. The directory must exist.
    pub async fn save_dropped_file(
        &self,
        dir_path: &str,
        file_name: &str,
        content: &str,
        events: &EventEmitter,
    ) -> bool {
        let (dir, name, content) = (dir_path.to_string(), file_name.to_string(), content.to_string());
        let result = self
            .blocking(move |inner| {
                if !is_plain_file_name(&name) {
                    return Err(CapabilityError::InvalidArgument(format!(
                        "file name must be a single path component: {name}"
                    )));
                }
                let directory = inner.sandbox.resolve(&dir)?;
                if !directory.is_dir() {
                    return Err(CapabilityError::DirectoryNotFound(dir));
                }

                let joined = relative_display(&Sandbox::normalize(&dir)?.join(&name));
                let target = inner.sandbox.resolve(&joined)?;
                let (bytes, encoding) = decode_payload(&content)?;
                std::fs::write(&target, &bytes)?;
                info!(path = %joined, bytes = bytes.len(), ?encoding, "dropped file saved");
                Ok(joined)
            })
            .await;

        match result {
            Ok(joined) => {
                events.emit("fileCreated", vec![joined.into()]);
                true
            }
            Err(e) => {
                let target = format!("{}/{}", dir_path.trim_end_matches(['/', '\\']), file_name);
                self.report(events, "saving dropped file", &target, &e);
                false
            }
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|n| n == name)
}

fn str_arg<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str, CapabilityError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| CapabilityError::InvalidArgument(format!("{name} must be a string")))
}

#[async_trait]
impl Capability for FileSystemCapability {
    fn members(&self) -> &'static [MemberDescriptor] {
        MEMBERS
    }

    async fn invoke(
        &self,
        member: &str,
        args: Vec<Value>,
        events: &EventEmitter,
    ) -> Result<Value, CapabilityError> {
        match member {
            "readFile" => self.read_file(str_arg(&args, 0, "path")?, events).await,
            "createFile" => {
                let (path, content) = (str_arg(&args, 0, "path")?, str_arg(&args, 1, "content")?);
                self.create_file(path, content, events).await
            }
            "changeFileContent" => {
                let (path, content) = (str_arg(&args, 0, "path")?, str_arg(&args, 1, "content")?);
                self.change_file_content(path, content, events).await
            }
            "deleteFile" => self.delete_file(str_arg(&args, 0, "path")?, events).await,
            "createDirectory" => self.create_directory(str_arg(&args, 0, "path")?, events).await,
            "deleteDirectory" => self.delete_directory(str_arg(&args, 0, "path")?, events).await,
            "listDirectory" => self.list_directory(str_arg(&args, 0, "path")?, events).await,
            "getDirectoryContents" => {
                let listing = self
                    .get_directory_contents(str_arg(&args, 0, "path")?, events)
                    .await?;
                return Ok(Value::from(listing));
            }
            "getCachedDirectoryContents" => {
                let listing = self.get_cached_directory_contents(str_arg(&args, 0, "path")?, events);
                return Ok(Value::from(listing));
            }
            "openFile" => self.open_file(str_arg(&args, 0, "path")?, events).await,
            "saveDroppedFile" => {
                let saved = self
                    .save_dropped_file(
                        str_arg(&args, 0, "dirPath")?,
                        str_arg(&args, 1, "fileName")?,
                        str_arg(&args, 2, "fileContent")?,
                        events,
                    )
                    .await;
                return Ok(Value::Bool(saved));
            }
            other => {
                return Err(CapabilityError::InvalidArgument(format!(
                    "no such method: {other}"
                )))
            }
        }
        Ok(Value::Null)
    }

    async fn shutdown(&self) {
        self.wait_refreshes().await;
    }
}
