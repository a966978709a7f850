use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::models::HubModel;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Download of {url} failed with HTTP status {status}")]
    HttpStatus { status: u16, url: String },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Downloads hub models into a local cache and checks them before use.
///
/// Every downloaded file gets a `<file>.sha256` sidecar holding the digest of
/// the bytes received. Verification re-hashes the file against it, which
/// catches truncated writes and files edited behind the cache's back.
///
/// Downloads stream into `<file>.part` and are renamed into place once
/// complete. Hashing whole files runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    client: reqwest::Client,
    download_lock: Arc<Mutex<()>>,
    hub_endpoint: Option<String>,
}

// Runs file hashing off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, ModelError>
where
    F: FnOnce() -> Result<T, ModelError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ModelError::IoError(io::Error::new(io::ErrorKind::Other, e)))?
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("EMOTIVE_CACHE") {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("emotive").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("emotive").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("emotive").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            client: reqwest::Client::new(),
            download_lock: Arc::new(Mutex::new(())),
            hub_endpoint: None,
        })
    }

    /// Downloads from `endpoint` instead of the hub named by `HF_ENDPOINT`.
    pub fn with_hub_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.hub_endpoint = Some(endpoint.into());
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Local directory holding one revision of a model.
    pub fn model_dir(&self, model: &HubModel) -> PathBuf {
        self.models_dir.join(model.cache_name()).join(&model.revision)
    }

    fn local_files(&self, model: &HubModel) -> Vec<PathBuf> {
        let dir = self.model_dir(model);
        model.files().iter().map(|(_, local)| dir.join(local)).collect()
    }

    fn file_url(&self, model: &HubModel, remote: &str) -> String {
        match &self.hub_endpoint {
            Some(endpoint) => model.file_url_at(endpoint, remote),
            None => model.file_url(remote),
        }
    }

    pub fn is_model_downloaded(&self, model: &HubModel) -> bool {
        let files = self.local_files(model);
        log::debug!("Checking if model {} is downloaded:", model.repo_id);
        for path in &files {
            log::debug!("  {:?} (exists: {})", path, path.exists());
        }
        files.iter().all(|path| path.exists())
    }

    pub async fn download_model(&self, model: &HubModel) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;

        let model_dir = self.model_dir(model);
        log::info!("Creating model directory at {:?}", model_dir);
        tokio::fs::create_dir_all(&model_dir).await?;

        for (remote, local) in model.files() {
            let path = model_dir.join(local);
            let existing = path.clone();
            if blocking(move || Self::check_file(&existing)).await? {
                log::info!("Existing {} verified successfully", local);
                continue;
            }

            let url = self.file_url(model, remote);
            if let Err(e) = self.download_and_record(&url, &path, local).await {
                log::error!("Failed to set up {}: {}", local, e);
                // Cleanup on failure
                if let Err(cleanup) = self.remove_download(model).await {
                    log::warn!("Failed to clean up {}: {}", model.repo_id, cleanup);
                }
                return Err(e);
            }
        }

        log::info!("Model {}@{} ready to use", model.repo_id, model.revision);
        Ok(())
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".sha256");
        PathBuf::from(name)
    }

    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".part");
        PathBuf::from(name)
    }

    fn hash_file(path: &Path) -> io::Result<String> {
        let mut file = fs::File::open(path)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Hashes a file and stores the digest in its sidecar. Blocks.
    pub(crate) fn record_digest(path: &Path) -> Result<String, ModelError> {
        let hash = Self::hash_file(path)?;
        fs::write(Self::sidecar_path(path), &hash)?;
        Ok(hash)
    }

    /// Checks a file against its recorded digest. A missing digest counts as
    /// unverified. Blocks.
    fn check_file(path: &Path) -> Result<bool, ModelError> {
        let sidecar = Self::sidecar_path(path);
        if !path.exists() || !sidecar.exists() {
            log::info!("No recorded digest for {:?}", path);
            return Ok(false);
        }
        let expected = fs::read_to_string(&sidecar)?;
        let actual = Self::hash_file(path)?;
        log::debug!("Verifying {:?}: expected {}, got {}", path, expected.trim(), actual);
        Ok(actual == expected.trim())
    }

    fn check_digest(file_type: &str, expected: String, actual: String) -> Result<(), ModelError> {
        if actual == expected {
            return Ok(());
        }
        log::error!("{} hash mismatch: expected {}, got {}", file_type, expected, actual);
        Err(ModelError::HashMismatch {
            file_type: file_type.to_string(),
            expected,
            actual,
        })
    }

    pub async fn verify_model(&self, model: &HubModel) -> Result<bool, ModelError> {
        log::info!("Verifying model files for {}", model.repo_id);
        let files = self.local_files(model);
        blocking(move || {
            for path in files {
                if !Self::check_file(&path)? {
                    log::info!("  {:?} failed verification", path);
                    return Ok(false);
                }
            }
            Ok(true)
        })
        .await
    }

    async fn download_and_record(&self, url: &str, path: &Path, file_type: &str) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let mut request = self.client.get(url);
        if let Ok(token) = env::var("HF_TOKEN") {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        log::info!("Download response status: {}", response.status());
        if !response.status().is_success() {
            return Err(ModelError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = Self::partial_path(path);
        let expected = match Self::stream_to_file(response, &partial).await {
            Ok(hash) => hash,
            Err(e) => {
                Self::discard(&partial).await;
                return Err(e);
            }
        };
        if let Err(e) = tokio::fs::rename(&partial, path).await {
            Self::discard(&partial).await;
            return Err(e.into());
        }

        // Verify after writing
        let written = path.to_path_buf();
        let actual = blocking(move || Self::record_digest(&written)).await?;
        Self::check_digest(file_type, expected, actual)?;

        log::info!("{} file downloaded and verified successfully", file_type);
        Ok(())
    }

    // Writes the response body to `partial` chunk by chunk, returning its digest.
    async fn stream_to_file(response: reqwest::Response, partial: &Path) -> Result<String, ModelError> {
        let mut file = tokio::fs::File::create(partial).await?;
        let mut hasher = Sha256::new();
        let mut received: u64 = 0;

        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        log::info!("Downloaded {} bytes", received);
        Ok(format!("{:x}", hasher.finalize()))
    }

    async fn discard(partial: &Path) {
        if let Err(e) = tokio::fs::remove_file(partial).await {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to remove partial download {:?}: {}", partial, e);
            }
        }
    }

    /// Deletes the model files, their digests and any partial downloads.
    pub async fn remove_download(&self, model: &HubModel) -> Result<(), ModelError> {
        for path in self.local_files(model) {
            for target in [Self::sidecar_path(&path), Self::partial_path(&path), path] {
                match tokio::fs::remove_file(&target).await {
                    Ok(()) => log::debug!("Removed {:?}", target),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, model: &HubModel) -> Result<(), ModelError> {
        log::info!("Checking if model {} is downloaded...", model.repo_id);
        if !self.is_model_downloaded(model) {
            log::info!("Model not found, downloading...");
            self.download_model(model).await?;
        } else if !self.verify_model(model).await? {
            log::info!("Model verification failed, re-downloading...");
            self.remove_download(model).await?;
            self.download_model(model).await?;
        } else {
            log::info!("Model verification successful");
        }
        Ok(())
    }

    /// Fails with `NotDownloaded` unless every model file is present.
    pub fn require_downloaded(&self, model: &HubModel) -> Result<PathBuf, ModelError> {
        if self.is_model_downloaded(model) {
            Ok(self.model_dir(model))
        } else {
            Err(ModelError::NotDownloaded(model.repo_id.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    fn scratch_manager(name: &str) -> ModelManager {
        let dir = env::temp_dir()
            .join(format!("emotive-test-{}-{}", name, std::process::id()))
            .join("models");
        let _ = fs::remove_dir_all(&dir);
        ModelManager::new(&dir).unwrap()
    }

    fn seed_model(manager: &ModelManager, model: &HubModel) {
        let dir = manager.model_dir(model);
        fs::create_dir_all(&dir).unwrap();
        for (_, local) in model.files() {
            let path = dir.join(local);
            fs::write(&path, format!("contents of {}", local)).unwrap();
            ModelManager::record_digest(&path).unwrap();
        }
    }

    // Serves `files` under `/org/emotion/resolve/main/`; anything else is a 404.
    async fn serve_hub(files: &[(&str, &'static str)]) -> String {
        let mut router = Router::new();
        for (file, body) in files {
            let body = *body;
            router = router.route(
                &format!("/org/emotion/resolve/main/{}", file),
                get(move || async move { body }),
            );
        }
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_model_paths() {
        let manager = scratch_manager("paths");
        let model = HubModel::new("org/emotion").with_revision("v2");
        let dir = manager.model_dir(&model);
        assert!(dir.ends_with("org--emotion/v2"));
        assert!(!manager.is_model_downloaded(&model));
        assert!(matches!(
            manager.require_downloaded(&model),
            Err(ModelError::NotDownloaded(_))
        ));
    }

    #[tokio::test]
    async fn test_verification_detects_corruption() -> Result<(), ModelError> {
        let manager = scratch_manager("verify");
        let model = HubModel::new("org/emotion");

        // Test verification of non-existent model
        assert!(!manager.verify_model(&model).await?);

        seed_model(&manager, &model);
        assert!(manager.is_model_downloaded(&model));
        assert!(manager.verify_model(&model).await?);

        // Corrupt file and verify
        let tokenizer = manager.model_dir(&model).join("tokenizer.json");
        fs::write(&tokenizer, "corrupted data")?;
        assert!(!manager.verify_model(&model).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_digest_is_unverified() -> Result<(), ModelError> {
        let manager = scratch_manager("sidecar");
        let model = HubModel::new("org/emotion");
        seed_model(&manager, &model);

        let config = manager.model_dir(&model).join("config.json");
        fs::remove_file(ModelManager::sidecar_path(&config))?;
        assert!(manager.is_model_downloaded(&model));
        assert!(!manager.verify_model(&model).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_download_clears_partial_files() -> Result<(), ModelError> {
        let manager = scratch_manager("remove");
        let model = HubModel::new("org/emotion");
        seed_model(&manager, &model);
        let model_file = manager.model_dir(&model).join("model.onnx");
        fs::write(ModelManager::partial_path(&model_file), "half a model")?;

        manager.remove_download(&model).await?;
        assert!(!manager.is_model_downloaded(&model));
        let leftovers = fs::read_dir(manager.model_dir(&model))?.count();
        assert_eq!(leftovers, 0);

        // Removing again is a no-op
        manager.remove_download(&model).await?;
        Ok(())
    }

    #[test]
    fn test_digest_mismatch_is_reported() {
        assert!(ModelManager::check_digest("model", "abc".into(), "abc".into()).is_ok());

        match ModelManager::check_digest("model", "abc".into(), "def".into()) {
            Err(ModelError::HashMismatch {
                file_type,
                expected,
                actual,
            }) => {
                assert_eq!(file_type, "model");
                assert_eq!(expected, "abc");
                assert_eq!(actual, "def");
            }
            other => panic!("expected hash mismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_streams_files_into_cache() -> Result<(), ModelError> {
        let endpoint = serve_hub(&[
            ("model.onnx", "onnx bytes"),
            ("tokenizer.json", "{\"tokenizer\": true}"),
            ("config.json", "{\"id2label\": {}}"),
        ])
        .await;
        let manager = scratch_manager("stream").with_hub_endpoint(endpoint);
        let model = HubModel::new("org/emotion");

        manager.ensure_model_downloaded(&model).await?;

        let dir = manager.model_dir(&model);
        assert_eq!(fs::read_to_string(dir.join("model.onnx"))?, "onnx bytes");
        assert!(manager.verify_model(&model).await?);
        assert!(!ModelManager::partial_path(&dir.join("model.onnx")).exists());

        // A second call finds everything verified and downloads nothing.
        manager.ensure_model_downloaded(&model).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_http_error_status_fails_and_cleans_up() -> Result<(), ModelError> {
        // The tokenizer is missing upstream, after the model file has landed.
        let endpoint = serve_hub(&[("model.onnx", "onnx bytes"), ("config.json", "{}")]).await;
        let manager = scratch_manager("status").with_hub_endpoint(endpoint);
        let model = HubModel::new("org/emotion");

        match manager.download_model(&model).await {
            Err(ModelError::HttpStatus { status, url }) => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/org/emotion/resolve/main/tokenizer.json"));
            }
            other => panic!("expected HTTP status error, got {:?}", other),
        }

        let leftovers = fs::read_dir(manager.model_dir(&model))?.count();
        assert_eq!(leftovers, 0);
        Ok(())
    }

    #[test]
    fn test_default_models_dir() {
        // Test with environment variable
        env::set_var("EMOTIVE_CACHE", "/tmp/test-cache");
        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("/tmp/test-cache/models"));
        env::remove_var("EMOTIVE_CACHE");

        // Test without environment variable
        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("emotive"));
    }

    #[tokio::test]
    #[ignore = "requires network access to the Hugging Face hub"]
    async fn test_download_default_model() -> Result<(), ModelError> {
        let manager = scratch_manager("download");
        let model = HubModel::default();
        manager.ensure_model_downloaded(&model).await?;
        assert!(manager.verify_model(&model).await?);
        Ok(())
    }
}
