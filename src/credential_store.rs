//! The registered-application table.
//!
//! The table is read-only after it is loaded. A table that failed to load stays failed: every lookup returns an
//! internal failure until the process is restarted with a fixed source.

use {
    crate::{CredentialStoreError, GetSharedSecretRequest, GetSharedSecretResponse, SharedSecret, SignatureError},
    log::{debug, error, info, warn},
    serde::{Deserialize, Serialize},
    std::{
        collections::HashMap,
        fmt::{Debug, Formatter, Result as FmtResult},
        fs,
        future::{ready, Ready},
        io::Read,
        path::{Path, PathBuf},
        sync::{Arc, OnceLock},
        task::{Context, Poll},
    },
    tower::{BoxError, Service},
};

/// A registered application as it appears in the source file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RegisteredApp {
    /// The application identifier.
    #[serde(rename = "AppId", alias = "appId", alias = "app_id")]
    pub app_id: String,

    /// The base64-encoded shared secret.
    #[serde(rename = "ApiKey", alias = "apiKey", alias = "sharedSecret", alias = "shared_secret")]
    pub shared_secret: String,
}

impl RegisteredApp {
    pub fn new<A: Into<String>, S: Into<String>>(app_id: A, shared_secret: S) -> Self {
        Self {
            app_id: app_id.into(),
            shared_secret: shared_secret.into(),
        }
    }
}

type AppTable = HashMap<String, SharedSecret>;

/// Either the loaded table or the reason it could not be loaded.
type LoadResult = Result<AppTable, String>;

enum AppSource {
    File(PathBuf),
    Loaded,
}

struct StoreInner {
    source: AppSource,
    table: OnceLock<LoadResult>,
}

/// In-memory, read-only table of registered applications.
///
/// Cloning is cheap; clones share the same table. The store is a tower [`Service`] answering
/// [`GetSharedSecretRequest`]s.
#[derive(Clone)]
pub struct RegisteredAppStore {
    inner: Arc<StoreInner>,
}

impl RegisteredAppStore {
    /// Build a store from an in-memory list of applications.
    pub fn from_apps(apps: Vec<RegisteredApp>) -> Result<Self, CredentialStoreError> {
        let table = build_table(apps)?;
        Ok(Self::with_result(AppSource::Loaded, Ok(table)))
    }

    /// Load the store from a JSON file now, returning any load failure to the caller.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CredentialStoreError> {
        let table = load_table(path.as_ref())?;
        Ok(Self::with_result(AppSource::File(path.as_ref().to_path_buf()), Ok(table)))
    }

    /// Create a store that loads the JSON file on first use.
    ///
    /// Concurrent first users all wait for the single load and observe the same outcome. A failed load is sticky.
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                source: AppSource::File(path.into()),
                table: OnceLock::new(),
            }),
        }
    }

    fn with_result(source: AppSource, result: LoadResult) -> Self {
        let table = OnceLock::new();
        let _ = table.set(result);
        Self {
            inner: Arc::new(StoreInner {
                source,
                table,
            }),
        }
    }

    fn table(&self) -> &LoadResult {
        self.inner.table.get_or_init(|| match &self.inner.source {
            AppSource::File(path) => load_table(path).map_err(|e| {
                error!(
                    "Registered applications could not be loaded from {}: {}; rejecting all requests",
                    path.display(),
                    e
                );
                e.to_string()
            }),
            // In-memory tables are set at construction. An empty cell here has nothing to load from.
            AppSource::Loaded => {
                error!("Registered application table was never populated; rejecting all requests");
                Err("registered application table was never populated".to_string())
            }
        })
    }

    /// Force the table to load, returning whether it is usable.
    pub fn is_loaded(&self) -> bool {
        self.table().is_ok()
    }

    /// Look up the shared secret of an application by exact identifier.
    pub fn lookup(&self, app_id: &str) -> Result<SharedSecret, SignatureError> {
        match self.table() {
            Ok(table) => match table.get(app_id) {
                Some(secret) => Ok(secret.clone()),
                None => Err(SignatureError::UnknownApplication(format!("Unknown application: {}", app_id))),
            },
            Err(reason) => {
                error!("Credential store unavailable ({}); rejecting request for application {}", reason, app_id);
                Err(SignatureError::InternalFailure(format!("Credential store unavailable: {}", reason).into()))
            }
        }
    }

    /// Number of registered applications, or zero if the table failed to load.
    pub fn len(&self) -> usize {
        self.table().as_ref().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for RegisteredAppStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut d = f.debug_struct("RegisteredAppStore");
        if let AppSource::File(path) = &self.inner.source {
            d.field("source", path);
        }
        match self.inner.table.get() {
            None => d.field("state", &"unloaded"),
            Some(Ok(table)) => d.field("apps", &table.len()),
            Some(Err(reason)) => d.field("error", reason),
        };
        d.finish()
    }
}

impl Service<GetSharedSecretRequest> for RegisteredAppStore {
    type Response = GetSharedSecretResponse;
    type Error = BoxError;
    type Future = Ready<Result<GetSharedSecretResponse, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetSharedSecretRequest) -> Self::Future {
        ready(
            self.lookup(req.app_id())
                .map(|shared_secret| GetSharedSecretResponse {
                    shared_secret,
                })
                .map_err(Into::into),
        )
    }
}

fn build_table(apps: Vec<RegisteredApp>) -> Result<AppTable, CredentialStoreError> {
    let mut table = HashMap::with_capacity(apps.len());
    for app in apps {
        if table.contains_key(&app.app_id) {
            return Err(CredentialStoreError::DuplicateApplication(app.app_id));
        }

        let secret = SharedSecret::new(app.shared_secret);
        if secret.to_key_bytes().is_err() {
            warn!("Shared secret of application {} is not valid base64; its requests will be rejected", app.app_id);
        }
        table.insert(app.app_id, secret);
    }

    Ok(table)
}

/// Parse a JSON list of registered applications.
pub(crate) fn parse_apps<R: Read>(reader: R) -> Result<Vec<RegisteredApp>, CredentialStoreError> {
    Ok(serde_json::from_reader(reader)?)
}

fn load_table(path: &Path) -> Result<AppTable, CredentialStoreError> {
    debug!("Loading registered applications from {}", path.display());
    let file = fs::File::open(path)?;
    let table = build_table(parse_apps(file)?)?;
    info!("Loaded {} registered applications from {}", table.len(), path.display());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use {
        super::{parse_apps, AppSource, StoreInner},
        crate::{
            CredentialStoreError, GetSharedSecretRequest, RegisteredApp, RegisteredAppStore, SharedSecret,
            SignatureError,
        },
        std::{
            env, fs,
            path::PathBuf,
            process,
            sync::{Arc, OnceLock},
            thread,
        },
        tower::ServiceExt,
    };

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("amx-{}-{}.json", name, process::id()))
    }

    #[test_log::test]
    fn test_parse_apps_field_names() {
        let apps = parse_apps(
            br#"[
                {"AppId": "app1", "ApiKey": "c2VjcmV0"},
                {"appId": "app2", "sharedSecret": "b3RoZXI="}
            ]"#
            .as_slice(),
        )
        .unwrap();
        assert_eq!(apps, vec![RegisteredApp::new("app1", "c2VjcmV0"), RegisteredApp::new("app2", "b3RoZXI=")]);

        assert!(matches!(parse_apps(b"{}".as_slice()), Err(CredentialStoreError::Parse(_))));
    }

    #[test_log::test]
    fn test_lookup() {
        let store = RegisteredAppStore::from_apps(vec![RegisteredApp::new("app1", "c2VjcmV0")]).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.is_loaded());
        assert_eq!(store.lookup("app1").unwrap(), SharedSecret::new("c2VjcmV0"));

        // Exact match only.
        match store.lookup("APP1") {
            Err(SignatureError::UnknownApplication(msg)) => assert_eq!(msg, "Unknown application: APP1"),
            other => panic!("Expected UnknownApplication; got {:?}", other),
        }
    }

    #[test_log::test]
    fn test_duplicate_app_id() {
        let result = RegisteredAppStore::from_apps(vec![
            RegisteredApp::new("app1", "c2VjcmV0"),
            RegisteredApp::new("app1", "b3RoZXI="),
        ]);
        match result {
            Err(CredentialStoreError::DuplicateApplication(id)) => assert_eq!(id, "app1"),
            other => panic!("Expected DuplicateApplication; got {:?}", other),
        }
    }

    #[test_log::test]
    fn test_lazy_file_load() {
        let path = temp_path("lazy");
        fs::write(&path, r#"[{"AppId": "app1", "ApiKey": "c2VjcmV0"}]"#).unwrap();

        let store = RegisteredAppStore::from_file(&path);
        assert!(format!("{:?}", store).contains("unloaded"));

        // Concurrent first users all see the complete table.
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.lookup("app1").is_ok())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        // The table is never reloaded.
        fs::write(&path, "[]").unwrap();
        assert!(store.lookup("app1").is_ok());
        fs::remove_file(&path).unwrap();
    }

    #[test_log::test]
    fn test_missing_file_fails_closed() {
        let store = RegisteredAppStore::from_file(temp_path("does-not-exist"));
        assert!(!store.is_loaded());
        assert!(store.is_empty());
        match store.lookup("app1") {
            Err(SignatureError::InternalFailure(e)) => {
                assert!(e.to_string().starts_with("Credential store unavailable: "))
            }
            other => panic!("Expected InternalFailure; got {:?}", other),
        }

        assert!(matches!(RegisteredAppStore::load(temp_path("does-not-exist")), Err(CredentialStoreError::IO(_))));
    }

    #[test_log::test]
    fn test_corrupt_file_fails_closed() {
        let path = temp_path("corrupt");
        fs::write(&path, "not json").unwrap();
        let store = RegisteredAppStore::from_file(&path);
        assert!(matches!(store.lookup("app1"), Err(SignatureError::InternalFailure(_))));

        // Fixing the file does not help until the process restarts.
        fs::write(&path, r#"[{"AppId": "app1", "ApiKey": "c2VjcmV0"}]"#).unwrap();
        assert!(matches!(store.lookup("app1"), Err(SignatureError::InternalFailure(_))));
        fs::remove_file(&path).unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_service() {
        let store = RegisteredAppStore::from_apps(vec![RegisteredApp::new("app1", "c2VjcmV0")]).unwrap();

        let req = GetSharedSecretRequest::builder().app_id("app1").build().unwrap();
        let resp = store.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.shared_secret().as_base64(), "c2VjcmV0");

        let req = GetSharedSecretRequest::builder().app_id("nope").build().unwrap();
        let e = store.oneshot(req).await.unwrap_err();
        let e = e.downcast::<SignatureError>().unwrap();
        assert!(matches!(*e, SignatureError::UnknownApplication(_)));
    }

    #[test_log::test]
    fn test_unpopulated_in_memory_table_fails_closed() {
        let store = RegisteredAppStore {
            inner: Arc::new(StoreInner {
                source: AppSource::Loaded,
                table: OnceLock::new(),
            }),
        };
        assert!(!store.is_loaded());
        match store.lookup("app1") {
            Err(SignatureError::InternalFailure(e)) => {
                assert_eq!(
                    e.to_string(),
                    "Credential store unavailable: registered application table was never populated"
                )
            }
            other => panic!("Expected InternalFailure; got {:?}", other),
        }
    }
}
