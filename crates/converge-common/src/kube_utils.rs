//! Shared Kubernetes utilities using kube-rs

use std::path::Path;
use std::time::Duration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Where to load cluster credentials from.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions<'a> {
    /// Explicit kubeconfig file. When `None`, kube defaults apply
    /// (`KUBECONFIG`, then `~/.kube/config`, then in-cluster config).
    pub kubeconfig: Option<&'a Path>,
    /// Kubeconfig context to select instead of the current one
    pub context: Option<&'a str>,
}

/// Create a kube client with default timeouts
pub async fn create_client(options: &ClientOptions<'_>) -> Result<Client, Error> {
    create_client_with_timeout(options, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client with custom timeouts
pub async fn create_client_with_timeout(
    options: &ClientOptions<'_>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let kube_options = KubeConfigOptions {
        context: options.context.map(str::to_string),
        ..Default::default()
    };

    let mut config = match (options.kubeconfig, options.context) {
        (Some(path), _) => {
            debug!(path = %path.display(), "loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig {}: {}", path.display(), e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &kube_options)
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        (None, Some(_)) => Config::from_kubeconfig(&kube_options).await.map_err(|e| {
            Error::internal_with_context(
                "create_client",
                format!("failed to load kubeconfig: {}", e),
            )
        })?,
        (None, None) => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };

    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// True if the kube error is an API 404
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// Strip server-managed metadata from a resource before writing it.
///
/// Removes fields that belong to a specific live object and would make a
/// create fail or turn a replace into a conditional update:
/// - uid
/// - resourceVersion
/// - creationTimestamp
/// - managedFields
/// - generation
pub fn strip_server_metadata(meta: &mut ObjectMeta) {
    meta.uid = None;
    meta.resource_version = None;
    meta.creation_timestamp = None;
    meta.managed_fields = None;
    meta.generation = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: test
  cluster:
    server: https://127.0.0.1:6443
    insecure-skip-tls-verify: true
contexts:
- name: test
  context:
    cluster: test
    user: test
    namespace: default
- name: other
  context:
    cluster: test
    user: test
current-context: test
users:
- name: test
  user:
    token: abc123
"#;

    fn kubeconfig_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
        file.write_all(KUBECONFIG.as_bytes())
            .expect("kubeconfig should be written");
        file
    }

    #[tokio::test]
    async fn test_create_client_from_explicit_kubeconfig() {
        let file = kubeconfig_file();
        let options = ClientOptions {
            kubeconfig: Some(file.path()),
            context: None,
        };
        assert!(create_client(&options).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_client_with_named_context() {
        let file = kubeconfig_file();
        let options = ClientOptions {
            kubeconfig: Some(file.path()),
            context: Some("other"),
        };
        assert!(create_client(&options).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_client_unknown_context_fails() {
        let file = kubeconfig_file();
        let options = ClientOptions {
            kubeconfig: Some(file.path()),
            context: Some("missing"),
        };
        let err = create_client(&options)
            .await
            .err()
            .expect("unknown context should fail");
        assert_eq!(err.context(), Some("create_client"));
    }

    #[tokio::test]
    async fn test_create_client_missing_file_fails() {
        let options = ClientOptions {
            kubeconfig: Some(Path::new("/nonexistent/converge/kubeconfig")),
            context: None,
        };
        let err = create_client(&options)
            .await
            .err()
            .expect("missing kubeconfig should fail");
        assert!(err.to_string().contains("failed to read kubeconfig"));
    }

    #[test]
    fn test_is_not_found() {
        let not_found = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "deployments.apps \"web\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        let forbidden = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        });
        assert!(is_not_found(&not_found));
        assert!(!is_not_found(&forbidden));
    }

    #[test]
    fn test_strip_server_metadata() {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "web".to_string());

        let mut meta = ObjectMeta {
            name: Some("web".to_string()),
            namespace: Some("default".to_string()),
            labels: Some(labels.clone()),
            uid: Some("abc-123".to_string()),
            resource_version: Some("12345".to_string()),
            generation: Some(5),
            ..Default::default()
        };

        strip_server_metadata(&mut meta);

        assert_eq!(meta.name.as_deref(), Some("web"));
        assert_eq!(meta.namespace.as_deref(), Some("default"));
        assert_eq!(meta.labels, Some(labels));
        assert!(meta.uid.is_none());
        assert!(meta.resource_version.is_none());
        assert!(meta.generation.is_none());
    }
}
