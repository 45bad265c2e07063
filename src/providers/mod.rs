//! Seams to the external generation services. The pipeline only ever sees
//! these traits; concrete backends are a closed set picked by configuration,
//! with fallback expressed as an explicit ordered chain.

pub mod local;
pub mod retry;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;

use crate::{
    error::{ScenecastError, ScenecastResult},
    model::NarrationSpec,
};
pub use retry::{RetryPolicy, call_with_retry};

/// Turns scene text into an audio file at `out`.
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(
        &self,
        text: &str,
        spec: &NarrationSpec,
        out: &Path,
    ) -> ScenecastResult<()>;
}

/// Turns narration audio plus scene text into a talking-head clip at `out`.
#[async_trait]
pub trait AvatarSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(
        &self,
        text: &str,
        narration: &Path,
        style: &str,
        out: &Path,
    ) -> ScenecastResult<()>;
}

/// Maps caller-supplied asset ids onto local files.
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, asset_id: &str) -> ScenecastResult<PathBuf>;
}

/// Ordered narration fallback. Each provider gets the full retry budget;
/// the next one is consulted only once the previous budget is exhausted.
pub struct NarrationChain {
    providers: Vec<Arc<dyn NarrationSynthesizer>>,
    policy: RetryPolicy,
}

impl NarrationChain {
    pub fn new(providers: Vec<Arc<dyn NarrationSynthesizer>>, policy: RetryPolicy) -> Self {
        Self { providers, policy }
    }

    pub async fn synthesize(
        &self,
        text: &str,
        spec: &NarrationSpec,
        out: &Path,
    ) -> ScenecastResult<()> {
        if self.providers.is_empty() {
            return Err(ScenecastError::provider_fatal(
                "no narration provider configured",
            ));
        }

        let mut last_err = None;
        for provider in &self.providers {
            let label = format!("narration[{}]", provider.name());
            match call_with_retry(&self.policy, &label, || {
                provider.synthesize(text, spec, out)
            })
            .await
            {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() || matches!(e, ScenecastError::Provider { .. }) => {
                    tracing::warn!(provider = provider.name(), error = %e, "narration provider exhausted, trying fallback");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.expect("at least one provider was consulted"))
    }
}

/// Avatar synthesis wrapped in the same retry discipline. Avatars have no
/// fallback tier; there is one configured backend or none.
pub struct AvatarClient {
    provider: Option<Arc<dyn AvatarSynthesizer>>,
    policy: RetryPolicy,
}

impl AvatarClient {
    pub fn new(provider: Option<Arc<dyn AvatarSynthesizer>>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub async fn synthesize(
        &self,
        text: &str,
        narration: &Path,
        style: &str,
        out: &Path,
    ) -> ScenecastResult<()> {
        let Some(provider) = &self.provider else {
            return Err(ScenecastError::provider_fatal(
                "no avatar provider configured",
            ));
        };
        let label = format!("avatar[{}]", provider.name());
        call_with_retry(&self.policy, &label, || {
            provider.synthesize(text, narration, style, out)
        })
        .await
    }
}

/// Resolves asset ids against a single root directory. Ids are plain file
/// names; anything that would escape the root is rejected.
pub struct DirAssetResolver {
    root: PathBuf,
}

impl DirAssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetResolver for DirAssetResolver {
    fn resolve(&self, asset_id: &str) -> ScenecastResult<PathBuf> {
        if asset_id.is_empty()
            || asset_id.contains("..")
            || asset_id.contains('/')
            || asset_id.contains('\\')
        {
            return Err(ScenecastError::asset_missing(asset_id, None));
        }
        let path = self.root.join(asset_id);
        if !path.is_file() {
            return Err(ScenecastError::asset_missing(asset_id, None));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    struct ScriptedNarrator {
        name: String,
        fail_first: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl NarrationSynthesizer for ScriptedNarrator {
        fn name(&self) -> &str {
            &self.name
        }

        async fn synthesize(
            &self,
            _text: &str,
            _spec: &NarrationSpec,
            out: &Path,
        ) -> ScenecastResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(ScenecastError::provider_transient("simulated outage"));
            }
            std::fs::write(out, self.name.as_bytes()).map_err(anyhow::Error::from)?;
            Ok(())
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 2,
            base_delay: Duration::from_millis(1),
            call_timeout: Duration::from_secs(5),
        }
    }

    fn spec() -> NarrationSpec {
        NarrationSpec {
            voice: "v1".to_string(),
            language: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn fallback_is_consulted_only_after_primary_budget() {
        let primary = Arc::new(ScriptedNarrator {
            name: "primary".to_string(),
            fail_first: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let secondary = Arc::new(ScriptedNarrator {
            name: "secondary".to_string(),
            fail_first: 0,
            calls: AtomicU32::new(0),
        });
        let chain = NarrationChain::new(vec![primary.clone(), secondary.clone()], policy());

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("n.wav");
        chain.synthesize("hi", &spec(), &out).await.unwrap();

        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&out).unwrap(), b"secondary");
    }

    #[tokio::test]
    async fn primary_recovering_within_budget_skips_fallback() {
        let primary = Arc::new(ScriptedNarrator {
            name: "primary".to_string(),
            fail_first: 1,
            calls: AtomicU32::new(0),
        });
        let secondary = Arc::new(ScriptedNarrator {
            name: "secondary".to_string(),
            fail_first: 0,
            calls: AtomicU32::new(0),
        });
        let chain = NarrationChain::new(vec![primary, secondary.clone()], policy());

        let dir = tempfile::tempdir().unwrap();
        chain
            .synthesize("hi", &spec(), &dir.path().join("n.wav"))
            .await
            .unwrap();
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_chain_is_a_fatal_provider_error() {
        let chain = NarrationChain::new(vec![], policy());
        let dir = tempfile::tempdir().unwrap();
        let err = chain
            .synthesize("hi", &spec(), &dir.path().join("n.wav"))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn dir_resolver_rejects_traversal_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bg.png"), b"png").unwrap();
        let resolver = DirAssetResolver::new(dir.path());

        assert!(resolver.resolve("bg.png").is_ok());
        assert!(matches!(
            resolver.resolve("nope.png"),
            Err(ScenecastError::AssetMissing { .. })
        ));
        assert!(resolver.resolve("../etc/passwd").is_err());
        assert!(resolver.resolve("a/b.png").is_err());
    }
}
