pub type ScenecastResult<T> = Result<T, ScenecastError>;

#[derive(thiserror::Error, Debug)]
pub enum ScenecastError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("asset missing: '{asset}'{}", scene_suffix(.scene_id))]
    AssetMissing {
        asset: String,
        scene_id: Option<String>,
    },

    #[error("provider error: {message}")]
    Provider { message: String, transient: bool },

    #[error("compose error in scene '{scene_id}': {message}")]
    Compose { scene_id: String, message: String },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not ready: {0}")]
    NotReady(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn scene_suffix(scene_id: &Option<String>) -> String {
    match scene_id {
        Some(id) => format!(" (scene '{id}')"),
        None => String::new(),
    }
}

impl ScenecastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset_missing(asset: impl Into<String>, scene_id: Option<String>) -> Self {
        Self::AssetMissing {
            asset: asset.into(),
            scene_id,
        }
    }

    pub fn provider_transient(msg: impl Into<String>) -> Self {
        Self::Provider {
            message: msg.into(),
            transient: true,
        }
    }

    pub fn provider_fatal(msg: impl Into<String>) -> Self {
        Self::Provider {
            message: msg.into(),
            transient: false,
        }
    }

    pub fn compose(scene_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Compose {
            scene_id: scene_id.into(),
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// Whether the retry loop may attempt this call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { transient: true, .. })
    }

    /// Scene id attached to the error, when it is scoped to one scene.
    pub fn scene_id(&self) -> Option<&str> {
        match self {
            Self::AssetMissing { scene_id, .. } => scene_id.as_deref(),
            Self::Compose { scene_id, .. } => Some(scene_id),
            _ => None,
        }
    }
}
