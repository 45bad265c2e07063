//! Local command-line backends. These cover development and self-hosted
//! setups; hosted vendors plug in behind the same traits.

use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt as _;

use super::NarrationSynthesizer;
use crate::{
    error::{ScenecastError, ScenecastResult},
    model::NarrationSpec,
};

/// Narration through a local piper-style TTS binary: text on stdin, a wav
/// file argument for output. Voice selection maps onto a model file in
/// `model_dir` named `<voice>.onnx`.
pub struct PiperNarrator {
    binary: PathBuf,
    model_dir: PathBuf,
}

impl PiperNarrator {
    pub fn new(binary: impl Into<PathBuf>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model_dir: model_dir.into(),
        }
    }
}

#[async_trait]
impl NarrationSynthesizer for PiperNarrator {
    fn name(&self) -> &str {
        "piper"
    }

    async fn synthesize(
        &self,
        text: &str,
        spec: &NarrationSpec,
        out: &std::path::Path,
    ) -> ScenecastResult<()> {
        let model = self.model_dir.join(format!("{}.onnx", spec.voice));
        if !model.is_file() {
            return Err(ScenecastError::provider_fatal(format!(
                "no piper model for voice '{}'",
                spec.voice
            )));
        }

        let mut child = tokio::process::Command::new(&self.binary)
            .arg("--model")
            .arg(&model)
            .arg("--output_file")
            .arg(out)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ScenecastError::provider_fatal(format!(
                    "failed to spawn '{}': {e}",
                    self.binary.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| ScenecastError::provider_transient(format!("piper stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ScenecastError::provider_transient(format!("piper wait: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScenecastError::provider_transient(format!(
                "piper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !out.is_file() {
            return Err(ScenecastError::provider_transient(
                "piper reported success but wrote no audio",
            ));
        }
        Ok(())
    }
}
