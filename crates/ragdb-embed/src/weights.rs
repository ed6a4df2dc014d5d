use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Locate a model directory: explicit path first, then each environment
/// variable, then the conventional relative locations.
pub fn resolve_model_dir(explicit: Option<&Path>, env_keys: &[&str], candidates: &[&str]) -> Result<PathBuf> {
    if let Some(p) = explicit {
        if p.exists() { info!("Using configured model dir: {}", p.display()); return Ok(p.to_path_buf()); }
    }
    for key in env_keys {
        if let Ok(dir) = std::env::var(key) {
            let p = PathBuf::from(&dir);
            if p.exists() { info!("Using {}: {}", key, p.display()); return Ok(p); }
        }
    }
    for c in candidates {
        let p = Path::new(c);
        if p.exists() { info!("Using model dir: {}", p.display()); return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate model directory (tried {:?} and {:?})", env_keys, candidates))
}

/// Load all tensors from `model.safetensors`, or `pytorch_model.bin` when no
/// safetensors file is present.
pub fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&pickle)
        .map_err(|e| anyhow!("Failed to read weights from {}: {}", pickle.display(), e))?;
    weights
        .into_iter()
        .map(|(name, t)| -> Result<(String, Tensor)> { Ok((name, t.to_device(device)?)) })
        .collect()
}
