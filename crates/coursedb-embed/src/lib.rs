use anyhow::{anyhow, Context, Result};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

use coursedb_core::config::{EmbeddingSettings, ProviderKind};
pub use coursedb_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

/// Output dimension of all-MiniLM-L6-v2.
pub const MINILM_DIM: usize = 384;

/// Directory name the model is looked up under when nothing is configured.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

#[derive(Deserialize)]
struct ModelShape {
    hidden_size: usize,
}

/// Sentence encoder: BERT forward pass, masked mean pooling, L2 normalization.
///
/// Expects `config.json`, `tokenizer.json` and either `model.safetensors` or
/// `pytorch_model.bin` in the model directory.
pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    batch_size: usize,
    pad_id: u32,
}

impl MiniLmEmbedder {
    pub fn new(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let device = select_device();
        info!(model_dir = %model_dir.display(), "loading sentence encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        // Hub tokenizers ship a fixed-length padding config; batches are padded by hand instead.
        tokenizer.with_padding(None);
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let config_path = model_dir.join("config.json");
        let config_json = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&config_json).context("Failed to parse config.json")?;
        let shape: ModelShape = serde_json::from_str(&config_json).context("config.json has no hidden_size")?;

        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb, &config)?;

        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());
        let id = format!("minilm:{}:d{}", name, shape.hidden_size);
        info!(embedder_id = %id, "sentence encoder loaded");
        let batch_size = batch_size.max(1);
        Ok(Self { model, tokenizer, device, id, dim: shape.hidden_size, max_len, batch_size, pad_id })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) =
            tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_vec2::<f32>()?)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        let bytes =
            std::fs::read(&safetensors).with_context(|| format!("Failed to read {}", safetensors.display()))?;
        return Ok(VarBuilder::from_buffered_safetensors(bytes, DType::F32, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        let weights_map: std::collections::HashMap<String, candle_core::Tensor> = weights.into_iter().collect();
        return Ok(VarBuilder::from_tensors(weights_map, DType::F32, device));
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

impl Embedder for MiniLmEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let pb = if texts.len() > self.batch_size {
            let pb = ProgressBar::new(texts.len() as u64);
            let template = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} texts ({percent}%)";
            pb.set_style(ProgressStyle::default_bar().template(template)?.progress_chars("#>-"));
            Some(pb)
        } else {
            None
        };

        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk)?);
            if let Some(pb) = &pb {
                pb.inc(chunk.len() as u64);
            }
        }
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

/// Deterministic hashed bag-of-words embedder for tests and offline runs.
///
/// Each whitespace token adds weight to one xxHash64-selected dimension; the
/// result is L2-normalized. Texts without tokens map to the zero vector.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("fake:xxh64:d{}", dim) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self::new(MINILM_DIM)
    }
}

impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn fake_forced_by_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Build the provider selected by `settings`; `APP_USE_FAKE_EMBEDDINGS=1`
/// forces the fake one.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if fake_forced_by_env() || settings.provider == ProviderKind::Fake {
        info!("using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::default()));
    }
    let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
    Ok(Box::new(MiniLmEmbedder::new(&model_dir, settings.max_len, settings.batch_size)?))
}

/// Locate the model directory: explicit setting, `APP_MODEL_DIR`,
/// `MODEL_DIR`, then `models/all-MiniLM-L6-v2` here or one level up.
pub fn resolve_model_dir(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        let p = coursedb_core::config::expand_path(dir);
        if p.exists() {
            debug!(model_dir = %p.display(), "using configured model dir");
            return Ok(p);
        }
        warn!(model_dir = %p.display(), "configured model dir does not exist");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                debug!(model_dir = %p.display(), "using {}", var);
                return Ok(p);
            }
        }
    }
    for root in ["models", "../models"] {
        let p = Path::new(root).join(DEFAULT_MODEL_NAME);
        if p.exists() {
            debug!(model_dir = %p.display(), "using model dir");
            return Ok(p);
        }
    }
    Err(anyhow!("Could not locate {} model directory", DEFAULT_MODEL_NAME))
}
