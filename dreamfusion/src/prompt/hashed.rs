//! Prompt processor with deterministic hashed token embeddings.
//!
//! Each lowercase word maps to a fixed random vector seeded by its FNV-1a
//! hash, so identical prompts always encode identically and prompts sharing
//! words share embedding rows. Prompts are padded with zero rows or
//! truncated to `max_tokens`.

use burn::prelude::*;
use lift3d_core::{fnv1a_str, hash_with_salt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{PromptContext, PromptProcessor, ViewDirection, ViewThresholds};
use crate::config::HashedPromptProcessorConfig;
use crate::error::{DreamFusionError, Result};
use crate::host::from_vec;

/// Prompt processor backed by hashed word embeddings.
#[derive(Debug)]
pub struct HashedPromptProcessor<B: Backend> {
    config: HashedPromptProcessorConfig,
    context: PromptContext<B>,
}

impl<B: Backend> HashedPromptProcessor<B> {
    /// Encode every view-dependent prompt once.
    pub fn new(config: HashedPromptProcessorConfig, device: &B::Device) -> Result<Self> {
        config
            .validate()
            .map_err(|message| DreamFusionError::InvalidConfig { message })?;

        let direction_prompts: Vec<String> = ViewDirection::ALL
            .iter()
            .map(|d| {
                if config.view_dependent_prompting {
                    format!("{}, {}", config.prompt, d.suffix())
                } else {
                    config.prompt.clone()
                }
            })
            .collect();

        let (tokens, dim) = (config.max_tokens, config.embed_dim);
        let mut cond = Vec::with_capacity(direction_prompts.len() * tokens * dim);
        for prompt in &direction_prompts {
            cond.extend(embed_text(prompt, tokens, dim, config.seed));
        }
        let uncond = embed_text(&config.negative_prompt, tokens, dim, config.seed);

        log::info!(
            "Encoded prompt '{}' ({} view buckets, {} tokens x {})",
            config.prompt,
            direction_prompts.len(),
            tokens,
            dim
        );
        for prompt in &direction_prompts {
            log::debug!("  view prompt: {}", prompt);
        }

        let context = PromptContext {
            prompt: config.prompt.clone(),
            direction_prompts,
            text_embeddings: from_vec(cond, [ViewDirection::ALL.len(), tokens, dim], device)?,
            uncond_text_embeddings: from_vec(uncond, [tokens, dim], device)?,
            view_dependent: config.view_dependent_prompting,
            thresholds: ViewThresholds {
                front: config.front_threshold,
                back: config.back_threshold,
                overhead: config.overhead_threshold,
            },
        };

        Ok(Self { config, context })
    }

    /// The processor configuration.
    pub fn config(&self) -> &HashedPromptProcessorConfig {
        &self.config
    }
}

impl<B: Backend> PromptProcessor<B> for HashedPromptProcessor<B> {
    fn encode_prompt(&self) -> PromptContext<B> {
        self.context.clone()
    }
}

/// Lowercase alphanumeric words of a prompt.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Row-major `[max_tokens, dim]` embedding of a text.
fn embed_text(text: &str, max_tokens: usize, dim: usize, seed: u64) -> Vec<f32> {
    let mut out = vec![0.0f32; max_tokens * dim];
    for (row, token) in tokenize(text).iter().take(max_tokens).enumerate() {
        let mut rng = StdRng::seed_from_u64(hash_with_salt(fnv1a_str(token), seed));
        for value in &mut out[row * dim..(row + 1) * dim] {
            *value = rng.gen_range(-1.0f32..1.0);
        }
    }
    out
}
