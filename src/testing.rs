//! Test doubles shared by unit tests.

use crate::embedding::Embedder;
use crate::error::{AcervoError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

const DIMENSIONS: usize = 32;

/// Deterministic bag-of-words embedder: each lowercase word bumps one bucket.
#[derive(Default)]
pub struct WordEmbedder {
    pub calls: AtomicUsize,
}

impl WordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % DIMENSIONS] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for WordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Embedder whose provider is always down.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AcervoError::ProviderUnavailable("embedding service down".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AcervoError::ProviderUnavailable("embedding service down".to_string()))
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}
