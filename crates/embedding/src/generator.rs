use crate::error::{EmbeddingError, Result};
use crate::features::feature_vector;
use serde::{Deserialize, Serialize};
use tree_sitter::Tree;

/// Vector widths the configuration accepts
const SUPPORTED_WIDTHS: [usize; 6] = [128, 256, 384, 512, 768, 1024];

/// External pretrained embedding model (out-of-scope collaborator). Failures
/// here are absorbed by the generator's feature-mode fallback.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// Delegate to the external model, falling back to feature mode on error
    Semantic,
    /// Deterministic feature composition only
    Feature,
}

/// Configuration for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    pub vector_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Semantic,
            vector_size: 768,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_WIDTHS.contains(&self.vector_size) {
            return Err(EmbeddingError::InvalidConfig(format!(
                "vector_size {} is not one of {SUPPORTED_WIDTHS:?}",
                self.vector_size
            )));
        }
        Ok(())
    }
}

/// Produces fixed-width vectors from code text (+ optional tree). Never
/// fails: the feature path is total and the semantic path falls through to
/// it on any model error.
pub struct EmbeddingGenerator {
    config: EmbeddingConfig,
    model: Option<Box<dyn EmbeddingModel>>,
}

impl EmbeddingGenerator {
    pub fn new(config: EmbeddingConfig, model: Option<Box<dyn EmbeddingModel>>) -> Result<Self> {
        config.validate()?;
        if config.mode == EmbeddingMode::Semantic && model.is_none() {
            log::info!("No semantic embedding model available, using feature mode");
        }
        Ok(Self { config, model })
    }

    #[must_use]
    pub const fn vector_size(&self) -> usize {
        self.config.vector_size
    }

    /// Generate an embedding for a code text.
    #[must_use]
    pub fn embed(&self, text: &str, tree: Option<&Tree>) -> Vec<f32> {
        if self.config.mode == EmbeddingMode::Semantic {
            if let Some(model) = &self.model {
                match model.embed(text) {
                    Ok(vector) => return resize(&vector, self.config.vector_size),
                    Err(err) => {
                        log::warn!("Semantic embedding failed, falling back to features: {err}");
                    }
                }
            }
        }

        resize(&feature_vector(text, tree), self.config.vector_size)
    }
}

/// Cosine similarity; 0.0 on length mismatch or zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Resize a vector to the target width.
///
/// Shorter vectors keep their entries at their original indices, then the
/// remaining slots are filled with `tanh(v[i % n] * v[(i * 7) % n])` so the
/// tail is not literal zeros. Longer vectors are down-sampled by even-stride
/// index selection spanning the full original range.
fn resize(vector: &[f32], target: usize) -> Vec<f32> {
    let n = vector.len();
    if n == target {
        return vector.to_vec();
    }
    if n == 0 {
        return vec![0.0; target];
    }

    if n < target {
        let mut out = vec![0.0f32; target];
        out[..n].copy_from_slice(vector);
        for i in n..target {
            out[i] = (vector[i % n] * vector[(i * 7) % n]).tanh();
        }
        out
    } else if target == 0 {
        Vec::new()
    } else if target == 1 {
        vec![vector[0]]
    } else {
        (0..target)
            .map(|i| vector[i * (n - 1) / (target - 1)])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tree_sitter::Parser;

    struct FailingModel;

    impl EmbeddingModel for FailingModel {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(EmbeddingError::ModelError("model unavailable".to_string()))
        }
    }

    struct FixedModel(Vec<f32>);

    impl EmbeddingModel for FixedModel {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn feature_generator(width: usize) -> EmbeddingGenerator {
        EmbeddingGenerator::new(
            EmbeddingConfig {
                mode: EmbeddingMode::Feature,
                vector_size: width,
            },
            None,
        )
        .unwrap()
    }

    fn parse(text: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        parser.parse(text, None).unwrap()
    }

    #[test]
    fn self_similarity_is_one() {
        let generator = feature_generator(128);
        let text = "def f(a):\n    return a * 2\n";
        let tree = parse(text);
        let vector = generator.embed(text, Some(&tree));

        assert_eq!(vector.len(), 128);
        let sim = cosine_similarity(&vector, &vector);
        assert!((sim - 1.0).abs() < 1e-5, "self similarity was {sim}");
    }

    #[test]
    fn zero_norm_similarity_is_zero() {
        let zeros = vec![0.0f32; 8];
        let ones = vec![1.0f32; 8];
        assert_eq!(cosine_similarity(&zeros, &ones), 0.0);
        assert_eq!(cosine_similarity(&ones, &zeros), 0.0);
    }

    #[test]
    fn length_mismatch_similarity_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn resize_up_preserves_original_entries() {
        let original = vec![1.0, -2.0, 3.0, 0.5];
        let resized = resize(&original, 16);

        assert_eq!(resized.len(), 16);
        assert_eq!(&resized[..4], original.as_slice());
        // Filled tail stays in tanh range
        assert!(resized[4..].iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn resize_down_selects_even_strides_over_full_range() {
        let original: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let resized = resize(&original, 10);

        assert_eq!(resized.len(), 10);
        assert_eq!(resized[0], 0.0);
        assert_eq!(resized[9], 99.0);
        // Strictly increasing selection implies distinct, ordered indices
        for pair in resized.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn semantic_failure_falls_back_to_features() {
        let generator = EmbeddingGenerator::new(
            EmbeddingConfig {
                mode: EmbeddingMode::Semantic,
                vector_size: 128,
            },
            Some(Box::new(FailingModel)),
        )
        .unwrap();

        let fallback = feature_generator(128);
        let text = "x = 1\n";
        assert_eq!(generator.embed(text, None), fallback.embed(text, None));
    }

    #[test]
    fn semantic_model_output_is_resized() {
        let generator = EmbeddingGenerator::new(
            EmbeddingConfig {
                mode: EmbeddingMode::Semantic,
                vector_size: 128,
            },
            Some(Box::new(FixedModel(vec![0.5; 16]))),
        )
        .unwrap();

        let vector = generator.embed("x = 1\n", None);
        assert_eq!(vector.len(), 128);
        assert_eq!(vector[0], 0.5);
        assert_eq!(vector[15], 0.5);
    }

    #[test]
    fn unsupported_width_is_rejected() {
        let result = EmbeddingGenerator::new(
            EmbeddingConfig {
                mode: EmbeddingMode::Feature,
                vector_size: 100,
            },
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn embeddings_are_deterministic() {
        let generator = feature_generator(256);
        let text = "def add(a, b):\n    return a + b\n";
        let tree = parse(text);

        let first = generator.embed(text, Some(&tree));
        let second = generator.embed(text, Some(&tree));
        assert_eq!(first, second);
    }
}
