//! ONNX-based encoder using all-MiniLM-L6-v2.
//!
//! Loads a SentenceTransformers ONNX model and tokenizer to produce
//! 384-dimensional float32 vectors. Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::info;

    use crate::encoder::Encoder;
    use tablerag_core::{Error, Result};

    const MAX_SEQ_LEN: usize = 512;

    const DEFAULT_DIM: usize = 384;

    const MODEL_ID: &str = "all-MiniLM-L6-v2";

    pub struct OnnxEncoder {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        dimension: usize,
    }

    fn inference_err(context: &str, e: impl std::fmt::Display) -> Error {
        Error::Inference(format!("{}: {}", context, e))
    }

    impl OnnxEncoder {
        /// Load an ONNX model and tokenizer from the given directory.
        ///
        /// Expects:
        /// - `model_dir/model.onnx`: the ONNX model file
        /// - `model_dir/tokenizer.json`: the HuggingFace tokenizer
        pub fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::Config(format!("Model not found: {}", model_path.display())));
            }
            if !tokenizer_path.exists() {
                return Err(Error::Config(format!(
                    "Tokenizer not found: {}",
                    tokenizer_path.display()
                )));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime.so
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| inference_err("session builder", e))?
                .with_intra_threads(2)
                .map_err(|e| inference_err("intra threads", e))?
                .commit_from_file(&model_path)
                .map_err(|e| inference_err("load model", e))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| inference_err("load tokenizer", e))?;

            info!(
                "ONNX encoder loaded: dim={}, model={}",
                DEFAULT_DIM,
                model_path.display()
            );

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                dimension: DEFAULT_DIM,
            })
        }
    }

    impl Encoder for OnnxEncoder {
        fn encode(&self, text: &str) -> Result<Array1<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| inference_err("tokenize", e))?;

            let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            let input_ids = &encoding.get_ids()[..seq_len];
            let attention_mask = &encoding.get_attention_mask()[..seq_len];

            let ids_data: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
            let mask_data: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();
            let type_ids_data: Vec<i64> = vec![0i64; seq_len];

            let ids_tensor = Tensor::from_array(([1usize, seq_len], ids_data))
                .map_err(|e| inference_err("ids tensor", e))?;
            let mask_tensor = Tensor::from_array(([1usize, seq_len], mask_data))
                .map_err(|e| inference_err("mask tensor", e))?;
            let type_ids_tensor = Tensor::from_array(([1usize, seq_len], type_ids_data))
                .map_err(|e| inference_err("type_ids tensor", e))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_ids_tensor])
                .map_err(|e| inference_err("run", e))?;

            // [1, seq_len, dim] token embeddings need mean pooling;
            // [1, dim] is already pooled.
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| inference_err("extract output", e))?;
            let dims: Vec<i64> = shape.iter().copied().collect();

            let embedding = match dims.as_slice() {
                [_, _, dim] => {
                    let dim = *dim as usize;
                    let mask_sum: f32 = attention_mask.iter().map(|&m| m as f32).sum();
                    if mask_sum < 1e-9 {
                        return Ok(Array1::zeros(dim));
                    }
                    let mut pooled = Array1::<f32>::zeros(dim);
                    for (i, &m) in attention_mask.iter().enumerate() {
                        if m > 0 {
                            let offset = i * dim;
                            for d in 0..dim {
                                pooled[d] += data[offset + d];
                            }
                        }
                    }
                    pooled / mask_sum
                }
                [_, dim] => Array1::from_vec(data[..*dim as usize].to_vec()),
                other => {
                    return Err(Error::Inference(format!("unexpected output shape: {:?}", other)))
                }
            };

            if embedding.len() != self.dimension {
                return Err(Error::Inference(format!(
                    "model produced {} dims, expected {}",
                    embedding.len(),
                    self.dimension
                )));
            }
            Ok(embedding)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_id(&self) -> &str {
            MODEL_ID
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEncoder;
