use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ndarray::{Array4, ArrayD};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::{Tensor, ValueType};

use super::PoseEngine;
use crate::config::EstimatorConfig;

/// ONNX Runtime session holding the pose network.
pub struct OrtEngine {
    session: Session,
}

impl OrtEngine {
    pub fn new(model_path: &Path, config: &EstimatorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        if session.outputs.is_empty() {
            return Err(anyhow!(
                "model {} declares no outputs",
                model_path.display()
            ));
        }

        log::debug!(
            "pose model {} has {} input(s) and {} output(s)",
            model_path.display(),
            session.inputs.len(),
            session.outputs.len()
        );

        Ok(Self { session })
    }
}

impl PoseEngine for OrtEngine {
    fn forward(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() == 0 {
            return Err(anyhow!("model returned no outputs"));
        }

        let heatmaps = outputs[0].try_extract_array::<f32>()?;
        Ok(heatmaps.to_owned())
    }
}

/// Human-readable summary of a model's inputs and outputs.
pub fn describe_model(model_path: &Path) -> Result<String> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

    let mut out = String::new();
    out.push_str("Inputs:\n");
    for (idx, input) in session.inputs.iter().enumerate() {
        out.push_str(&format!(
            "  {}: name=\"{}\" type={:?}\n",
            idx, input.name, input.input_type
        ));
        if let ValueType::Tensor { shape, .. } = &input.input_type {
            out.push_str(&format!("     shape={:?}\n", shape));
        }
    }

    out.push_str("Outputs:\n");
    for (idx, output) in session.outputs.iter().enumerate() {
        out.push_str(&format!(
            "  {}: name=\"{}\" type={:?}\n",
            idx, output.name, output.output_type
        ));
        if let ValueType::Tensor { shape, .. } = &output.output_type {
            out.push_str(&format!("     shape={:?}\n", shape));
        }
    }

    Ok(out)
}
