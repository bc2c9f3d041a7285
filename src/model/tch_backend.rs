use std::path::Path;

use parking_lot::Mutex;
use tch::{Device, IValue, Kind, Tensor, no_grad};

use crate::{
    error::ServiceError,
    model::{CausalLanguageModel, GenerationParams, sampling::autoregressive_generate},
};

/// A traced causal LM (TorchScript) whose forward pass returns logits shaped
/// `[batch, seq_len, vocab]`, either bare or as the first tuple element.
pub struct TorchScriptModel {
    name: String,
    device: Device,
    module: Mutex<tch::CModule>,
}

impl TorchScriptModel {
    pub fn load(module_path: &Path, device: Device) -> Result<Self, ServiceError> {
        if !module_path.exists() {
            return Err(ServiceError::Configuration(format!(
                "model artifact missing: {}",
                module_path.display()
            )));
        }
        let mut module = tch::CModule::load_on_device(module_path, device)
            .map_err(|e| ServiceError::Inference(e.to_string()))?;
        module.set_eval();

        let name = module_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "torchscript".to_string());

        Ok(Self {
            name,
            device,
            module: Mutex::new(module),
        })
    }

    fn next_token_logits(
        &self,
        module: &tch::CModule,
        ids: &[u32],
    ) -> Result<Vec<f32>, ServiceError> {
        let input: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
        let input_tensor = Tensor::from_slice(&input)
            .reshape([1, input.len() as i64])
            .to(self.device);

        let output = module
            .forward_is(&[IValue::Tensor(input_tensor)])
            .map_err(|e| ServiceError::Inference(e.to_string()))?;

        let logits = match output {
            IValue::Tensor(t) => t,
            IValue::Tuple(ref tuple) if !tuple.is_empty() => match &tuple[0] {
                IValue::Tensor(t) => t.shallow_clone(),
                _ => {
                    return Err(ServiceError::Inference(
                        "expected tensor as first tuple element".into(),
                    ));
                }
            },
            _ => {
                return Err(ServiceError::Inference(
                    "unexpected model output format".into(),
                ));
            }
        };

        let last = logits
            .select(1, -1)
            .squeeze()
            .to_kind(Kind::Float)
            .to(Device::Cpu);
        Vec::<f32>::try_from(&last).map_err(|e| ServiceError::Inference(e.to_string()))
    }
}

impl CausalLanguageModel for TorchScriptModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        input_ids: &[u32],
        params: &GenerationParams,
    ) -> Result<Vec<Vec<u32>>, ServiceError> {
        let module = self.module.lock();
        no_grad(|| {
            autoregressive_generate(input_ids, params, |ids| {
                self.next_token_logits(&module, ids)
            })
        })
    }
}
