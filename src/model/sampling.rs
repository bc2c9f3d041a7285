//! Backend-independent autoregressive decoding over next-token logits.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{error::ServiceError, model::GenerationParams};

/// Runs the decoding loop. `forward` maps the current sequence to the logits
/// of the next token.
pub fn autoregressive_generate<F>(
    input_ids: &[u32],
    params: &GenerationParams,
    mut forward: F,
) -> Result<Vec<Vec<u32>>, ServiceError>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>, ServiceError>,
{
    if input_ids.is_empty() {
        return Err(ServiceError::BadRequest(
            "prompt encoded to zero tokens".into(),
        ));
    }

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let count = params.num_return_sequences.max(1);
    let mut sequences = Vec::with_capacity(count);

    for _ in 0..count {
        let mut ids = input_ids.to_vec();
        for _ in 0..params.max_new_tokens {
            let mut logits = forward(&ids)?;
            if logits.is_empty() {
                return Err(ServiceError::Inference("model returned no logits".into()));
            }

            apply_repetition_penalty(&mut logits, &ids, params.repetition_penalty as f32);
            if let Some(eos) = params.eos_token_id {
                if ids.len() < params.min_length {
                    if let Some(logit) = logits.get_mut(eos as usize) {
                        *logit = f32::NEG_INFINITY;
                    }
                }
            }

            let next = if params.do_sample {
                sample(&logits, params.temperature as f32, params.top_p as f32, &mut rng)
            } else {
                argmax(&logits)
            };
            ids.push(next);

            if params.eos_token_id == Some(next) {
                break;
            }
        }
        sequences.push(ids);
    }

    Ok(sequences)
}

/// Divides positive and multiplies negative logits of every token already
/// present in `history`.
pub fn apply_repetition_penalty(logits: &mut [f32], history: &[u32], penalty: f32) {
    if penalty == 1.0 || penalty <= 0.0 {
        return;
    }
    let mut seen = vec![false; logits.len()];
    for &id in history {
        let idx = id as usize;
        if idx < logits.len() && !seen[idx] {
            seen[idx] = true;
            let logit = &mut logits[idx];
            if *logit > 0.0 {
                *logit /= penalty;
            } else {
                *logit *= penalty;
            }
        }
    }
}

pub fn argmax(logits: &[f32]) -> u32 {
    let mut best = 0usize;
    for (idx, &value) in logits.iter().enumerate() {
        if value > logits[best] {
            best = idx;
        }
    }
    best as u32
}

/// Temperature scaling, softmax and nucleus filtering, then one draw.
pub fn sample<R: Rng>(logits: &[f32], temperature: f32, top_p: f32, rng: &mut R) -> u32 {
    if temperature <= 0.0 {
        return argmax(logits);
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return argmax(logits);
    }

    let mut probs: Vec<(usize, f32)> = logits
        .iter()
        .enumerate()
        .map(|(idx, &logit)| (idx, ((logit - max) / temperature).exp()))
        .collect();
    let total: f32 = probs.iter().map(|(_, p)| p).sum();
    for (_, p) in probs.iter_mut() {
        *p /= total;
    }

    probs.retain(|&(_, p)| p > 0.0);
    probs.sort_by(|a, b| b.1.total_cmp(&a.1));
    let threshold = top_p.clamp(0.0, 1.0);
    let mut cumulative = 0.0f32;
    let mut keep = 0;
    for &(_, p) in &probs {
        cumulative += p;
        keep += 1;
        if cumulative >= threshold {
            break;
        }
    }
    probs.truncate(keep.max(1));

    let mass: f32 = probs.iter().map(|(_, p)| p).sum();
    let mut draw = rng.r#gen::<f32>() * mass;
    for &(idx, p) in &probs {
        if draw < p {
            return idx as u32;
        }
        draw -= p;
    }
    probs.last().map(|&(idx, _)| idx as u32).unwrap_or(0)
}
