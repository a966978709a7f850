use ndarray::{Array1, ArrayView1};

use super::LabelScore;

/// Numerically stable softmax over a logit vector.
pub(crate) fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
    if logits.is_empty() {
        return Array1::zeros(0);
    }
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps = logits.mapv(|x| (x - max).exp());
    let sum = exps.sum();
    if sum > 0.0 && sum.is_finite() {
        exps / sum
    } else {
        Array1::from_elem(logits.len(), 1.0 / logits.len() as f32)
    }
}

/// Element-wise logistic function, used for multi-label heads.
pub(crate) fn sigmoid(logits: ArrayView1<f32>) -> Array1<f32> {
    logits.mapv(|x| 1.0 / (1.0 + (-x).exp()))
}

/// Orders scores highest first; ties keep the model's label order.
pub(crate) fn sort_descending(scores: &mut [LabelScore]) {
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}
