#[cfg(feature = "candle")]
mod candle_tensor;

use crate::error::{Error, Result};

/// Row-major `f32` tensor. Observations, actions and rewards all travel in this form so adapters
/// do not need to agree on a tensor library.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

impl Buffer {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        if data.len() != numel(&shape) {
            return Err(Error::configuration(format!(
                "buffer of {} elements does not fit shape {shape:?}",
                data.len()
            )));
        }
        Ok(Self { data, shape })
    }

    pub fn from_vec(data: Vec<f32>) -> Self {
        let shape = vec![data.len()];
        Self { data, shape }
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        Self::full(0., shape)
    }

    pub fn full(value: f32, shape: Vec<usize>) -> Self {
        Self {
            data: vec![value; numel(&shape)],
            shape,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn reshape(self, shape: Vec<usize>) -> Result<Self> {
        Self::new(self.data, shape)
    }

    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    /// Clamps every element against per-component bounds. The bounds describe the trailing
    /// `min.len()` elements and are repeated over whatever batch dimensions lead the buffer.
    pub fn clamp(&self, min: &[f32], max: &[f32]) -> Self {
        debug_assert_eq!(min.len(), max.len());
        let k = min.len().max(1);
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(idx, v)| v.max(min[idx % k]).min(max[idx % k]))
            .collect();
        Self {
            data,
            shape: self.shape.clone(),
        }
    }

    pub fn to_data(self) -> Vec<f32> {
        self.data
    }
}
