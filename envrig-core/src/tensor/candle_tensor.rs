use crate::{
    error::{Error, Result},
    tensor::Buffer,
};
use anyhow::Context;
use candle_core::{Device, Tensor as CandleTensor};

impl TryFrom<Buffer> for CandleTensor {
    type Error = Error;

    fn try_from(val: Buffer) -> Result<Self> {
        let Buffer { data, shape } = val;
        let tensor = CandleTensor::from_vec(data, shape, &Device::Cpu)
            .context("could not build candle tensor from buffer")?;
        Ok(tensor)
    }
}

impl TryFrom<&CandleTensor> for Buffer {
    type Error = Error;

    fn try_from(value: &CandleTensor) -> Result<Self> {
        let shape = value.dims().to_vec();
        let data: Vec<f32> = value
            .to_dtype(candle_core::DType::F32)
            .and_then(|t| t.flatten_all())
            .and_then(|t| t.to_vec1())
            .context("could not read candle tensor into buffer")?;
        Buffer::new(data, shape)
    }
}

impl Buffer {
    pub fn to_candle_tensor(&self) -> Result<CandleTensor> {
        self.clone().try_into()
    }

    pub fn from_candle_tensor(tensor: &CandleTensor) -> Result<Self> {
        tensor.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_round_trip_keeps_shape() -> Result<()> {
        let buffer = Buffer::new(vec![1., 2., 3., 4., 5., 6.], vec![2, 3])?;
        let tensor = buffer.to_candle_tensor()?;
        assert_eq!(tensor.dims(), &[2, 3]);
        let back = Buffer::from_candle_tensor(&tensor)?;
        assert_eq!(back, buffer);
        Ok(())
    }
}
