//! Cheap linear latent-to-RGB approximation.
//!
//! Projects the four latent channels onto RGB with the fixed coefficients
//! the upstream webui uses for its low-cost preview path. Good enough to
//! watch an image come into focus; nowhere near a real first-stage decode.

use std::sync::Arc;

use fluxbridge_core::api::{DecodeError, DecodedTensor, Device, Latent, LatentDecoder};

/// RGB projection of the 4 SD latent channels.
const LATENT_RGB: [[f32; 4]; 3] = [
    [0.298, 0.187, -0.158, -0.184],
    [0.207, 0.286, 0.189, -0.271],
    [0.208, 0.173, 0.264, -0.473],
];

pub struct LinearApproxDecoder {
    device: Device,
}

impl LinearApproxDecoder {
    pub fn new() -> Self {
        Self {
            device: Device::Cpu,
        }
    }

    pub fn shared() -> Arc<dyn LatentDecoder> {
        Arc::new(Self::new())
    }

    fn project(&self, latent: &Latent) -> Result<DecodedTensor, DecodeError> {
        let [_, c, h, w] = latent.shape();
        if c < 4 {
            return Err(DecodeError::BadShape {
                shape: latent.shape().to_vec(),
            });
        }

        let plane = h * w;
        let data = latent.data();
        let mut out = vec![0.0f32; 3 * plane];
        for idx in 0..plane {
            for (rgb, coefs) in LATENT_RGB.iter().enumerate() {
                let mut v = 0.0;
                for (ch, coef) in coefs.iter().enumerate() {
                    v += coef * data[ch * plane + idx];
                }
                out[rgb * plane + idx] = v;
            }
        }

        Ok(DecodedTensor {
            data: out,
            shape: vec![3, h, w],
        })
    }
}

impl Default for LinearApproxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LatentDecoder for LinearApproxDecoder {
    fn name(&self) -> &str {
        "linear-approx"
    }

    fn device(&self) -> Device {
        self.device
    }

    /// Signed output, same contract as a real first-stage decode.
    fn decode_first_stage(&self, latent: &Latent) -> Result<DecodedTensor, DecodeError> {
        self.project(latent)
    }

    /// Grayscale from channel 0, already unit-range.
    fn decode_approx(&self, latent: &Latent) -> Result<DecodedTensor, DecodeError> {
        let [_, c, h, w] = latent.shape();
        if c == 0 {
            return Err(DecodeError::BadShape {
                shape: latent.shape().to_vec(),
            });
        }
        let plane = h * w;
        let chan0 = &latent.data()[..plane];
        let mut out = vec![0.0f32; 3 * plane];
        for idx in 0..plane {
            let v = ((chan0[idx] + 1.0) / 2.0).clamp(0.0, 1.0);
            out[idx] = v;
            out[plane + idx] = v;
            out[2 * plane + idx] = v;
        }
        Ok(DecodedTensor {
            data: out,
            shape: vec![3, h, w],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_produces_chw_rgb() {
        let latent = Latent::new(vec![0.5; 16], [1, 4, 2, 2]).unwrap();
        let t = LinearApproxDecoder::new()
            .decode_first_stage(&latent)
            .unwrap();
        assert_eq!(t.shape, vec![3, 2, 2]);
        // R = 0.5 * (0.298 + 0.187 - 0.158 - 0.184)
        let expected = 0.5 * (0.298 + 0.187 - 0.158 - 0.184);
        assert!((t.data[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn rejects_latents_with_too_few_channels() {
        let latent = Latent::new(vec![0.0; 8], [1, 2, 2, 2]).unwrap();
        assert!(LinearApproxDecoder::new()
            .decode_first_stage(&latent)
            .is_err());
    }

    #[test]
    fn approx_path_is_unit_range_grayscale() {
        let latent = Latent::new(vec![1.0; 16], [1, 4, 2, 2]).unwrap();
        let t = LinearApproxDecoder::new().decode_approx(&latent).unwrap();
        assert_eq!(t.shape, vec![3, 2, 2]);
        assert!((t.data[0] - 1.0).abs() < 1e-6);
    }
}
