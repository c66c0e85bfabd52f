use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::DecodeError;

use super::decode::LatentDecoder;

/// Where a tensor is resident. Decoders declare the device they expect input
/// on; latents carry the device they were captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(u32),
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(idx) => write!(f, "cuda:{idx}"),
        }
    }
}

/// The partially-denoised internal tensor of an in-progress image, prior to
/// first-stage decoding into pixel space. Shape is NCHW.
#[derive(Debug, Clone)]
pub struct Latent {
    data: Vec<f32>,
    shape: [usize; 4],
    device: Device,
}

impl Latent {
    pub fn new(data: Vec<f32>, shape: [usize; 4]) -> Result<Self, DecodeError> {
        Self::on_device(data, shape, Device::Cpu)
    }

    pub fn on_device(
        data: Vec<f32>,
        shape: [usize; 4],
        device: Device,
    ) -> Result<Self, DecodeError> {
        let expected: usize = shape.iter().product();
        if expected == 0 || data.len() != expected {
            return Err(DecodeError::BadShape {
                shape: shape.to_vec(),
            });
        }
        Ok(Self {
            data,
            shape,
            device,
        })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Re-tag the latent as resident on `device`. The buffer itself is host
    /// memory either way; the tag exists so decoders receive input where they
    /// declared they want it.
    pub fn to_device(&self, device: Device) -> Latent {
        Latent {
            data: self.data.clone(),
            shape: self.shape,
            device,
        }
    }
}

/// Shared mutable generation state, the fluxbridge equivalent of the engine's
/// global progress block: the current partial latent plus the active decoder.
/// Both slots are typed options rather than duck-typed attribute lookups, so
/// "no latent yet" and "no model exposed" are ordinary states, not errors.
#[derive(Default)]
pub struct SessionState {
    current_latent: Mutex<Option<Latent>>,
    decoder: Mutex<Option<Arc<dyn LatentDecoder>>>,
    steps_observed: AtomicUsize,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latent(&self, latent: Latent) {
        *self
            .current_latent
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(latent);
    }

    pub fn clear_latent(&self) {
        *self
            .current_latent
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Snapshot of the current partial latent, if any. Early steps may have
    /// none; that is not an error.
    pub fn latent(&self) -> Option<Latent> {
        self.current_latent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_decoder(&self, decoder: Arc<dyn LatentDecoder>) {
        *self.decoder.lock().unwrap_or_else(PoisonError::into_inner) = Some(decoder);
    }

    pub fn decoder(&self) -> Option<Arc<dyn LatentDecoder>> {
        self.decoder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn note_step(&self) {
        self.steps_observed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn steps_observed(&self) -> usize {
        self.steps_observed.load(Ordering::Relaxed)
    }

    /// Prepare the state for a fresh generation: drops the stale latent and
    /// the step counter, keeps the decoder.
    pub fn reset(&self) {
        self.clear_latent();
        self.steps_observed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latent_rejects_mismatched_shape() {
        let err = Latent::new(vec![0.0; 5], [1, 4, 8, 8]).unwrap_err();
        assert!(matches!(err, DecodeError::BadShape { .. }));
    }

    #[test]
    fn latent_rejects_zero_sized_shape() {
        assert!(Latent::new(vec![], [1, 0, 8, 8]).is_err());
    }

    #[test]
    fn to_device_retags_without_touching_data() {
        let l = Latent::new(vec![1.0; 4], [1, 1, 2, 2]).unwrap();
        let moved = l.to_device(Device::Cuda(0));
        assert_eq!(moved.device(), Device::Cuda(0));
        assert_eq!(moved.data(), l.data());
    }

    #[test]
    fn state_starts_empty_and_resets() {
        let state = SessionState::new();
        assert!(state.latent().is_none());
        state.set_latent(Latent::new(vec![0.0; 4], [1, 1, 2, 2]).unwrap());
        state.note_step();
        assert!(state.latent().is_some());
        assert_eq!(state.steps_observed(), 1);
        state.reset();
        assert!(state.latent().is_none());
        assert_eq!(state.steps_observed(), 0);
    }
}
