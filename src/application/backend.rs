// ============================================================
// Layer 2 — Backend Selection
// ============================================================
// trainer.device picks the burn backend a run is compiled against:
//
//   cpu                    → Autodiff<NdArray>
//   wgpu | gpu | cuda      → Autodiff<Wgpu>, best available adapter
//   wgpu:N | gpu:N | cuda:N → Autodiff<Wgpu>, discrete GPU N
//
// Backends are types, not values, so a use case hands its work to
// dispatch() as a BackendJob and gets it run with the right type.

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use std::{fmt, str::FromStr};

use crate::domain::error::TrainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSpec {
    Cpu,
    /// `None` lets wgpu choose the adapter
    Gpu(Option<usize>),
}

impl FromStr for DeviceSpec {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (kind, index) = match s.split_once(':') {
            Some((kind, index)) => (kind, Some(index)),
            None => (s.as_str(), None),
        };
        let invalid = || TrainError::InvalidConfig(format!(
            "unknown device '{s}': expected cpu, wgpu, gpu, cuda or one of those with ':<index>'"
        ));

        match (kind, index) {
            ("cpu", None) => Ok(Self::Cpu),
            ("wgpu" | "gpu" | "cuda", None) => Ok(Self::Gpu(None)),
            ("wgpu" | "gpu" | "cuda", Some(index)) => {
                index.parse::<usize>().map(|i| Self::Gpu(Some(i))).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu            => write!(f, "cpu"),
            Self::Gpu(None)      => write!(f, "wgpu"),
            Self::Gpu(Some(i))   => write!(f, "wgpu:{i}"),
        }
    }
}

/// Work that needs a concrete autodiff backend.
pub trait BackendJob {
    type Output;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<Self::Output>;
}

pub fn dispatch<J: BackendJob>(device: DeviceSpec, job: J) -> Result<J::Output> {
    tracing::info!("Using device: {}", device);
    match device {
        DeviceSpec::Cpu          => job.run::<Autodiff<NdArray>>(NdArrayDevice::Cpu),
        DeviceSpec::Gpu(None)    => job.run::<Autodiff<Wgpu>>(WgpuDevice::default()),
        DeviceSpec::Gpu(Some(i)) => job.run::<Autodiff<Wgpu>>(WgpuDevice::DiscreteGpu(i)),
    }
}
