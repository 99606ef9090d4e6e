//! Sampling primitives shared by every metric family.

mod history;
mod thread;

pub use history::{RawSample, SampleHistory};
pub use thread::SamplerThread;
