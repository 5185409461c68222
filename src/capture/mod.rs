//! Audio capture: backend trait, cpal production backend, and the
//! single-sink recorder that the session manager drives.

pub mod backend;
pub mod device;
pub mod profile;
pub mod recorder;

pub use backend::{CaptureBackend, CaptureError, CaptureSink};
pub use device::CpalBackend;
pub use profile::EncoderProfile;
pub use recorder::CaptureRecorder;
