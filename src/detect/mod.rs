mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{Scenario, StubBackend};
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{Detection, DetectionSet};
