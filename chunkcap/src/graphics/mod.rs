//! Graphics capture.
//!
//! This module provides:
//! - The `GraphicsDevice` seam and its arming parameters
//! - `PlotNaming`, the convention that marks a file as a captured plot
//! - `GraphicsCaptureSession`, which arms the device, watches its folder
//!   and reports each plot it writes

mod device;
mod naming;
mod session;

pub use device::{DeviceSpec, GraphicsDevice};
#[cfg(test)]
pub use device::MockGraphicsDevice;
pub use naming::PlotNaming;
pub use session::{GraphicsCaptureSession, SessionPhase};
