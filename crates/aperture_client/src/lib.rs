pub mod camera;
pub mod frame;
pub mod renderer;

pub use camera::Camera;
pub use frame::{FrameDriver, FrameReport};
pub use renderer::{PortalRenderer, RenderStats, ViewSetup};
