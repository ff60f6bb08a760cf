pub mod gpu_context;
pub mod overlay_renderer;
pub mod raster_overlay_renderer;
pub mod shader_overlay_renderer;
