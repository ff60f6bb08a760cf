pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Surface size used when the host does not configure one.
pub const DEFAULT_SURFACE_WIDTH: u32 = 640;
pub const DEFAULT_SURFACE_HEIGHT: u32 = 480;

pub const DEFAULT_FRONT_CAMERA_DEVICE: &str = "/dev/video0";
pub const DEFAULT_BACK_CAMERA_DEVICE: &str = "/dev/video1";
