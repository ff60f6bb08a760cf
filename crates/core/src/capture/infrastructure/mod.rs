pub mod ffmpeg_capture_input;
pub mod still_image_loader;
