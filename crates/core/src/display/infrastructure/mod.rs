pub mod frame_presenter;
pub mod gpu_surface;
pub mod image_file_writer;
pub mod image_view_surface;
