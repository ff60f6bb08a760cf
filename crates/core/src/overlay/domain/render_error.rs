use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("renderer used before setup or after release")]
    NotSetUp,
    #[error("no GPU adapter available")]
    GpuUnavailable,
    #[error("{renderer} renderer cannot draw into a {target} target")]
    TargetMismatch {
        renderer: &'static str,
        target: &'static str,
    },
    #[error("frame cannot be rendered: {0}")]
    InvalidFrame(String),
}
