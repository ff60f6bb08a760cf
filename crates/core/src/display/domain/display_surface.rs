use crate::detection::domain::detection::DetectionResult;
use crate::overlay::domain::render_error::RenderError;
use crate::overlay::infrastructure::overlay_renderer::OverlayRenderer;

/// Where detection results become visible.
///
/// A surface owns the overlay renderer bound to it and renders only on
/// request, from the thread that dispatches solution events.
pub trait DisplaySurface: Send {
    /// Binds the renderer that draws results on this surface, releasing
    /// any previous one.
    fn set_solution_result_renderer(&mut self, renderer: OverlayRenderer)
        -> Result<(), RenderError>;

    /// Stores the result to draw on the next [`request_render`](Self::request_render).
    fn set_render_data(&mut self, result: DetectionResult);

    /// Renders the stored result, if any, and presents it. Without new
    /// render data, or while hidden, the previous output stays as it is.
    fn request_render(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;

    /// Surface size in pixels (width, height).
    fn size(&self) -> (u32, u32);
}
