use std::path::PathBuf;

use crossbeam_channel::Sender;

use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraFacing {
    #[default]
    Front,
    Back,
}

/// What a capture input decodes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureSource {
    /// A live camera; the device is chosen by [`CameraFacing`] at start.
    Camera,
    VideoFile(PathBuf),
}

/// Produces frames on its own thread and hands them to a listener.
///
/// Frames that arrive while no listener is attached are dropped.
pub trait CaptureInput: Send {
    /// Attaches or (with `None`) detaches the frame listener.
    ///
    /// Once this returns with `None`, no further frame is delivered.
    fn set_new_frame_listener(&mut self, listener: Option<Sender<Frame>>);

    /// Starts producing frames scaled to `width` x `height`; zero keeps the
    /// source size. `facing` is ignored by non-camera sources.
    fn start(
        &mut self,
        facing: CameraFacing,
        width: u32,
        height: u32,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Stops producing frames and releases the source. Idempotent.
    fn close(&mut self);

    /// True while the source still has frames to deliver.
    fn is_streaming(&self) -> bool;
}
