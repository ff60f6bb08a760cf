use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};

use crate::capture::domain::capture_input::{CameraFacing, CaptureInput, CaptureSource};
use crate::shared::constants::{DEFAULT_BACK_CAMERA_DEVICE, DEFAULT_FRONT_CAMERA_DEVICE};
use crate::shared::frame::Frame;

/// libavdevice input format used to open camera devices.
#[cfg(target_os = "linux")]
const CAMERA_INPUT_FORMAT: &str = "video4linux2,v4l2";
#[cfg(target_os = "macos")]
const CAMERA_INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const CAMERA_INPUT_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const CAMERA_INPUT_FORMAT: &str = "";

/// Device paths (or libavdevice device names) per camera facing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDevices {
    pub front: String,
    pub back: String,
}

impl CameraDevices {
    pub fn device_for(&self, facing: CameraFacing) -> &str {
        match facing {
            CameraFacing::Front => &self.front,
            CameraFacing::Back => &self.back,
        }
    }
}

impl Default for CameraDevices {
    fn default() -> Self {
        Self {
            front: DEFAULT_FRONT_CAMERA_DEVICE.to_string(),
            back: DEFAULT_BACK_CAMERA_DEVICE.to_string(),
        }
    }
}

type Listener = Arc<Mutex<Option<Sender<Frame>>>>;

/// Capture input over ffmpeg-next: a camera device or a video file.
///
/// Decoding runs on a dedicated thread. Each frame is converted to RGB24,
/// optionally scaled, and offered to the listener with `try_send`, so a
/// busy consumer drops frames instead of stalling the decoder. Video files
/// are paced at their nominal frame rate.
pub struct FfmpegCaptureInput {
    source: CaptureSource,
    devices: CameraDevices,
    listener: Listener,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FfmpegCaptureInput {
    pub fn new(source: CaptureSource, devices: CameraDevices) -> Self {
        Self {
            source,
            devices,
            listener: Arc::new(Mutex::new(None)),
            stop: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn source(&self) -> &CaptureSource {
        &self.source
    }

    fn open(&self, facing: CameraFacing) -> Result<OpenedInput, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let (ictx, pace) = match &self.source {
            CaptureSource::VideoFile(path) => (ffmpeg_next::format::input(path)?, true),
            CaptureSource::Camera => {
                ffmpeg_next::device::register_all();
                let device = self.devices.device_for(facing);
                let format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == CAMERA_INPUT_FORMAT)
                    .ok_or_else(|| format!("Camera input format unavailable: {CAMERA_INPUT_FORMAT}"))?;
                let ctx = ffmpeg_next::format::open_with(
                    &PathBuf::from(device),
                    &ffmpeg_next::format::format::Format::Input(format),
                    ffmpeg_next::Dictionary::new(),
                )?;
                (ctx.input(), false)
            }
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let rate = stream.avg_frame_rate();
        let frame_interval = if pace && rate.numerator() > 0 && rate.denominator() > 0 {
            Some(Duration::from_secs_f64(
                rate.denominator() as f64 / rate.numerator() as f64,
            ))
        } else {
            None
        };
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        Ok(OpenedInput {
            ictx,
            decoder,
            stream_index,
            frame_interval,
        })
    }
}

impl CaptureInput for FfmpegCaptureInput {
    fn set_new_frame_listener(&mut self, listener: Option<Sender<Frame>>) {
        // a poisoned lock only means a decoder thread panicked mid-send
        let mut slot = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        *slot = listener;
    }

    fn start(
        &mut self,
        facing: CameraFacing,
        width: u32,
        height: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.close();

        let opened = self.open(facing)?;
        let out_width = if width > 0 { width } else { opened.decoder.width() };
        let out_height = if height > 0 { height } else { opened.decoder.height() };
        log::info!(
            "Capture started: {:?} ({}x{} -> {}x{})",
            self.source,
            opened.decoder.width(),
            opened.decoder.height(),
            out_width,
            out_height
        );

        self.stop.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        let listener = self.listener.clone();
        let stop = self.stop.clone();
        let running = self.running.clone();

        let handle = thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                if let Err(e) = decode_loop(opened, out_width, out_height, &listener, &stop) {
                    log::error!("Capture failed: {e}");
                }
                running.store(false, Ordering::SeqCst);
            })?;
        self.worker = Some(handle);
        Ok(())
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
            log::debug!("Capture closed");
        }
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_streaming(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for FfmpegCaptureInput {
    fn drop(&mut self) {
        self.close();
    }
}

/// An opened source, moved onto the decoder thread.
struct OpenedInput {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    stream_index: usize,
    frame_interval: Option<Duration>,
}

// Safety: OpenedInput is created on the caller's thread and then moved to
// the decoder thread, which is its only user from then on.
unsafe impl Send for OpenedInput {}

struct FrameSink<'a> {
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    next_index: usize,
    frame_interval: Option<Duration>,
    next_due: Instant,
    listener: &'a Listener,
}

impl FrameSink<'_> {
    fn drain(
        &mut self,
        decoder: &mut ffmpeg_next::decoder::Video,
        stop: &AtomicBool,
    ) -> Result<(), ffmpeg_next::Error> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }
            let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
            self.scaler.run(&decoded, &mut rgb)?;
            let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
            let frame = Frame::new(pixels, self.width, self.height, 3, self.next_index);
            self.next_index += 1;

            if let Some(interval) = self.frame_interval {
                let now = Instant::now();
                if self.next_due > now {
                    thread::sleep(self.next_due - now);
                }
                self.next_due = self.next_due.max(now) + interval;
            }
            self.deliver(frame);
        }
        Ok(())
    }

    fn deliver(&self, frame: Frame) {
        let slot = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = slot.as_ref() else {
            return;
        };
        match sender.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                log::trace!("Dropped frame {}: consumer busy", frame.index());
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

fn decode_loop(
    opened: OpenedInput,
    width: u32,
    height: u32,
    listener: &Listener,
    stop: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let OpenedInput {
        mut ictx,
        mut decoder,
        stream_index,
        frame_interval,
    } = opened;

    let scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )?;
    let mut sink = FrameSink {
        scaler,
        width,
        height,
        next_index: 0,
        frame_interval,
        next_due: Instant::now(),
        listener,
    };

    for (stream, packet) in ictx.packets() {
        if stop.load(Ordering::SeqCst) {
            return Ok(());
        }
        if stream.index() != stream_index {
            continue;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        sink.drain(&mut decoder, stop)?;
    }

    let _ = decoder.send_eof();
    sink.drain(&mut decoder, stop)?;
    log::info!("Capture reached end of stream after {} frames", sink.next_index);
    Ok(())
}

/// Copies an RGB24 ffmpeg frame into a tightly packed buffer, dropping row
/// padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32) {
        ffmpeg_next::init().unwrap();
        let fps = 30;

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        let write_packets = |encoder: &mut ffmpeg_next::encoder::Video,
                             octx: &mut ffmpeg_next::format::context::Output| {
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut rgb = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let value = ((i * 40) % 256) as u8;
            rgb.data_mut(0).fill(value);
            let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            write_packets(&mut encoder, &mut octx);
        }
        encoder.send_eof().unwrap();
        write_packets(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }

    fn wait_until_done(capture: &FfmpegCaptureInput) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while capture.is_streaming() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn video_input(path: &Path) -> FfmpegCaptureInput {
        FfmpegCaptureInput::new(
            CaptureSource::VideoFile(path.to_path_buf()),
            CameraDevices::default(),
        )
    }

    #[test]
    fn test_device_for_facing() {
        let devices = CameraDevices {
            front: "front-cam".into(),
            back: "back-cam".into(),
        };
        assert_eq!(devices.device_for(CameraFacing::Front), "front-cam");
        assert_eq!(devices.device_for(CameraFacing::Back), "back-cam");
    }

    #[test]
    fn test_video_frames_reach_listener_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 5, 160, 120);

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut capture = video_input(&path);
        capture.set_new_frame_listener(Some(tx));
        capture.start(CameraFacing::Front, 0, 0).unwrap();
        wait_until_done(&capture);
        capture.close();

        let frames: Vec<Frame> = rx.try_iter().collect();
        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!((frame.width(), frame.height(), frame.channels()), (160, 120, 3));
        }
    }

    #[test]
    fn test_frames_scaled_to_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 2, 160, 120);

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut capture = video_input(&path);
        capture.set_new_frame_listener(Some(tx));
        capture.start(CameraFacing::Back, 80, 60).unwrap();
        wait_until_done(&capture);

        let frame = rx.try_recv().unwrap();
        assert_eq!((frame.width(), frame.height()), (80, 60));
        assert_eq!(frame.data().len(), 80 * 60 * 3);
    }

    #[test]
    fn test_no_listener_drops_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 3, 64, 48);

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut capture = video_input(&path);
        capture.set_new_frame_listener(Some(tx));
        capture.set_new_frame_listener(None);
        capture.start(CameraFacing::Front, 0, 0).unwrap();
        wait_until_done(&capture);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_start_missing_file_fails() {
        let mut capture = video_input(Path::new("/nonexistent/clip.mp4"));
        assert!(capture.start(CameraFacing::Front, 0, 0).is_err());
        assert!(!capture.is_streaming());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut capture = video_input(Path::new("/nonexistent/clip.mp4"));
        capture.close();
        capture.close();
        assert!(!capture.is_streaming());
    }
}
