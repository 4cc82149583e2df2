use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use stagehand_foundation::VisionError;

/// Wraps a physical camera device (C8's frame source), grounded in
/// `nokhwa`'s blocking capture API: open once, then pull frames on demand.
pub struct CameraSource {
    camera: Camera,
    pos: i32,
}

impl CameraSource {
    /// Opens device `pos` (the OS enumeration index) at the highest
    /// frame rate the device reports for its default resolution.
    pub fn open(pos: i32) -> Result<Self, VisionError> {
        let index = CameraIndex::Index(pos as u32);
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(index, format)
            .map_err(|_| VisionError::CameraNotFound { pos })?;
        camera
            .open_stream()
            .map_err(|_| VisionError::CameraNotFound { pos })?;
        Ok(Self { camera, pos })
    }

    /// Reads one frame. A decode or capture failure is reported as
    /// `CameraDisconnected` — the camera loop treats it exactly like a
    /// dropped device and counts it against the consecutive-empty-read
    /// retry budget.
    pub fn read_frame(&mut self) -> Result<RgbImage, VisionError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|_| VisionError::CameraDisconnected)?;
        buffer
            .decode_image::<RgbFormat>()
            .map_err(|_| VisionError::CameraDisconnected)
    }

    pub fn pos(&self) -> i32 {
        self.pos
    }
}
