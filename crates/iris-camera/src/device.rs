//! Device negotiation: open the capture node, query its capabilities
//! and settle on a pixel format and planar layout.

use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::format::{PREFERRED_ENCODINGS, PixelEncoding, PlanarLayout};
use crate::sys;
use std::fs::OpenOptions;
use std::mem;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

/// Planes to assume when a multi-planar driver reports zero; some
/// drivers leave the count unfilled on G_FMT.
const DEFAULT_MPLANE_COUNT: u32 = 2;

/// One open capture device with a negotiated format.
///
/// The session owns the file descriptor; dropping it closes the
/// device. A reconfiguration never reuses a session, it tears this
/// one down and opens a new one.
#[derive(Debug)]
pub struct Session {
    fd: OwnedFd,
    path: String,
    width: u32,
    height: u32,
    encoding: PixelEncoding,
    layout: PlanarLayout,
    num_planes: u32,
}

impl Session {
    /// Open `config.device()` and negotiate a format, trying `hint`
    /// (if any) before the standard preference list.
    pub fn open(config: &CameraConfig, hint: Option<PixelEncoding>) -> Result<Self, CameraError> {
        let path = config.device().to_string();
        let fd = open_device(&path)?;
        let layout = query_capabilities(fd.as_raw_fd(), &path)?;

        let mut session = Session {
            fd,
            path,
            width: config.width(),
            height: config.height(),
            encoding: PixelEncoding::Unknown(0),
            layout,
            num_planes: 1,
        };
        session.negotiate_format(hint)?;
        Ok(session)
    }

    /// Try the preferred encodings in order; whatever the driver
    /// actually sets (it may substitute width, height and encoding)
    /// becomes authoritative. If nothing is accepted, adopt the
    /// device's current format.
    fn negotiate_format(&mut self, hint: Option<PixelEncoding>) -> Result<(), CameraError> {
        let candidates = hint
            .into_iter()
            .chain(PREFERRED_ENCODINGS)
            .collect::<Vec<_>>();

        for encoding in candidates {
            if self.try_set_format(encoding) {
                log::debug!(
                    "negotiated {} {}x{} on {} ({:?}, {} plane(s))",
                    self.encoding,
                    self.width,
                    self.height,
                    self.path,
                    self.layout,
                    self.num_planes
                );
                return Ok(());
            }
        }

        self.adopt_current_format()?;
        log::debug!(
            "fell back to current format {} {}x{} on {} ({:?}, {} plane(s))",
            self.encoding,
            self.width,
            self.height,
            self.path,
            self.layout,
            self.num_planes
        );
        Ok(())
    }

    fn try_set_format(&mut self, encoding: PixelEncoding) -> bool {
        let mut fmt: sys::v4l2_format = unsafe { mem::zeroed() };
        fmt.type_ = self.layout.buf_type();
        match self.layout {
            PlanarLayout::MultiPlane => {
                let pix = unsafe { &mut fmt.fmt.pix_mp };
                pix.width = self.width;
                pix.height = self.height;
                pix.pixelformat = encoding.fourcc();
                pix.field = sys::V4L2_FIELD_ANY;
            }
            PlanarLayout::SinglePlane => {
                let pix = unsafe { &mut fmt.fmt.pix };
                pix.width = self.width;
                pix.height = self.height;
                pix.pixelformat = encoding.fourcc();
                pix.field = sys::V4L2_FIELD_ANY;
            }
        }

        if sys::xioctl(self.fd.as_raw_fd(), sys::VIDIOC_S_FMT, &mut fmt).is_err() {
            return false;
        }
        self.store_format(&fmt);
        true
    }

    /// Query whatever format the device already has. This is the last
    /// resort; failure here is a fatal negotiation error.
    fn adopt_current_format(&mut self) -> Result<(), CameraError> {
        let mut fmt: sys::v4l2_format = unsafe { mem::zeroed() };
        fmt.type_ = self.layout.buf_type();
        sys::xioctl(self.fd.as_raw_fd(), sys::VIDIOC_G_FMT, &mut fmt).map_err(|err| {
            CameraError::FormatNegotiation(format!(
                "no preferred encoding accepted and VIDIOC_G_FMT failed on {}: {err}",
                self.path
            ))
        })?;
        self.store_format(&fmt);
        Ok(())
    }

    fn store_format(&mut self, fmt: &sys::v4l2_format) {
        match self.layout {
            PlanarLayout::MultiPlane => {
                let pix = unsafe { &fmt.fmt.pix_mp };
                self.width = pix.width;
                self.height = pix.height;
                self.encoding = PixelEncoding::from_fourcc(pix.pixelformat);
                self.num_planes = if pix.num_planes == 0 {
                    DEFAULT_MPLANE_COUNT
                } else {
                    pix.num_planes as u32
                };
            }
            PlanarLayout::SinglePlane => {
                let pix = unsafe { &fmt.fmt.pix };
                self.width = pix.width;
                self.height = pix.height;
                self.encoding = PixelEncoding::from_fourcc(pix.pixelformat);
                self.num_planes = 1;
            }
        }
    }

    pub fn stream_on(&self) -> Result<(), CameraError> {
        let mut buf_type = self.layout.buf_type() as libc::c_int;
        sys::xioctl(self.fd.as_raw_fd(), sys::VIDIOC_STREAMON, &mut buf_type)
            .map_err(|err| CameraError::Streaming(format!("VIDIOC_STREAMON failed: {err}")))
    }

    /// Best-effort: stream-off runs on the shutdown path where an
    /// error has no consumer.
    pub fn stream_off(&self) {
        let mut buf_type = self.layout.buf_type() as libc::c_int;
        if let Err(err) = sys::xioctl(self.fd.as_raw_fd(), sys::VIDIOC_STREAMOFF, &mut buf_type) {
            log::warn!("VIDIOC_STREAMOFF failed on {}: {err}", self.path);
        }
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn encoding(&self) -> PixelEncoding {
        self.encoding
    }

    pub fn layout(&self) -> PlanarLayout {
        self.layout
    }

    pub fn num_planes(&self) -> u32 {
        self.num_planes
    }

    #[cfg(test)]
    pub(crate) fn fake(fd: OwnedFd, layout: PlanarLayout) -> Self {
        Session {
            fd,
            path: "<test>".to_string(),
            width: 64,
            height: 48,
            encoding: PixelEncoding::Nv12,
            layout,
            num_planes: if layout.is_multi_planar() { 2 } else { 1 },
        }
    }
}

fn open_device(path: &str) -> Result<OwnedFd, CameraError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|err| CameraError::DeviceUnavailable(format!("open({path}) failed: {err}")))?;
    Ok(file.into())
}

/// VIDIOC_QUERYCAP. Multi-planar capture capability takes precedence
/// over single-planar when both are present.
fn query_capabilities(fd: RawFd, path: &str) -> Result<PlanarLayout, CameraError> {
    let mut cap: sys::v4l2_capability = unsafe { mem::zeroed() };
    sys::xioctl(fd, sys::VIDIOC_QUERYCAP, &mut cap).map_err(|err| {
        CameraError::UnsupportedDevice(format!("VIDIOC_QUERYCAP failed on {path}: {err}"))
    })?;

    let layout = if cap.capabilities & sys::V4L2_CAP_VIDEO_CAPTURE_MPLANE != 0 {
        PlanarLayout::MultiPlane
    } else if cap.capabilities & sys::V4L2_CAP_VIDEO_CAPTURE != 0 {
        PlanarLayout::SinglePlane
    } else {
        return Err(CameraError::UnsupportedDevice(format!(
            "{path} does not support video capture"
        )));
    };

    if cap.capabilities & sys::V4L2_CAP_STREAMING == 0 {
        return Err(CameraError::UnsupportedDevice(format!(
            "{path} does not support streaming I/O"
        )));
    }

    Ok(layout)
}
