use crate::sys;

/// Pixel encodings the converter understands.
///
/// `Nv12`/`Nv21` are semi-planar: a full-resolution luma plane plus a
/// half-height plane of interleaved chroma pairs (the two variants
/// swap which byte is U and which is V). `Uyvy`/`Yuyv` pack two
/// horizontal pixels into a 4-byte macropixel sharing one chroma
/// pair. Anything else the driver hands back is carried as
/// `Unknown` and rendered through the grayscale fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelEncoding {
    Nv12,
    Nv21,
    Uyvy,
    Yuyv,
    Unknown(u32),
}

/// Negotiation preference order: semi-planar variants first, then the
/// packed macropixel variants.
pub const PREFERRED_ENCODINGS: [PixelEncoding; 4] = [
    PixelEncoding::Nv12,
    PixelEncoding::Nv21,
    PixelEncoding::Uyvy,
    PixelEncoding::Yuyv,
];

impl PixelEncoding {
    pub fn from_fourcc(code: u32) -> Self {
        match code {
            c if c == sys::fourcc(b"NV12") => PixelEncoding::Nv12,
            c if c == sys::fourcc(b"NV21") => PixelEncoding::Nv21,
            c if c == sys::fourcc(b"UYVY") => PixelEncoding::Uyvy,
            c if c == sys::fourcc(b"YUYV") => PixelEncoding::Yuyv,
            c => PixelEncoding::Unknown(c),
        }
    }

    pub fn fourcc(self) -> u32 {
        match self {
            PixelEncoding::Nv12 => sys::fourcc(b"NV12"),
            PixelEncoding::Nv21 => sys::fourcc(b"NV21"),
            PixelEncoding::Uyvy => sys::fourcc(b"UYVY"),
            PixelEncoding::Yuyv => sys::fourcc(b"YUYV"),
            PixelEncoding::Unknown(c) => c,
        }
    }

    pub fn is_semi_planar(self) -> bool {
        matches!(self, PixelEncoding::Nv12 | PixelEncoding::Nv21)
    }

    pub fn is_packed(self) -> bool {
        matches!(self, PixelEncoding::Uyvy | PixelEncoding::Yuyv)
    }
}

impl std::fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.fourcc();
        let bytes = code.to_le_bytes();
        for b in bytes {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

/// Buffer description style negotiated from the device capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanarLayout {
    /// One contiguous buffer per frame.
    SinglePlane,
    /// One independent memory region per color plane.
    MultiPlane,
}

impl PlanarLayout {
    /// The V4L2 buffer type used for every queue operation in this
    /// layout.
    pub fn buf_type(self) -> u32 {
        match self {
            PlanarLayout::SinglePlane => sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            PlanarLayout::MultiPlane => sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE,
        }
    }

    pub fn is_multi_planar(self) -> bool {
        self == PlanarLayout::MultiPlane
    }
}
