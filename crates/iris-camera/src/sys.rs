//! Raw V4L2 ABI: struct layouts, ioctl request codes and the thin
//! syscall wrappers the rest of the crate builds on.
//!
//! Layouts match the 64-bit Linux UAPI (`linux/videodev2.h`). Unit
//! tests pin the struct sizes and the resulting x86-64 request codes
//! so a layout regression fails loudly instead of as a runtime EINVAL.

#![allow(non_camel_case_types)]

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

pub const VIDEO_MAX_PLANES: usize = 8;

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE: u32 = 9;
pub const V4L2_MEMORY_MMAP: u32 = 1;
pub const V4L2_FIELD_ANY: u32 = 0;

pub const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
pub const V4L2_CAP_VIDEO_CAPTURE_MPLANE: u32 = 0x0000_1000;
pub const V4L2_CAP_STREAMING: u32 = 0x0400_0000;

/// Build a V4L2 fourcc code from its four ASCII bytes.
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | (code[1] as u32) << 8 | (code[2] as u32) << 16 | (code[3] as u32) << 24
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_plane_pix_format {
    pub sizeimage: u32,
    pub bytesperline: u32,
    pub reserved: [u16; 6],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_pix_format_mplane {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub colorspace: u32,
    pub plane_fmt: [v4l2_plane_pix_format; VIDEO_MAX_PLANES],
    pub num_planes: u8,
    pub flags: u8,
    pub ycbcr_enc: u8,
    pub quantization: u8,
    pub xfer_func: u8,
    pub reserved: [u8; 7],
}

/// Format union. The kernel union also holds window/VBI overlays that
/// contain pointers, which force 8-byte alignment and a 200-byte size
/// on 64-bit targets; `raw` reproduces both.
#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_format_fmt {
    pub pix: v4l2_pix_format,
    pub pix_mp: v4l2_pix_format_mplane,
    pub raw: [u64; 25],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_format {
    pub type_: u32,
    pub fmt: v4l2_format_fmt,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_plane_m {
    pub mem_offset: u32,
    pub userptr: libc::c_ulong,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_plane {
    pub bytesused: u32,
    pub length: u32,
    pub m: v4l2_plane_m,
    pub data_offset: u32,
    pub reserved: [u32; 11],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_buffer_m {
    pub offset: u32,
    pub userptr: libc::c_ulong,
    pub planes: *mut v4l2_plane,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: libc::timeval,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m: v4l2_buffer_m,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: u32,
}

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, nr: u32, size: usize) -> libc::c_ulong {
    ((dir << 30) | ((size as u32) << 16) | ((b'V' as u32) << 8) | nr) as libc::c_ulong
}

pub const VIDIOC_QUERYCAP: libc::c_ulong =
    ioc(IOC_READ, 0, size_of::<v4l2_capability>());
pub const VIDIOC_G_FMT: libc::c_ulong =
    ioc(IOC_READ | IOC_WRITE, 4, size_of::<v4l2_format>());
pub const VIDIOC_S_FMT: libc::c_ulong =
    ioc(IOC_READ | IOC_WRITE, 5, size_of::<v4l2_format>());
pub const VIDIOC_REQBUFS: libc::c_ulong =
    ioc(IOC_READ | IOC_WRITE, 8, size_of::<v4l2_requestbuffers>());
pub const VIDIOC_QUERYBUF: libc::c_ulong =
    ioc(IOC_READ | IOC_WRITE, 9, size_of::<v4l2_buffer>());
pub const VIDIOC_QBUF: libc::c_ulong =
    ioc(IOC_READ | IOC_WRITE, 15, size_of::<v4l2_buffer>());
pub const VIDIOC_DQBUF: libc::c_ulong =
    ioc(IOC_READ | IOC_WRITE, 17, size_of::<v4l2_buffer>());
pub const VIDIOC_STREAMON: libc::c_ulong =
    ioc(IOC_WRITE, 18, size_of::<libc::c_int>());
pub const VIDIOC_STREAMOFF: libc::c_ulong =
    ioc(IOC_WRITE, 19, size_of::<libc::c_int>());

/// ioctl with EINTR retry.
pub fn xioctl<T>(fd: RawFd, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
    loop {
        let r = unsafe { libc::ioctl(fd, request as _, arg as *mut T) };
        if r == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        return Ok(());
    }
}

/// Block until `fd` is readable or the timeout elapses.
///
/// Returns `Ok(false)` on timeout. EINTR restarts the wait.
pub fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    loop {
        let r = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if r == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        return Ok(r > 0);
    }
}

/// Map `len` bytes of the device at `offset` with read/write shared
/// semantics.
pub fn map_region(fd: RawFd, len: usize, offset: i64) -> io::Result<*mut u8> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            offset as libc::off_t,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(ptr as *mut u8)
}

/// Unmap a region. Best-effort: unmap errors on the teardown path have
/// no caller that could act on them.
pub fn unmap_region(ptr: *mut u8, len: usize) {
    if !ptr.is_null() && len > 0 {
        unsafe {
            libc::munmap(ptr as *mut libc::c_void, len);
        }
    }
}
