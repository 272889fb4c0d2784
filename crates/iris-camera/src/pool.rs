//! Kernel buffer pool: request, map, queue and tear down the
//! memory-mapped capture buffers for one session.

use crate::device::Session;
use crate::error::CameraError;
use crate::sys;
use std::mem;
use std::os::fd::RawFd;
use std::slice;

/// Pipelining floor: with fewer than two buffers the device has
/// nowhere to write while we hold the dequeued one.
pub const MIN_BUFFERS: u32 = 2;

/// One memory-mapped plane of a capture buffer.
///
/// The pointer is non-null exactly while the mapping is live; `unmap`
/// is idempotent and `Drop` guarantees release on every exit path,
/// including partial-allocation rollback.
#[derive(Debug)]
pub struct PlaneMapping {
    ptr: *mut u8,
    len: usize,
}

// The mapping is exclusively owned; nothing aliases the pointer, so
// moving it into the capture thread is sound.
unsafe impl Send for PlaneMapping {}

impl PlaneMapping {
    fn map(fd: RawFd, len: usize, offset: i64) -> Result<Self, CameraError> {
        let ptr = sys::map_region(fd, len, offset)
            .map_err(|err| CameraError::MappingFailed(err.to_string()))?;
        Ok(PlaneMapping { ptr, len })
    }

    pub fn is_mapped(&self) -> bool {
        !self.ptr.is_null() && self.len > 0
    }

    /// The mapped bytes, or an empty slice once unmapped.
    pub fn as_slice(&self) -> &[u8] {
        if !self.is_mapped() {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Unmap this plane. Safe to call more than once; an already
    /// released mapping is skipped.
    pub fn unmap(&mut self) {
        if self.is_mapped() {
            sys::unmap_region(self.ptr, self.len);
        }
        self.ptr = std::ptr::null_mut();
        self.len = 0;
    }
}

impl Drop for PlaneMapping {
    fn drop(&mut self) {
        self.unmap();
    }
}

/// One kernel capture buffer: a stable index plus its mapped planes
/// (exactly one for single-plane sessions).
#[derive(Debug)]
pub struct CaptureBuffer {
    index: u32,
    planes: Vec<PlaneMapping>,
}

impl CaptureBuffer {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, idx: usize) -> &[u8] {
        self.planes.get(idx).map(PlaneMapping::as_slice).unwrap_or(&[])
    }
}

/// The set of mapped buffers cycling through the capture queue.
///
/// Owned by the engine; the capture loop borrows one buffer's memory
/// for the duration of a conversion and must requeue before touching
/// the next frame.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Vec<CaptureBuffer>,
    buf_type: u32,
    num_planes: u32,
}

impl BufferPool {
    /// Request `count` buffers, map every plane and prime the capture
    /// queue with all of them.
    ///
    /// Fails with `InsufficientBuffers` when the request or the
    /// kernel grant is below [`MIN_BUFFERS`]; partial mappings are
    /// released by drop on every error path.
    pub fn allocate(session: &Session, count: u32) -> Result<Self, CameraError> {
        if count < MIN_BUFFERS {
            return Err(CameraError::InsufficientBuffers { granted: count });
        }

        let fd = session.raw_fd();
        let buf_type = session.layout().buf_type();

        let mut req: sys::v4l2_requestbuffers = unsafe { mem::zeroed() };
        req.count = count;
        req.type_ = buf_type;
        req.memory = sys::V4L2_MEMORY_MMAP;
        sys::xioctl(fd, sys::VIDIOC_REQBUFS, &mut req)
            .map_err(|err| CameraError::QueueSubmission(format!("VIDIOC_REQBUFS failed: {err}")))?;

        if req.count < MIN_BUFFERS {
            return Err(CameraError::InsufficientBuffers { granted: req.count });
        }
        log::debug!("kernel granted {} capture buffers", req.count);

        let mut pool = BufferPool {
            buffers: Vec::with_capacity(req.count as usize),
            buf_type,
            num_planes: session.num_planes(),
        };

        for index in 0..req.count {
            let buffer = if session.layout().is_multi_planar() {
                pool.map_multi_planar(fd, index)?
            } else {
                pool.map_single_planar(fd, index)?
            };
            pool.buffers.push(buffer);
        }

        // Pump-priming: the device needs every buffer queued before
        // streaming starts.
        for index in 0..pool.buffers.len() as u32 {
            pool.queue(fd, index)?;
        }

        Ok(pool)
    }

    fn map_single_planar(&self, fd: RawFd, index: u32) -> Result<CaptureBuffer, CameraError> {
        let mut buf: sys::v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = self.buf_type;
        buf.memory = sys::V4L2_MEMORY_MMAP;
        buf.index = index;
        sys::xioctl(fd, sys::VIDIOC_QUERYBUF, &mut buf)
            .map_err(|err| CameraError::MappingFailed(format!("VIDIOC_QUERYBUF failed: {err}")))?;

        let offset = unsafe { buf.m.offset } as i64;
        let plane = PlaneMapping::map(fd, buf.length as usize, offset)?;
        Ok(CaptureBuffer {
            index,
            planes: vec![plane],
        })
    }

    fn map_multi_planar(&self, fd: RawFd, index: u32) -> Result<CaptureBuffer, CameraError> {
        let mut planes: [sys::v4l2_plane; sys::VIDEO_MAX_PLANES] = unsafe { mem::zeroed() };
        let mut buf: sys::v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = self.buf_type;
        buf.memory = sys::V4L2_MEMORY_MMAP;
        buf.index = index;
        buf.m.planes = planes.as_mut_ptr();
        buf.length = sys::VIDEO_MAX_PLANES as u32;
        sys::xioctl(fd, sys::VIDIOC_QUERYBUF, &mut buf).map_err(|err| {
            CameraError::MappingFailed(format!("VIDIOC_QUERYBUF (mplane) failed: {err}"))
        })?;

        let plane_count = effective_plane_count(buf.length, self.num_planes);

        // Mapping failure drops the Vec, rolling back the planes
        // already mapped for this buffer.
        let mut mapped = Vec::with_capacity(plane_count);
        for plane in planes.iter().take(plane_count) {
            let offset = unsafe { plane.m.mem_offset } as i64;
            mapped.push(PlaneMapping::map(fd, plane.length as usize, offset)?);
        }
        Ok(CaptureBuffer {
            index,
            planes: mapped,
        })
    }

    /// Submit buffer `index` to the capture queue.
    pub fn queue(&self, fd: RawFd, index: u32) -> Result<(), CameraError> {
        let mut planes: [sys::v4l2_plane; sys::VIDEO_MAX_PLANES] = unsafe { mem::zeroed() };
        let mut buf: sys::v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = self.buf_type;
        buf.memory = sys::V4L2_MEMORY_MMAP;
        buf.index = index;
        if self.buf_type == sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE {
            buf.m.planes = planes.as_mut_ptr();
            buf.length = self.num_planes;
        }
        sys::xioctl(fd, sys::VIDIOC_QBUF, &mut buf)
            .map_err(|err| CameraError::QueueSubmission(format!("VIDIOC_QBUF failed: {err}")))
    }

    /// Take the next filled buffer off the queue.
    ///
    /// Returns `Ok(None)` when no buffer is ready yet (EAGAIN); the
    /// caller backs off briefly instead of busy-spinning.
    pub fn dequeue(&self, fd: RawFd) -> Result<Option<u32>, CameraError> {
        let mut planes: [sys::v4l2_plane; sys::VIDEO_MAX_PLANES] = unsafe { mem::zeroed() };
        let mut buf: sys::v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = self.buf_type;
        buf.memory = sys::V4L2_MEMORY_MMAP;
        if self.buf_type == sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE {
            buf.m.planes = planes.as_mut_ptr();
            buf.length = sys::VIDEO_MAX_PLANES as u32;
        }
        match sys::xioctl(fd, sys::VIDIOC_DQBUF, &mut buf) {
            Ok(()) => {
                if (buf.index as usize) < self.buffers.len() {
                    Ok(Some(buf.index))
                } else {
                    // Defensive: hand an out-of-range index straight back.
                    self.queue(fd, buf.index)?;
                    Ok(None)
                }
            }
            Err(err) if err.raw_os_error() == Some(libc::EAGAIN) => Ok(None),
            Err(err) => Err(CameraError::Streaming(format!(
                "VIDIOC_DQBUF failed: {err}"
            ))),
        }
    }

    pub fn buffer(&self, index: u32) -> Option<&CaptureBuffer> {
        self.buffers.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Unmap every plane of every buffer. Idempotent and infallible;
    /// already-released planes are skipped.
    pub fn release(&mut self) {
        for buffer in &mut self.buffers {
            for plane in &mut buffer.planes {
                plane.unmap();
            }
        }
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        self.release();
    }
}

fn effective_plane_count(reported: u32, negotiated: u32) -> usize {
    let count = if reported == 0 { negotiated } else { reported };
    (count.max(1) as usize).min(sys::VIDEO_MAX_PLANES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PlanarLayout;
    use std::fs::File;
    use std::os::fd::{AsRawFd, OwnedFd};

    fn null_session() -> Session {
        let fd: OwnedFd = File::open("/dev/null").unwrap().into();
        Session::fake(fd, PlanarLayout::SinglePlane)
    }

    #[test]
    fn test_allocate_below_floor_fails_before_any_ioctl() {
        // /dev/null would reject every ioctl; the floor check must
        // reject the request first.
        let session = null_session();
        match BufferPool::allocate(&session, 1) {
            Err(CameraError::InsufficientBuffers { granted }) => assert_eq!(granted, 1),
            other => panic!("expected InsufficientBuffers, got {other:?}"),
        }
        match BufferPool::allocate(&session, 0) {
            Err(CameraError::InsufficientBuffers { granted }) => assert_eq!(granted, 0),
            other => panic!("expected InsufficientBuffers, got {other:?}"),
        }
    }

    #[test]
    fn test_allocate_on_non_video_node_fails_cleanly() {
        let session = null_session();
        match BufferPool::allocate(&session, 4) {
            Err(CameraError::QueueSubmission(msg)) => assert!(msg.contains("VIDIOC_REQBUFS")),
            other => panic!("expected QueueSubmission, got {other:?}"),
        }
    }

    #[test]
    fn test_plane_mapping_unmap_is_idempotent() {
        // MAP_SHARED on /dev/zero gives a real mapping to release.
        let file = File::options()
            .read(true)
            .write(true)
            .open("/dev/zero")
            .unwrap();
        let mut plane = PlaneMapping::map(file.as_raw_fd(), 4096, 0).unwrap();
        assert!(plane.is_mapped());
        assert_eq!(plane.as_slice().len(), 4096);

        plane.unmap();
        assert!(!plane.is_mapped());
        assert!(plane.as_slice().is_empty());

        // Second unmap must not fault or double-unmap.
        plane.unmap();
        assert!(!plane.is_mapped());
    }

    #[test]
    fn test_pool_release_twice_is_noop() {
        let file = File::options()
            .read(true)
            .write(true)
            .open("/dev/zero")
            .unwrap();
        let planes = vec![
            PlaneMapping::map(file.as_raw_fd(), 4096, 0).unwrap(),
            PlaneMapping::map(file.as_raw_fd(), 4096, 0).unwrap(),
        ];
        let mut pool = BufferPool {
            buffers: vec![CaptureBuffer { index: 0, planes }],
            buf_type: sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            num_planes: 1,
        };

        pool.release();
        assert!(pool.buffer(0).unwrap().plane(0).is_empty());
        pool.release();
        assert!(pool.buffer(0).unwrap().plane(0).is_empty());
    }

    #[test]
    fn test_effective_plane_count_defaults() {
        assert_eq!(effective_plane_count(0, 2), 2);
        assert_eq!(effective_plane_count(0, 0), 1);
        assert_eq!(effective_plane_count(3, 2), 3);
        assert_eq!(effective_plane_count(64, 2), sys::VIDEO_MAX_PLANES);
    }
}
