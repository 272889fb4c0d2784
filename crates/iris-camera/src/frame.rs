/// A decoded frame: interleaved RGB, row-major, no padding.
///
/// `data.len()` is always `width * height * 3`. Frames are owned
/// values; the capture loop moves each one across the delivery
/// channel and keeps nothing behind.
#[derive(Clone, Debug)]
pub struct RgbFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The pixel at (x, y) as (r, g, b). Panics out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        assert!(x < self.width && y < self.height);
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }
}
