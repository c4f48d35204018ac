//! Camera frame data model.
//!
//! A [`Frame`] describes one YUV 4:2:0 capture the way camera HALs hand it
//! out: a full resolution luma plane followed by two half resolution chroma
//! planes, each with its own row stride and pixel stride, plus a crop
//! rectangle selecting the valid region.
use crate::{Error, Result};

/// One plane of a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<u8>,
    /// Distance in bytes between the starts of two consecutive rows.
    pub row_stride: usize,
    /// Distance in bytes between two consecutive samples of a row.
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }
}

/// Crop rectangle with exclusive `right` and `bottom` edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Crop covering a whole `width` x `height` buffer.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Crop of a 2x2 subsampled plane: every edge halved, rounding toward zero.
    pub fn halved(&self) -> Self {
        Self::new(self.left / 2, self.top / 2, self.right / 2, self.bottom / 2)
    }
}

/// A YUV 4:2:0 camera frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Y, U (Cb) and V (Cr) planes, in that order.
    pub planes: Vec<Plane>,
    pub crop: CropRect,
    pub sequence: u64,
    pub timestamp_ns: u64,
}

impl Frame {
    /// Create a frame whose crop covers the whole buffer.
    pub fn new(width: u32, height: u32, planes: Vec<Plane>) -> Self {
        Self {
            width,
            height,
            planes,
            crop: CropRect::full(width, height),
            sequence: 0,
            timestamp_ns: 0,
        }
    }

    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_timestamp(mut self, sequence: u64, timestamp_ns: u64) -> Self {
        self.sequence = sequence;
        self.timestamp_ns = timestamp_ns;
        self
    }

    /// Number of bytes of one contiguous 4:2:0 frame (I420, NV12 or NV21).
    pub fn contiguous_len(width: u32, height: u32) -> usize {
        let (chroma_width, chroma_height) = chroma_size(width, height);
        width as usize * height as usize + 2 * chroma_width * chroma_height
    }

    /// Wrap a contiguous I420 buffer: Y plane, then U plane, then V plane.
    pub fn i420(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        let (luma, chroma) = split_contiguous(width, height, data)?;
        let (chroma_width, chroma_height) = chroma_size(width, height);
        let (u, v) = chroma.split_at(chroma_width * chroma_height);

        Ok(Self::new(
            width,
            height,
            vec![
                Plane::new(luma.to_vec(), width as usize, 1),
                Plane::new(u.to_vec(), chroma_width, 1),
                Plane::new(v.to_vec(), chroma_width, 1),
            ],
        ))
    }

    /// Wrap a contiguous NV12 buffer: Y plane, then interleaved UV pairs.
    pub fn nv12(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        let (luma, chroma) = split_contiguous(width, height, data)?;
        Ok(Self::semi_planar(width, height, luma, chroma, 0, 1))
    }

    /// Wrap a contiguous NV21 buffer: Y plane, then interleaved VU pairs.
    pub fn nv21(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        let (luma, chroma) = split_contiguous(width, height, data)?;
        Ok(Self::semi_planar(width, height, luma, chroma, 1, 0))
    }

    /// Overwrite this frame with `other`, reusing the plane allocations.
    pub fn copy_from(&mut self, other: &Frame) {
        self.width = other.width;
        self.height = other.height;
        self.crop = other.crop;
        self.sequence = other.sequence;
        self.timestamp_ns = other.timestamp_ns;

        self.planes.resize_with(other.planes.len(), Plane::default);
        for (dst, src) in self.planes.iter_mut().zip(other.planes.iter()) {
            dst.data.clear();
            dst.data.extend_from_slice(&src.data);
            dst.row_stride = src.row_stride;
            dst.pixel_stride = src.pixel_stride;
        }
    }

    /// Expose an interleaved chroma plane as two pixel-stride-2 views, the
    /// same way the camera stack reports semi-planar buffers.
    fn semi_planar(
        width: u32,
        height: u32,
        luma: &[u8],
        chroma: &[u8],
        u_offset: usize,
        v_offset: usize,
    ) -> Self {
        let (chroma_width, _) = chroma_size(width, height);
        let row_stride = 2 * chroma_width;

        Self::new(
            width,
            height,
            vec![
                Plane::new(luma.to_vec(), width as usize, 1),
                Plane::new(chroma[u_offset..].to_vec(), row_stride, 2),
                Plane::new(chroma[v_offset..].to_vec(), row_stride, 2),
            ],
        )
    }
}

fn chroma_size(width: u32, height: u32) -> (usize, usize) {
    (width.div_ceil(2) as usize, height.div_ceil(2) as usize)
}

fn split_contiguous(width: u32, height: u32, data: &[u8]) -> Result<(&[u8], &[u8])> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_frame(format!(
            "empty frame geometry {width}x{height}"
        )));
    }
    let expected = Frame::contiguous_len(width, height);
    if data.len() < expected {
        return Err(Error::invalid_frame(format!(
            "{width}x{height} frame needs {expected} bytes, got {}",
            data.len()
        )));
    }

    let luma_len = width as usize * height as usize;
    Ok((&data[..luma_len], &data[luma_len..expected]))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_halved_crop_rounds_toward_zero() {
        let crop = CropRect::new(1, 3, 7, 9).halved();
        assert_eq!(crop, CropRect::new(0, 1, 3, 4));
        assert_eq!(crop.width(), 3);
        assert_eq!(crop.height(), 3);
    }

    #[test]
    fn test_contiguous_len_rounds_chroma_up() {
        assert_eq!(Frame::contiguous_len(4, 2), 8 + 4);
        assert_eq!(Frame::contiguous_len(3, 3), 9 + 8);
    }

    #[test]
    fn test_nv21_planes_alias_interleaved_chroma() -> Result<()> {
        // 2x2 luma, one VU pair
        let frame = Frame::nv21(2, 2, &[1, 2, 3, 4, 200, 100])?;

        assert_eq!(frame.planes[0].data, vec![1, 2, 3, 4]);
        assert_eq!(frame.planes[1].data[0], 100);
        assert_eq!(frame.planes[2].data[0], 200);
        assert_eq!(frame.planes[1].pixel_stride, 2);
        assert_eq!(frame.crop, CropRect::full(2, 2));

        Ok(())
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let res = Frame::i420(4, 4, &[0; 10]);
        assert!(matches!(res, Err(Error::InvalidFrame { .. })));
    }

    #[test]
    fn test_copy_from_reuses_slot() -> Result<()> {
        let src = Frame::i420(2, 2, &[9, 9, 9, 9, 1, 2])?.with_timestamp(7, 42);
        let mut slot = Frame::default();
        slot.copy_from(&src);
        assert_eq!(slot, src);

        let smaller = Frame::new(1, 1, vec![Plane::new(vec![5], 1, 1)]);
        slot.copy_from(&smaller);
        assert_eq!(slot.planes.len(), 1);
        assert_eq!(slot.planes[0].data, vec![5]);

        Ok(())
    }
}
