//! YUV 4:2:0 to packed RGB conversion.
//!
//! Frames are first gathered into a linear NV21 buffer (full resolution luma
//! followed by interleaved VU pairs), so every source layout and stride
//! combination ends up in the same shape. The NV21 buffer is then
//! converted pixel by pixel with the BT.601 full range matrix.
//!
//! The converter owns the intermediate buffer and reuses it across frames;
//! the caller owns the output buffer.
use common::{CropRect, Error, Frame, Plane, Result};
use image::RgbImage;

/// Packed output pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb,
    /// RGB followed by an opaque alpha byte.
    Rgba,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }
}

/// Reusable YUV 4:2:0 to RGB converter.
#[derive(Debug, Default)]
pub struct YuvConverter {
    nv21: Vec<u8>,
}

impl YuvConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert the crop region of `frame` into `output`.
    ///
    /// `output` must hold exactly `crop width * crop height * bytes_per_pixel`
    /// bytes. Rows are written top to bottom without padding.
    pub fn convert(&mut self, frame: &Frame, output: &mut [u8], layout: PixelLayout) -> Result<()> {
        validate_frame(frame)?;
        self.convert_validated(frame, output, layout)
    }

    /// Convert into an RGB image, reallocating it only when the crop size changes.
    pub fn convert_rgb_image(&mut self, frame: &Frame, image: &mut RgbImage) -> Result<()> {
        validate_frame(frame)?;

        let dimensions = (frame.crop.width(), frame.crop.height());
        if image.dimensions() != dimensions {
            *image = RgbImage::new(dimensions.0, dimensions.1);
        }

        self.convert_validated(frame, &mut **image, PixelLayout::Rgb)
    }

    /// The NV21 intermediate of the most recent conversion.
    pub fn nv21(&self) -> &[u8] {
        &self.nv21
    }

    fn convert_validated(&mut self, frame: &Frame, output: &mut [u8], layout: PixelLayout) -> Result<()> {
        let expected = frame.crop.pixel_count() * layout.bytes_per_pixel();
        if output.len() != expected {
            return Err(Error::OutputSize {
                expected,
                actual: output.len(),
            });
        }

        self.gather_nv21(frame);
        nv21_to_rgb(&self.nv21, frame.crop, output, layout);

        Ok(())
    }

    fn gather_nv21(&mut self, frame: &Frame) {
        let crop = frame.crop;
        let chroma_crop = crop.halved();
        let pixel_count = crop.pixel_count();

        self.nv21.resize(pixel_count + 2 * chroma_crop.pixel_count(), 0);

        for (index, plane) in frame.planes.iter().enumerate() {
            // V lands first in every chroma pair, whatever the source order
            let (output_offset, output_stride, plane_crop) = match index {
                0 => (0, 1, crop),
                1 => (pixel_count + 1, 2, chroma_crop),
                2 => (pixel_count, 2, chroma_crop),
                _ => break,
            };

            copy_plane(plane, plane_crop, &mut self.nv21[output_offset..], output_stride);
        }
    }
}

/// Check geometry and strides so that no plane is read out of bounds.
fn validate_frame(frame: &Frame) -> Result<()> {
    let crop = frame.crop;

    if frame.width == 0 || frame.height == 0 {
        return Err(Error::invalid_frame(format!(
            "empty frame geometry {}x{}",
            frame.width, frame.height
        )));
    }
    if crop.is_empty() || crop.right > frame.width || crop.bottom > frame.height {
        return Err(Error::invalid_frame(format!(
            "crop {:?} outside of {}x{} frame",
            crop, frame.width, frame.height
        )));
    }
    if crop.halved().is_empty() {
        return Err(Error::invalid_frame(format!(
            "crop {crop:?} leaves no chroma samples"
        )));
    }
    if frame.planes.len() < 3 {
        return Err(Error::invalid_frame(format!(
            "expected 3 planes, got {}",
            frame.planes.len()
        )));
    }

    for (index, plane) in frame.planes.iter().take(3).enumerate() {
        let plane_crop = if index == 0 { crop } else { crop.halved() };
        let required = plane_extent(plane, plane_crop).ok_or_else(|| {
            Error::invalid_frame(format!(
                "plane {index} strides overflow (row {}, pixel {})",
                plane.row_stride, plane.pixel_stride
            ))
        })?;
        if plane.pixel_stride == 0 || required > plane.data.len() {
            return Err(Error::invalid_frame(format!(
                "plane {index} needs {required} bytes for crop {plane_crop:?}, has {} (row stride {}, pixel stride {})",
                plane.data.len(),
                plane.row_stride,
                plane.pixel_stride
            )));
        }
    }

    Ok(())
}

/// One past the last byte read from `plane` for `crop`.
fn plane_extent(plane: &Plane, crop: CropRect) -> Option<usize> {
    let last_row = (crop.bottom as usize - 1).checked_mul(plane.row_stride)?;
    let last_col = (crop.right as usize - 1).checked_mul(plane.pixel_stride)?;
    last_row.checked_add(last_col)?.checked_add(1)
}

/// Copy the `crop` region of `plane` into `output`, one sample every
/// `output_stride` bytes. Rows are bulk copied when both strides are 1.
fn copy_plane(plane: &Plane, crop: CropRect, output: &mut [u8], output_stride: usize) {
    let width = crop.width() as usize;
    let pixel_stride = plane.pixel_stride;
    let bulk = pixel_stride == 1 && output_stride == 1;
    let row_len = if bulk {
        width
    } else {
        (width - 1) * pixel_stride + 1
    };

    let mut out = 0;
    for row in crop.top as usize..crop.bottom as usize {
        let start = row * plane.row_stride + crop.left as usize * pixel_stride;
        let src = &plane.data[start..start + row_len];

        if bulk {
            output[out..out + width].copy_from_slice(src);
            out += width;
        } else {
            for sample in src.iter().step_by(pixel_stride) {
                output[out] = *sample;
                out += output_stride;
            }
        }
    }
}

fn nv21_to_rgb(nv21: &[u8], crop: CropRect, output: &mut [u8], layout: PixelLayout) {
    let width = crop.width() as usize;
    let chroma_crop = crop.halved();
    let chroma_width = chroma_crop.width() as usize;
    let chroma_height = chroma_crop.height() as usize;
    let bytes_per_pixel = layout.bytes_per_pixel();

    let (luma, vu) = nv21.split_at(crop.pixel_count());

    let rows = luma
        .chunks_exact(width)
        .zip(output.chunks_exact_mut(width * bytes_per_pixel));
    for (y, (luma_row, out_row)) in rows.enumerate() {
        let chroma_row = chroma_index(crop.top, y, chroma_height);
        let vu_row = &vu[chroma_row * chroma_width * 2..][..chroma_width * 2];

        let pixels = luma_row.iter().zip(out_row.chunks_exact_mut(bytes_per_pixel));
        for (x, (&sample, pixel)) in pixels.enumerate() {
            let chroma_col = chroma_index(crop.left, x, chroma_width);
            let v = vu_row[2 * chroma_col];
            let u = vu_row[2 * chroma_col + 1];

            pixel[..3].copy_from_slice(&yuv_to_rgb(sample, u, v));
            if layout == PixelLayout::Rgba {
                pixel[3] = 255;
            }
        }
    }
}

/// Chroma row/column covering luma `offset` of a crop edge at `origin`.
///
/// Odd crop edges can reach one sample past the halved chroma crop; those
/// reuse the last chroma sample.
fn chroma_index(origin: u32, offset: usize, len: usize) -> usize {
    let origin = origin as usize;
    ((origin + offset) / 2 - origin / 2).min(len - 1)
}

/// Convert one full range YCbCr sample to RGB.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let cb = u as f32 - 128.0;
    let cr = v as f32 - 128.0;

    [
        clamp_channel(y + 1.402 * cr),
        clamp_channel(y - 0.344_136 * cb - 0.714_136 * cr),
        clamp_channel(y + 1.772 * cb),
    ]
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
