//! Frame sources.
//!
use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read, Seek, SeekFrom},
    path::Path,
    time::Instant,
};

use anyhow::{bail, Context, Result};
use common::{CropRect, Frame};

pub type CaptureFn = Box<dyn FnMut() -> Option<Frame> + Send>;

/// Layout of the frames in a raw dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RawFormat {
    /// Y plane, U plane, V plane
    I420,
    /// Y plane, interleaved UV
    Nv12,
    /// Y plane, interleaved VU (Android camera default)
    Nv21,
}

impl RawFormat {
    fn wrap(self, width: u32, height: u32, data: &[u8]) -> common::Result<Frame> {
        match self {
            RawFormat::I420 => Frame::i420(width, height, data),
            RawFormat::Nv12 => Frame::nv12(width, height, data),
            RawFormat::Nv21 => Frame::nv21(width, height, data),
        }
    }
}

/// Get a capture function replaying a raw YUV 4:2:0 dump frame by frame.
///
/// The dump is a plain concatenation of frames, as written by e.g.
/// `ffmpeg -pix_fmt nv21 -f rawvideo`. With `repeat`, playback wraps around
/// at the end of the file instead of ending.
pub fn get_capture_fn_file(
    path: impl AsRef<Path>,
    format: RawFormat,
    (width, height): (u32, u32),
    crop: Option<CropRect>,
    repeat: bool,
) -> Result<CaptureFn> {
    let path = path.as_ref();
    let frame_len = Frame::contiguous_len(width, height);
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let file_len = file.metadata()?.len();
    if width == 0 || height == 0 || file_len < frame_len as u64 {
        bail!(
            "{} holds {} bytes, not enough for one {}x{} frame ({} bytes)",
            path.display(),
            file_len,
            width,
            height,
            frame_len
        );
    }

    log::info!(
        "Replaying {} ({} frames of {}x{} {:?})",
        path.display(),
        file_len / frame_len as u64,
        width,
        height,
        format
    );

    let crop = crop.unwrap_or_else(|| CropRect::full(width, height));
    let mut reader = BufReader::new(file);
    let mut buf = vec![0; frame_len];
    let mut sequence = 0;
    let epoch = Instant::now();

    let callback = move || {
        match read_frame(&mut reader, &mut buf, repeat) {
            Ok(true) => (),
            Ok(false) => {
                log::info!("End of recording after {} frames", sequence);
                return None;
            }
            Err(err) => {
                log::error!("Error reading frame: {}", err);
                return None;
            }
        }

        sequence += 1;
        let frame = format
            .wrap(width, height, &buf)
            .map_err(|err| log::error!("Error wrapping frame {}: {}", sequence, err))
            .ok()?;

        Some(
            frame
                .with_crop(crop)
                .with_timestamp(sequence, epoch.elapsed().as_nanos() as u64),
        )
    };
    Ok(Box::new(callback))
}

/// Fill `buf` with the next frame. Returns `false` at the end of the input.
fn read_frame<R: Read + Seek>(reader: &mut R, buf: &mut [u8], repeat: bool) -> std::io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof && repeat => {
            reader.seek(SeekFrom::Start(0))?;
            reader.read_exact(buf)?;
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err),
    }
}

/// Parse a crop rectangle given as `left,top,right,bottom`.
pub fn parse_crop(s: &str) -> Result<CropRect, String> {
    let edges = s
        .split(',')
        .map(|edge| edge.trim().parse::<u32>().map_err(|err| format!("{edge:?}: {err}")))
        .collect::<Result<Vec<_>, _>>()?;

    match edges[..] {
        [left, top, right, bottom] if left < right && top < bottom => {
            Ok(CropRect::new(left, top, right, bottom))
        }
        [_, _, _, _] => Err(format!("crop {s:?} is empty")),
        _ => Err(format!("expected left,top,right,bottom, got {s:?}")),
    }
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Write};

    use super::*;

    #[test]
    fn test_read_frame_stops_or_wraps() -> std::io::Result<()> {
        let data: Vec<u8> = (0..10).collect();
        let mut buf = [0; 4];

        let mut reader = Cursor::new(data.clone());
        assert!(read_frame(&mut reader, &mut buf, false)?);
        assert!(read_frame(&mut reader, &mut buf, false)?);
        assert_eq!(buf, [4, 5, 6, 7]);
        // Two trailing bytes do not make a frame
        assert!(!read_frame(&mut reader, &mut buf, false)?);

        let mut reader = Cursor::new(data);
        for _ in 0..3 {
            assert!(read_frame(&mut reader, &mut buf, true)?);
        }
        assert_eq!(buf, [0, 1, 2, 3]);

        Ok(())
    }

    #[test]
    fn test_parse_crop() {
        assert_eq!(parse_crop("0, 2, 64,48"), Ok(CropRect::new(0, 2, 64, 48)));
        assert!(parse_crop("0,0,0,10").is_err());
        assert!(parse_crop("1,2,3").is_err());
        assert!(parse_crop("a,b,c,d").is_err());
    }

    #[test]
    fn test_capture_fn_replays_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("frame_replay_{}.nv21", std::process::id()));
        let mut file = File::create(&path)?;
        // Two 2x2 NV21 frames
        file.write_all(&[1, 2, 3, 4, 200, 100, 5, 6, 7, 8, 210, 110])?;
        drop(file);

        let mut capture = get_capture_fn_file(&path, RawFormat::Nv21, (2, 2), None, false)?;
        let first = capture().expect("first frame");
        let second = capture().expect("second frame");
        assert!(capture().is_none());
        std::fs::remove_file(&path)?;

        assert_eq!(first.sequence, 1);
        assert_eq!(first.planes[0].data, vec![1, 2, 3, 4]);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.planes[2].data[0], 210);
        assert_eq!(second.crop, CropRect::full(2, 2));

        Ok(())
    }

    #[test]
    fn test_short_file_is_rejected() -> Result<()> {
        let path = std::env::temp_dir().join(format!("frame_replay_short_{}.yuv", std::process::id()));
        std::fs::write(&path, [0; 5])?;

        let res = get_capture_fn_file(&path, RawFormat::I420, (2, 2), None, false);
        std::fs::remove_file(&path)?;
        assert!(res.is_err());

        Ok(())
    }
}
