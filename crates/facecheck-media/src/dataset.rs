//! On-disk dataset layout: a folder of reference images and a folder of
//! videos, where each video is a sub-directory of numbered frame images.
//!
//! Reference images are decoded eagerly (there are few of them). Video frames
//! are decoded lazily, one at a time, so long videos are never held in memory.

use crate::frame::Frame;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions accepted as reference images or video frames.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot read directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Decode a single image file into a frame.
pub fn load_frame(path: &Path, size: Option<u32>) -> Result<Frame, SourceError> {
    image::open(path)
        .map(|img| Frame::from_image(img, size))
        .map_err(|source| SourceError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// A decoded reference image and the file name it came from.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub label: String,
    pub frame: Frame,
}

/// Load every reference image in `dir`, sorted by file name.
///
/// Files that fail to decode are skipped with a warning; they never abort
/// the load.
pub fn load_reference_images(dir: &Path, size: Option<u32>) -> Result<Vec<ReferenceImage>, SourceError> {
    let mut images = Vec::new();
    for path in image_files(dir)? {
        match load_frame(&path, size) {
            Ok(frame) => images.push(ReferenceImage {
                label: file_label(&path),
                frame,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable reference image");
            }
        }
    }
    tracing::debug!(dir = %dir.display(), count = images.len(), "reference images loaded");
    Ok(images)
}

/// One video: an ordered list of frame files.
#[derive(Debug, Clone)]
pub struct Video {
    pub id: String,
    frame_paths: Vec<PathBuf>,
    size: Option<u32>,
}

impl Video {
    /// Open a frame directory. Frames are ordered by file name.
    pub fn open(dir: &Path, size: Option<u32>) -> Result<Self, SourceError> {
        Ok(Self {
            id: file_label(dir),
            frame_paths: image_files(dir)?,
            size,
        })
    }

    pub fn len(&self) -> usize {
        self.frame_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_paths.is_empty()
    }

    /// Lazily decode frames in order.
    pub fn frames(&self) -> VideoFrames<'_> {
        VideoFrames {
            paths: self.frame_paths.iter(),
            size: self.size,
        }
    }
}

/// Iterator over the decoded frames of a [`Video`].
pub struct VideoFrames<'a> {
    paths: std::slice::Iter<'a, PathBuf>,
    size: Option<u32>,
}

impl Iterator for VideoFrames<'_> {
    type Item = Result<Frame, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(load_frame(path, self.size))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

/// Discover videos: every sub-directory of `dir`, sorted by name.
pub fn discover_videos(dir: &Path, size: Option<u32>) -> Result<Vec<Video>, SourceError> {
    let mut dirs: Vec<PathBuf> = read_dir(dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut videos = Vec::with_capacity(dirs.len());
    for d in dirs {
        let video = Video::open(&d, size)?;
        if video.is_empty() {
            tracing::warn!(video = %video.id, "video directory has no frames");
        }
        tracing::debug!(video = %video.id, frames = video.len(), "video discovered");
        videos.push(video);
    }
    Ok(videos)
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let io_err = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    Ok(paths)
}

fn image_files(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut files: Vec<PathBuf> = read_dir(dir)?
        .into_iter()
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    files.sort();
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "facecheck-media-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, shade: u8) {
        RgbImage::from_pixel(4, 4, Rgb([shade, shade, shade]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension(Path::new("a/b.JPG")));
        assert!(has_image_extension(Path::new("a/b.png")));
        assert!(!has_image_extension(Path::new("a/b.mp4")));
        assert!(!has_image_extension(Path::new("a/noext")));
    }

    #[test]
    fn test_load_reference_images_sorted_and_resized() {
        let dir = scratch_dir("refs");
        write_png(&dir.join("b.png"), 20);
        write_png(&dir.join("a.png"), 10);
        fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let images = load_reference_images(&dir, Some(8)).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].label, "a.png");
        assert_eq!(images[1].label, "b.png");
        assert_eq!((images[0].frame.width, images[0].frame.height), (8, 8));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_reference_images_skips_corrupt() {
        let dir = scratch_dir("corrupt");
        write_png(&dir.join("good.png"), 10);
        fs::write(dir.join("bad.jpg"), b"not a jpeg").unwrap();

        let images = load_reference_images(&dir, None).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].label, "good.png");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_reference_images_missing_dir() {
        let dir = std::env::temp_dir().join("facecheck-media-test-does-not-exist");
        assert!(matches!(
            load_reference_images(&dir, None),
            Err(SourceError::Io { .. })
        ));
    }

    #[test]
    fn test_discover_videos_and_lazy_frames() {
        let dir = scratch_dir("videos");
        let clip = dir.join("clip1");
        fs::create_dir_all(&clip).unwrap();
        write_png(&clip.join("0002.png"), 200);
        write_png(&clip.join("0001.png"), 100);
        fs::create_dir_all(dir.join("clip0")).unwrap();
        fs::write(dir.join("stray.png"), b"top-level files are not videos").unwrap();

        let videos = discover_videos(&dir, None).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].id, "clip0");
        assert!(videos[0].is_empty());
        assert_eq!(videos[1].id, "clip1");
        assert_eq!(videos[1].len(), 2);

        let frames: Vec<Frame> = videos[1].frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames[0].data[0], 100);
        assert_eq!(frames[1].data[0], 200);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_video_frame_decode_error_surfaces() {
        let dir = scratch_dir("badframe");
        fs::write(dir.join("0001.png"), b"garbage").unwrap();

        let video = Video::open(&dir, None).unwrap();
        let first = video.frames().next().unwrap();
        assert!(matches!(first, Err(SourceError::Decode { .. })));

        let _ = fs::remove_dir_all(&dir);
    }
}
