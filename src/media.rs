//! Storage for uploaded recipe images.

use std::{
	io::Cursor,
	path::{Path, PathBuf},
	sync::Arc,
};

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use uuid::Uuid;

use crate::error::{ErrorShape, Kind};

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
pub const MAX_DIMENSION: u32 = 1200;
pub const JPEG_QUALITY: u8 = 85;
/// URL prefix under which stored images are served.
pub const PUBLIC_PREFIX: &str = "/uploads/recipes";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unsupported image type {0:?}, expected one of png, jpg, jpeg, gif or webp")]
	UnsupportedExtension(String),
	#[error("image could not be decoded: {0}")]
	Decode(#[source] image::ImageError),
	#[error("image could not be encoded: {0}")]
	Encode(#[source] image::ImageError),
	#[error("image storage failed: {0}")]
	Io(#[from] std::io::Error),
	#[error("image worker failed: {0}")]
	Worker(#[from] tokio::task::JoinError),
}

impl ErrorShape for Error {
	fn kind(&self) -> Kind {
		match self {
			Self::UnsupportedExtension(..) | Self::Decode(..) => Kind::ValidationFailed,
			Self::Encode(..) | Self::Io(..) | Self::Worker(..) => Kind::Unexpected,
		}
	}

	fn summary(&self) -> std::borrow::Cow<'static, str> {
		match self.kind() {
			Kind::ValidationFailed => "invalid image".into(),
			kind => kind.summary().into(),
		}
	}
}

/// Returns the lowercased extension of `filename` if it is allowed.
pub fn allowed_extension(filename: &str) -> Option<String> {
	let (_, extension) = filename.rsplit_once('.')?;
	let extension = extension.to_ascii_lowercase();

	ALLOWED_EXTENSIONS
		.contains(&extension.as_str())
		.then_some(extension)
}

/// Decodes an image, flattens it to RGB, shrinks it to fit within
/// [`MAX_DIMENSION`] on both axes and re-encodes it as JPEG.
pub fn process(bytes: &[u8]) -> Result<Vec<u8>, Error> {
	let image = image::load_from_memory(bytes).map_err(Error::Decode)?;

	let image = if image.width() > MAX_DIMENSION || image.height() > MAX_DIMENSION {
		image.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
	} else {
		image
	};

	let image = DynamicImage::ImageRgb8(image.into_rgb8());
	let mut encoded = Cursor::new(Vec::new());

	image
		.write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY))
		.map_err(Error::Encode)?;

	Ok(encoded.into_inner())
}

/// Writes processed images to a directory and hands out references to them.
#[derive(Debug, Clone)]
pub struct ImageStore {
	root: Arc<PathBuf>,
}

impl ImageStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: Arc::new(root.into()),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Validates, processes and persists an upload, returning its reference.
	pub async fn store(&self, filename: &str, bytes: Vec<u8>) -> Result<String, Error> {
		if allowed_extension(filename).is_none() {
			return Err(Error::UnsupportedExtension(filename.to_owned()));
		}

		let encoded = tokio::task::spawn_blocking(move || process(&bytes)).await??;
		let name = format!("{}.jpg", Uuid::new_v4());

		tokio::fs::create_dir_all(self.root.as_path()).await?;
		tokio::fs::write(self.root.join(&name), encoded).await?;

		tracing::debug!(%name, "stored image");

		Ok(format!("{PUBLIC_PREFIX}/{name}"))
	}

	/// Removes the file behind a reference produced by [`ImageStore::store`].
	///
	/// Failures are logged and swallowed; a leftover file never fails a workflow.
	pub async fn release(&self, reference: &str) {
		let Some(path) = self.resolve(reference) else {
			tracing::warn!(%reference, "refusing to release unrecognized image reference");
			return;
		};

		match tokio::fs::remove_file(&path).await {
			Ok(()) => tracing::debug!(%reference, "released image"),
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
			Err(error) => tracing::warn!(%reference, %error, "failed to release image"),
		}
	}

	/// Maps a reference to a path inside the store, using only its file name.
	fn resolve(&self, reference: &str) -> Option<PathBuf> {
		let name = reference.rsplit('/').next()?;

		if name.is_empty() || name.contains("..") || name.contains('\\') {
			return None;
		}

		Some(self.root.join(name))
	}
}

#[cfg(test)]
mod test {
	use image::{ImageFormat, Rgba, RgbaImage};

	use super::*;

	fn png(width: u32, height: u32) -> Vec<u8> {
		let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 128]));
		let mut bytes = Cursor::new(Vec::new());

		DynamicImage::ImageRgba8(image)
			.write_to(&mut bytes, ImageFormat::Png)
			.unwrap();

		bytes.into_inner()
	}

	fn scratch() -> ImageStore {
		ImageStore::new(std::env::temp_dir().join(format!("recipe-media-{}", Uuid::new_v4())))
	}

	#[test]
	fn test_allowed_extension() {
		assert_eq!(allowed_extension("cake.JPG").as_deref(), Some("jpg"));
		assert_eq!(allowed_extension("a.b.webp").as_deref(), Some("webp"));
		assert_eq!(allowed_extension("script.svg"), None);
		assert_eq!(allowed_extension("noextension"), None);
	}

	#[test]
	fn test_process_shrinks_preserving_aspect_ratio() {
		let encoded = process(&png(2400, 600)).unwrap();
		let decoded = image::load_from_memory(&encoded).unwrap();

		assert_eq!(
			image::guess_format(&encoded).unwrap(),
			ImageFormat::Jpeg
		);
		assert_eq!((decoded.width(), decoded.height()), (1200, 300));
	}

	#[test]
	fn test_process_never_upscales() {
		let decoded = image::load_from_memory(&process(&png(40, 30)).unwrap()).unwrap();

		assert_eq!((decoded.width(), decoded.height()), (40, 30));
	}

	#[test]
	fn test_process_rejects_garbage() {
		assert!(matches!(process(b"not an image"), Err(Error::Decode(..))));
	}

	#[tokio::test]
	async fn test_store_and_release() {
		let store = scratch();
		let reference = store.store("photo.png", png(10, 10)).await.unwrap();

		assert!(reference.starts_with(PUBLIC_PREFIX));
		assert!(reference.ends_with(".jpg"));

		let path = store.resolve(&reference).unwrap();
		assert!(path.exists());

		store.release(&reference).await;
		assert!(!path.exists());

		// releasing twice is harmless
		store.release(&reference).await;

		let _ = std::fs::remove_dir_all(store.root());
	}

	#[tokio::test]
	async fn test_store_rejects_extension() {
		let store = scratch();
		let result = store.store("photo.tiff", png(10, 10)).await;

		assert!(matches!(result, Err(Error::UnsupportedExtension(..))));
	}

	#[test]
	fn test_resolve_stays_inside_root() {
		let store = ImageStore::new("/srv/images");

		assert_eq!(
			store.resolve("/uploads/recipes/../../etc/passwd"),
			Some(PathBuf::from("/srv/images/passwd"))
		);
		assert_eq!(store.resolve("/uploads/recipes/.."), None);
		assert_eq!(store.resolve("/uploads/recipes/"), None);
	}
}
