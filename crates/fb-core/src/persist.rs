use std::fs;
use std::path::{Path, PathBuf};
use base64::prelude::*;
use chrono::{DateTime, Local};
use image::imageops::FilterType;
use log::info;
use crate::error::Result;

pub const MAX_FOLDER_NAME_LENGTH: usize = 50;
pub const RESIZE_TARGET: (u32, u32) = (1024, 1024);
pub const PROMPT_FILE: &str = "prompt.txt";

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Folder-safe form of a prompt: drops `<>:"/\|?*`, turns spaces into
/// underscores and keeps at most 50 characters. Names made only of dots
/// would point at the output folder or its parent, so they become `no_name`.
pub fn sanitize(prompt: &str) -> String {
    let name: String = prompt
        .chars()
        .filter(|c| !FORBIDDEN.contains(c))
        .map(|c| if c == ' ' { '_' } else { c })
        .take(MAX_FOLDER_NAME_LENGTH)
        .collect();

    if name.chars().all(|c| c == '.') {
        "no_name".to_string()
    } else {
        name
    }
}

/// Files produced for one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    /// The file that remains on disk once saving is done.
    pub path: PathBuf,
    pub resized: bool,
}

#[derive(Debug, Clone)]
pub struct ResultPersister {
    output_dir: PathBuf,
    resize_target: (u32, u32),
}

impl ResultPersister {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            resize_target: RESIZE_TARGET,
        }
    }

    pub fn folder_for(&self, prompt: &str) -> PathBuf {
        self.output_dir.join(sanitize(prompt))
    }

    /// Create the prompt's folder and store the raw prompt next to the images.
    pub fn prepare(&self, prompt: &str) -> Result<PathBuf> {
        let folder = self.folder_for(prompt);
        fs::create_dir_all(&folder)?;
        fs::write(folder.join(PROMPT_FILE), prompt)?;
        info!("Output folder ready: {}", folder.display());
        Ok(folder)
    }

    pub fn image_path(folder: &Path, at: &DateTime<Local>, width: u32, height: u32, index: u32) -> PathBuf {
        folder.join(format!("{}_{}x{}_{}.png", at.format("%Y%m%d_%H%M%S"), width, height, index))
    }

    /// Decode and write one result. Without `save_original_size` the image is
    /// resized to the target and the original removed afterwards. The two steps
    /// are not atomic: a crash in between leaves both files behind.
    pub fn save(
        &self,
        folder: &Path,
        payload: &str,
        (width, height): (u32, u32),
        index: u32,
        at: &DateTime<Local>,
        save_original_size: bool,
    ) -> Result<SavedImage> {
        let bytes = BASE64_STANDARD.decode(payload.trim())?;
        let original = Self::image_path(folder, at, width, height, index);
        fs::write(&original, &bytes)?;
        info!("Saved {}", original.display());

        if save_original_size || (width, height) == self.resize_target {
            return Ok(SavedImage { path: original, resized: false });
        }

        let (target_w, target_h) = self.resize_target;
        let resized = image::load_from_memory(&bytes)?.resize_exact(target_w, target_h, FilterType::Lanczos3);
        let resized_path = Self::image_path(folder, at, target_w, target_h, index);
        resized.save(&resized_path)?;
        info!("Saved resized copy {}", resized_path.display());

        fs::remove_file(&original)?;

        Ok(SavedImage { path: resized_path, resized: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn png_payload(width: u32, height: u32) -> String {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        BASE64_STANDARD.encode(buf.into_inner())
    }

    #[test]
    fn test_sanitize_strips_forbidden_characters() {
        let name = sanitize(r#"a<b>c:d"e/f\g|h?i*j"#);
        assert_eq!(name, "abcdefghij");
        assert!(!name.contains(FORBIDDEN));
    }

    #[test]
    fn test_sanitize_replaces_spaces() {
        assert_eq!(sanitize("a red fox"), "a_red_fox");
    }

    #[test]
    fn test_sanitize_truncates_to_fifty() {
        let long = "word ".repeat(40);
        assert_eq!(sanitize(&long).chars().count(), MAX_FOLDER_NAME_LENGTH);

        let exact = "x".repeat(50);
        assert_eq!(sanitize(&exact), exact);
    }

    #[test]
    fn test_sanitize_truncates_after_stripping() {
        let prompt = format!("{}{}", "?".repeat(30), "y".repeat(60));
        assert_eq!(sanitize(&prompt), "y".repeat(50));
    }

    #[test]
    fn test_sanitize_counts_characters_not_bytes() {
        let prompt = "кот ".repeat(20);
        let name = sanitize(&prompt);
        assert_eq!(name.chars().count(), 50);
        assert!(name.starts_with("кот_кот"));
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize(""), "no_name");
        assert_eq!(sanitize("???***"), "no_name");
    }

    #[test]
    fn test_sanitize_dot_names_fall_back() {
        assert_eq!(sanitize("."), "no_name");
        assert_eq!(sanitize(".."), "no_name");
        assert_eq!(sanitize("/../"), "no_name");
        assert_eq!(sanitize("..hidden"), "..hidden");
    }

    #[test]
    fn test_prepare_stays_inside_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Generated_Images");
        let persister = ResultPersister::new(&out);

        let folder = persister.prepare("..").unwrap();
        assert_eq!(folder, out.join("no_name"));
        assert!(folder.join(PROMPT_FILE).exists());
        assert!(!dir.path().join(PROMPT_FILE).exists());
    }

    #[test]
    fn test_image_path_format() {
        let path = ResultPersister::image_path(Path::new("out"), &fixed_time(), 512, 768, 3);
        assert_eq!(path, PathBuf::from("out/20240309_140507_512x768_3.png"));
    }

    #[test]
    fn test_prepare_writes_prompt_file() {
        let dir = tempfile::tempdir().unwrap();
        let persister = ResultPersister::new(dir.path());

        let folder = persister.prepare("a cat: on a mat?").unwrap();
        assert_eq!(folder, dir.path().join("a_cat_on_a_mat"));
        assert_eq!(fs::read_to_string(folder.join(PROMPT_FILE)).unwrap(), "a cat: on a mat?");
    }

    #[test]
    fn test_save_original_writes_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let persister = ResultPersister::new(dir.path());
        let payload = BASE64_STANDARD.encode(b"not really a png");

        let saved = persister
            .save(dir.path(), &payload, (512, 512), 1, &fixed_time(), true)
            .unwrap();

        assert!(!saved.resized);
        assert_eq!(fs::read(&saved.path).unwrap(), b"not really a png");
    }

    #[test]
    fn test_save_resizes_and_removes_original() {
        let dir = tempfile::tempdir().unwrap();
        let persister = ResultPersister::new(dir.path());

        let saved = persister
            .save(dir.path(), &png_payload(64, 64), (64, 64), 2, &fixed_time(), false)
            .unwrap();

        assert!(saved.resized);
        assert_eq!(saved.path, dir.path().join("20240309_140507_1024x1024_2.png"));
        assert!(!dir.path().join("20240309_140507_64x64_2.png").exists());

        let img = image::open(&saved.path).unwrap();
        assert_eq!((img.width(), img.height()), RESIZE_TARGET);
    }

    #[test]
    fn test_save_at_target_size_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let persister = ResultPersister::new(dir.path());
        let payload = BASE64_STANDARD.encode(b"already the right size");

        let saved = persister
            .save(dir.path(), &payload, RESIZE_TARGET, 1, &fixed_time(), false)
            .unwrap();

        assert!(!saved.resized);
        assert!(saved.path.exists());
    }

    #[test]
    fn test_bad_base64_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let persister = ResultPersister::new(dir.path());

        let err = persister
            .save(dir.path(), "%%% not base64 %%%", (512, 512), 1, &fixed_time(), true)
            .unwrap_err();
        assert!(matches!(err, crate::Error::Decode(_)));
    }
}
