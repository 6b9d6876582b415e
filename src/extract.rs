//! Walking documents and writing images to disk

use std::fs;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::decoder::{decode, DecodedImage};
use crate::error::{ExtractError, Result};
use crate::pdf::{ImageSource, LopdfSource};

/// Folder name used when none is configured
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "extracted_images";

/// Options for image extraction
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Folder created next to each PDF to hold its images
    pub output_dir_name: String,
    /// Decode everything but write nothing
    pub dry_run: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            output_dir_name: DEFAULT_OUTPUT_DIR_NAME.to_string(),
            dry_run: false,
        }
    }
}

/// Counters for one or more documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub documents: usize,
    pub failed_documents: usize,
    pub pages: usize,
    pub images: usize,
    pub written: usize,
    /// Images a dry run decoded and would have written
    pub planned: usize,
    pub skipped: usize,
    pub unrecognized: usize,
}

impl AddAssign for ExtractSummary {
    fn add_assign(&mut self, other: Self) {
        self.documents += other.documents;
        self.failed_documents += other.failed_documents;
        self.pages += other.pages;
        self.images += other.images;
        self.written += other.written;
        self.planned += other.planned;
        self.skipped += other.skipped;
        self.unrecognized += other.unrecognized;
    }
}

/// `{stem}_IMG_page{NN}_{NNNN}.{ext}`, page and index both 1-based
pub fn image_file_name(stem: &str, page: u32, index: usize, extension: &str) -> String {
    format!("{}_IMG_page{:02}_{:04}.{}", stem, page, index, extension)
}

/// Write through a temporary `.part` file so a failed write never leaves a
/// truncated image behind
fn write_image(path: &Path, image: &DecodedImage) -> Result<()> {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let written = fs::write(&part, &image.data).and_then(|_| fs::rename(&part, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&part);
        return Err(e.into());
    }
    Ok(())
}

/// Extract every image of a document into `out_dir`.
///
/// Failures are scoped to the image: each one is logged and counted, and
/// the walk continues with the next image.
pub fn extract_document<S: ImageSource>(
    source: &S,
    stem: &str,
    out_dir: &Path,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    let mut summary = ExtractSummary {
        documents: 1,
        ..Default::default()
    };

    if !options.dry_run {
        fs::create_dir_all(out_dir)?;
    }

    for page in source.page_numbers() {
        info!("  page {}", page);
        summary.pages += 1;

        for (i, page_image) in source.page_images(page).into_iter().enumerate() {
            summary.images += 1;
            let index = i + 1;

            let decoded = match page_image.image.and_then(|image| decode(&image)) {
                Ok(decoded) => decoded,
                Err(e) if e.is_unrecognized() => {
                    warn!(
                        "    Unable to save image {:?}: unrecognized format ({})",
                        page_image.id, e
                    );
                    summary.unrecognized += 1;
                    continue;
                }
                Err(e) => {
                    warn!("    Skipping image {:?}: {}", page_image.id, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let name = image_file_name(stem, page, index, decoded.extension());
            if options.dry_run {
                debug!("    {} ({} bytes, dry run)", name, decoded.data.len());
                summary.planned += 1;
                continue;
            }

            match write_image(&out_dir.join(&name), &decoded) {
                Ok(()) => {
                    debug!("    {} ({} bytes)", name, decoded.data.len());
                    summary.written += 1;
                }
                Err(e) => {
                    warn!("    Failed to write {}: {}", name, e);
                    summary.skipped += 1;
                }
            }
        }
    }

    Ok(summary)
}

/// Extract the images of one PDF into `<parent>/<output_dir_name>/`
pub fn extract_pdf_file(path: &Path, options: &ExtractOptions) -> Result<ExtractSummary> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let out_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&options.output_dir_name);

    info!("{}", stem);
    let source = LopdfSource::load(path)?;
    extract_document(&source, &stem, &out_dir, options)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// A single `.pdf` path, or every `.pdf` below a directory (sorted)
pub fn collect_pdf_paths(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(ExtractError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", root.display()),
        )));
    }

    if root.is_file() {
        return Ok(if is_pdf(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_pdf(entry.path()) => {
                paths.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry: {}", e),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Extract images from a PDF or from every PDF under a directory. A
/// document that cannot be opened is logged and counted, not fatal.
pub fn extract_path(root: &Path, options: &ExtractOptions) -> Result<ExtractSummary> {
    let paths = collect_pdf_paths(root)?;
    info!("Found {} PDF file(s) under {}", paths.len(), root.display());

    let mut total = ExtractSummary::default();
    for path in paths {
        match extract_pdf_file(&path, options) {
            Ok(summary) => total += summary,
            Err(e) => {
                error!("Failed to extract images from {}: {}", path.display(), e);
                total.failed_documents += 1;
            }
        }
    }
    Ok(total)
}
