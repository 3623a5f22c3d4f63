//! Enroll known faces from a directory of reference photos
//!
//! This tool scans a directory of photos (one person per file, named after
//! them), encodes the face in each photo, and saves the enrollment file the
//! pipeline matches uploads against.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use rollcall_face_encoder::{EncoderConfig, FaceEncoder, OnnxFaceEncoder};
use rollcall_storage::EncodingStore;

/// Scan a directory for reference photos
///
/// Expected structure: `photos_dir/<person name>.jpg`
fn scan_photo_directory<P: AsRef<Path>>(photos_dir: P) -> Result<Vec<(String, PathBuf)>> {
    let mut photos = Vec::new();

    for entry in fs::read_dir(photos_dir.as_ref())
        .with_context(|| format!("Failed to read photo directory: {:?}", photos_dir.as_ref()))?
    {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // Only process image files (png, jpg, jpeg, webp)
        if let Some(ext) = path.extension() {
            let ext = ext.to_str().unwrap_or("");
            if !matches!(ext.to_lowercase().as_str(), "png" | "jpg" | "jpeg" | "webp") {
                continue;
            }
        } else {
            continue;
        }

        // Person name is the filename without extension
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        photos.push((name, path));
    }

    // Deterministic enrollment order
    photos.sort();

    Ok(photos)
}

/// Encode every reference photo and write the enrollment file
fn enroll_faces<P: AsRef<Path>>(photos_dir: P, output_path: P) -> Result<()> {
    println!("Building face enrollment file...");
    println!("Photo directory: {:?}", photos_dir.as_ref());

    let photos = scan_photo_directory(&photos_dir)?;
    println!("Found {} reference photos", photos.len());

    if photos.is_empty() {
        bail!(
            "No reference photos found in directory: {:?}",
            photos_dir.as_ref()
        );
    }

    let detector_model = std::env::var("ROLLCALL_DETECTOR_MODEL")
        .unwrap_or_else(|_| "models/ultraface-rfb-320.onnx".to_string());
    let embedder_model = std::env::var("ROLLCALL_EMBEDDER_MODEL")
        .unwrap_or_else(|_| "models/mobilefacenet.onnx".to_string());

    println!("Loading face models...");
    let encoder = OnnxFaceEncoder::new(&detector_model, &embedder_model, EncoderConfig::default());

    let mut store = EncodingStore::default();
    for (name, path) in photos {
        let encodings = encoder
            .encode(&path)
            .with_context(|| format!("Failed to encode {path:?}"))?;

        match encodings.len() {
            0 => eprintln!("Warning: no face found in {path:?}, skipping"),
            1 => {
                store.push(name.as_str(), encodings.into_iter().next().unwrap());
                println!("  Enrolled {name}");
            }
            n => eprintln!("Warning: {n} faces found in {path:?}, skipping (one face per photo)"),
        }
    }

    if store.is_empty() {
        bail!("No faces were enrolled");
    }

    store
        .save(output_path.as_ref())
        .context("Failed to save enrollment file")?;

    println!("✅ Enrollment file created successfully!");
    println!("  People enrolled: {}", store.len());
    println!("  Output: {:?}", output_path.as_ref());

    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <photos_dir> <output_file>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} photos/ encodings.bin", args[0]);
        std::process::exit(1);
    }

    let photos_dir = &args[1];
    let output_path = &args[2];

    if !Path::new(photos_dir).exists() {
        bail!("Photo directory does not exist: {}", photos_dir);
    }

    enroll_faces(photos_dir, output_path)?;

    Ok(())
}
