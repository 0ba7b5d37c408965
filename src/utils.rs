//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Utilities.
//!

use std::path::Path;

const INPUT_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

fn is_input_file(path: &Path) -> bool {
    path.is_file() && match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => INPUT_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false
    }
}

/// Returns the sorted paths of all TIFF files in `dir` (not recursive).
pub fn list_input_files(dir: &str) -> std::io::Result<Vec<String>> {
    let mut files = vec![];
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_input_file(&path) {
            files.push(path.to_string_lossy().to_string());
        }
    }
    files.sort();

    Ok(files)
}

/// Returns the file name component of `path`.
pub fn file_name_of(path: &str) -> String {
    match Path::new(path).file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ringfit-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn given_mixed_files_list_only_tiffs_sorted() {
        let dir = scratch_dir("list");
        for name in &["b.tif", "a.TIFF", "c.png", "notes.txt", "d.tiff"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.join("sub.tif")).unwrap();

        let files = list_input_files(dir.to_str().unwrap()).unwrap();
        let names: Vec<String> = files.iter().map(|f| file_name_of(f)).collect();
        assert_eq!(vec!["a.TIFF", "b.tif", "d.tiff"], names);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn when_directory_missing_fail() {
        assert!(list_input_files("/nonexistent-dir/for/images").is_err());
    }
}
