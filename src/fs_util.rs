use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::GeodataError;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

pub fn is_zip(path: &Path) -> Result<bool, GeodataError> {
    let mut file = fs::File::open(path)
        .map_err(|err| GeodataError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == ZIP_MAGIC),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(GeodataError::Filesystem(err.to_string())),
    }
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), GeodataError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        GeodataError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| GeodataError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| GeodataError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(GeodataError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

/// First file under `root` (sorted, depth-first) whose extension matches one
/// of `extensions`, ignoring case and macOS resource forks.
pub fn find_member(root: &Path, extensions: &[&str]) -> Result<Option<PathBuf>, GeodataError> {
    let mut files = walk_files(root)?;
    files.sort();
    Ok(files.into_iter().find(|path| {
        let is_resource_fork = path
            .components()
            .any(|part| part.as_os_str() == "__MACOSX");
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
            .unwrap_or(false);
        matches && !is_resource_fork
    }))
}

fn walk_files(root: &Path) -> Result<Vec<PathBuf>, GeodataError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries =
            fs::read_dir(&path).map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| GeodataError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                items.push(path);
            }
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    #[test]
    fn extract_and_find_member() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("bundle.zip");
        {
            let file = fs::File::create(&zip_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file("nested/readme.txt", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"notes").unwrap();
            writer
                .start_file("nested/table.CSV", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"a,b\n1,2\n").unwrap();
            writer.finish().unwrap();
        }

        assert!(is_zip(&zip_path).unwrap());
        let out = dir.path().join("out");
        extract_zip(&zip_path, &out).unwrap();

        let member = find_member(&out, &["csv"]).unwrap().unwrap();
        assert!(member.ends_with("nested/table.CSV"));
        assert!(find_member(&out, &["shp"]).unwrap().is_none());
    }

    #[test]
    fn plain_file_is_not_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.csv");
        fs::write(&path, b"a").unwrap();
        assert!(!is_zip(&path).unwrap());
    }
}
