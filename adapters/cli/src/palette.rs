use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use gridboard_core::IconSource;

const ICON_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Lists the icons in `directory`, sorted by file name.
///
/// Subdirectories and files with other extensions are skipped.
pub(crate) fn discover(directory: &Path) -> Result<Vec<IconSource>> {
    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read palette directory {}", directory.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to list palette directory {}", directory.display()))?;
        let path = entry.path();
        if path.is_file() && is_icon(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths.into_iter().map(icon_source).collect())
}

fn is_icon(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            ICON_EXTENSIONS
                .iter()
                .any(|known| extension.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn icon_source(path: PathBuf) -> IconSource {
    IconSource::new(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scratch_directory(name: &str) -> PathBuf {
        let directory =
            std::env::temp_dir().join(format!("gridboard-palette-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&directory);
        fs::create_dir_all(&directory).expect("scratch directory");
        directory
    }

    #[test]
    fn icons_are_sorted_and_filtered() {
        let directory = scratch_directory("sorted");
        for name in ["valve.PNG", "pump.png", "notes.txt", "tank.jpeg", "boiler.jpg"] {
            fs::write(directory.join(name), b"").expect("write fixture");
        }
        fs::create_dir(directory.join("nested.png")).expect("nested directory");

        let identities: Vec<String> = discover(&directory)
            .expect("directory is readable")
            .iter()
            .map(|source| source.identity().to_owned())
            .collect();

        assert_eq!(identities, vec!["boiler", "pump", "tank", "valve"]);
        fs::remove_dir_all(directory).expect("cleanup");
    }

    #[test]
    fn references_point_at_the_files() {
        let directory = scratch_directory("references");
        fs::write(directory.join("pump.png"), b"").expect("write fixture");

        let sources = discover(&directory).expect("directory is readable");

        assert_eq!(sources.len(), 1);
        assert_eq!(
            PathBuf::from(sources[0].reference()),
            directory.join("pump.png")
        );
        fs::remove_dir_all(directory).expect("cleanup");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let error = discover(Path::new("/nonexistent/gridboard/icons"))
            .expect_err("missing directory must fail");

        assert!(error.to_string().contains("palette directory"));
    }
}
