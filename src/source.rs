//! Script source provider: finds candidate module files in a directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::ScriptsConfig;
use crate::registry::ScriptSource;
use crate::Result;

/// A module file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    /// Module name (the file name, extension included).
    pub name: String,
    pub path: PathBuf,
}

impl ScriptFile {
    pub fn source(&self) -> ScriptSource {
        ScriptSource::file(&self.path)
    }
}

/// Directory of module files, filtered by extension.
#[derive(Debug, Clone)]
pub struct ScriptDirectory {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl ScriptDirectory {
    pub fn new<P: AsRef<Path>>(dir: P, extensions: &[String]) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            extensions: extensions.iter().map(|ext| ext.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &ScriptsConfig) -> Self {
        Self::new(&config.dir, &config.extensions)
    }

    /// List module files directly inside the directory, sorted by name.
    ///
    /// A missing directory yields an empty list.
    pub fn scan(&self) -> Result<Vec<ScriptFile>> {
        if !self.dir.is_dir() {
            warn!("scripts directory does not exist: {}", self.dir.display());
            return Ok(Vec::new());
        }

        let mut files: Vec<ScriptFile> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.matches_extension(path))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                Some(ScriptFile { name, path })
            })
            .collect();

        // Sort for deterministic listing
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Path a module file name resolves to.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Source for a module file name, if the file exists.
    pub fn source_for(&self, name: &str) -> Option<ScriptSource> {
        let path = self.path_of(name);
        path.is_file().then(|| ScriptSource::File(path))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        vec!["lua".to_string(), "ljbc".to_string()]
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.lua"), "").unwrap();
        fs::write(dir.path().join("a.LUA"), "").unwrap();
        fs::write(dir.path().join("c.ljbc"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub.lua")).unwrap();

        let scripts = ScriptDirectory::new(dir.path(), &extensions());
        let names: Vec<String> = scripts.scan().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["a.LUA", "b.lua", "c.ljbc"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let scripts = ScriptDirectory::new("/nonexistent/modhost/lua", &extensions());
        assert!(scripts.scan().unwrap().is_empty());
    }

    #[test]
    fn test_source_for() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("init.lua"), "x = 1").unwrap();

        let scripts = ScriptDirectory::new(dir.path(), &extensions());
        assert_eq!(
            scripts.source_for("init.lua"),
            Some(ScriptSource::File(dir.path().join("init.lua")))
        );
        assert!(scripts.source_for("missing.lua").is_none());
    }

    #[test]
    fn test_from_config() {
        let config = ScriptsConfig::default();
        let scripts = ScriptDirectory::from_config(&config);
        assert_eq!(scripts.dir(), Path::new("lua"));
        assert_eq!(scripts.path_of("x.lua"), Path::new("lua").join("x.lua"));
    }
}
