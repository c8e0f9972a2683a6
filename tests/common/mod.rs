#![allow(dead_code)]

use habitat::SystemProbe;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A machine described entirely in memory.
#[derive(Debug, Clone)]
pub struct FakeSystem {
    os: String,
    env: HashMap<String, String>,
    dirs: HashSet<PathBuf>,
    files: HashMap<PathBuf, String>,
    kernel: Option<String>,
}

impl FakeSystem {
    pub fn new(os: &str) -> Self {
        Self {
            os: os.to_string(),
            env: HashMap::new(),
            dirs: HashSet::new(),
            files: HashMap::new(),
            kernel: None,
        }
    }

    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), value.to_string());
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.dirs.insert(PathBuf::from(path));
        self
    }

    pub fn file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(PathBuf::from(path), contents.to_string());
        self
    }

    pub fn kernel(mut self, release: &str) -> Self {
        self.kernel = Some(release.to_string());
        self
    }
}

impl SystemProbe for FakeSystem {
    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.dirs.contains(path) || self.files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    fn read_to_string(&self, path: &Path) -> Option<String> {
        self.files.get(path).cloned()
    }

    fn kernel_release(&self) -> Option<String> {
        self.kernel.clone()
    }

    fn target_os(&self) -> String {
        self.os.clone()
    }
}

pub fn write_file(path: &Path, contents: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, contents).expect("Failed to write fixture");
    path.to_path_buf()
}

pub fn write_zip_bundle(path: &Path) -> PathBuf {
    let file = fs::File::create(path).expect("Failed to create zip fixture");
    let mut writer = zip::ZipWriter::new(file);
    writer
        .start_file("__main__.py", zip::write::SimpleFileOptions::default())
        .expect("Failed to start zip entry");
    writer
        .write_all(b"print('hello')\n")
        .expect("Failed to write zip entry");
    writer.finish().expect("Failed to finish zip");
    path.to_path_buf()
}
