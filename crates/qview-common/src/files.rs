// files.rs - search path over game directories and .pak archives

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::bspfile::{fixed_name, read_i32_le};
use crate::error::{QError, QResult};
use crate::qfiles::{IDPAKHEADER, MAX_FILES_IN_PACK, PAK_ENTRY_SIZE, PAK_HEADER_SIZE, PAK_NAME_SIZE};

// ============================================================
// In-memory structures
// ============================================================

/// A file entry within a pack file.
#[derive(Debug, Clone)]
pub struct PackFile {
    pub name: String,
    pub filepos: i32,
    pub filelen: i32,
}

/// A loaded .pak archive directory.
#[derive(Debug)]
pub struct Pack {
    pub filename: PathBuf,
    pub files: Vec<PackFile>,
    /// lowercase filename -> index in files
    file_index: HashMap<String, usize>,
}

impl Pack {
    pub fn new(filename: PathBuf, files: Vec<PackFile>) -> Self {
        let file_index = files
            .iter()
            .enumerate()
            .map(|(i, pf)| (pf.name.to_lowercase(), i))
            .collect();
        Self {
            filename,
            files,
            file_index,
        }
    }

    /// Finds a file by name (case-insensitive).
    #[inline]
    pub fn find_file(&self, filename: &str) -> Option<&PackFile> {
        self.file_index
            .get(&filename.to_lowercase())
            .map(|&idx| &self.files[idx])
    }

    /// Reads a .pak directory. Entries are decoded field by field.
    pub fn load(packfile: &Path) -> QResult<Pack> {
        let display = packfile.display().to_string();
        let mut f = File::open(packfile).map_err(|e| QError::io(&display, e))?;
        let file_len = f.metadata().map_err(|e| QError::io(&display, e))?.len();

        let mut header = [0u8; PAK_HEADER_SIZE];
        f.read_exact(&mut header).map_err(|e| QError::io(&display, e))?;

        if read_i32_le(&header, 0) != IDPAKHEADER {
            return Err(QError::Format(format!("{} is not a packfile", display)));
        }

        let dirofs = read_i32_le(&header, 4);
        let dirlen = read_i32_le(&header, 8);
        if dirofs < 0 || dirlen < 0 || dirofs as u64 + dirlen as u64 > file_len {
            return Err(QError::Format(format!("{} has a bad directory", display)));
        }
        if dirlen as usize % PAK_ENTRY_SIZE != 0 {
            return Err(QError::Format(format!("{} has a funny directory size", display)));
        }

        let numpackfiles = dirlen as usize / PAK_ENTRY_SIZE;
        if numpackfiles > MAX_FILES_IN_PACK {
            return Err(QError::Format(format!("{} has {} files", display, numpackfiles)));
        }

        f.seek(SeekFrom::Start(dirofs as u64)).map_err(|e| QError::io(&display, e))?;
        let mut dir = vec![0u8; dirlen as usize];
        f.read_exact(&mut dir).map_err(|e| QError::io(&display, e))?;

        let mut files = Vec::with_capacity(numpackfiles);
        for entry in dir.chunks_exact(PAK_ENTRY_SIZE) {
            let pf = PackFile {
                name: fixed_name(&entry[..PAK_NAME_SIZE]),
                filepos: read_i32_le(entry, PAK_NAME_SIZE),
                filelen: read_i32_le(entry, PAK_NAME_SIZE + 4),
            };
            if pf.filepos < 0 || pf.filelen < 0 || pf.filepos as u64 + pf.filelen as u64 > file_len {
                return Err(QError::Format(format!("{}: entry {} lies outside the archive", display, pf.name)));
            }
            files.push(pf);
        }

        info!("Added packfile {} ({} files)", display, numpackfiles);
        Ok(Pack::new(packfile.to_path_buf(), files))
    }

    fn read(&self, pf: &PackFile) -> QResult<Vec<u8>> {
        let display = self.filename.display().to_string();
        let mut f = File::open(&self.filename).map_err(|e| QError::io(&display, e))?;
        f.seek(SeekFrom::Start(pf.filepos as u64)).map_err(|e| QError::io(&display, e))?;
        let mut buf = vec![0u8; pf.filelen as usize];
        f.read_exact(&mut buf).map_err(|e| QError::io(&pf.name, e))?;
        Ok(buf)
    }
}

/// A single element on the search path, either a directory or a pack file.
#[derive(Debug)]
pub enum SearchPath {
    Directory(PathBuf),
    Pack(Pack),
}

/// pakN.pak files in `dir`, sorted by N.
fn pak_files(dir: &Path) -> QResult<Vec<PathBuf>> {
    let display = dir.display().to_string();
    let mut found: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| QError::io(&display, e))? {
        let entry = entry.map_err(|e| QError::io(&display, e))?;
        let name = entry.file_name().to_string_lossy().to_lowercase();
        let number = name
            .strip_prefix("pak")
            .and_then(|rest| rest.strip_suffix(".pak"))
            .and_then(|digits| digits.parse::<u32>().ok());
        if let Some(n) = number {
            found.push((n, entry.path()));
        }
    }
    found.sort_by_key(|(n, _)| *n);
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

// ============================================================
// Filesystem context
// ============================================================

/// Search path list. Index 0 has the highest priority.
#[derive(Debug, Default)]
pub struct FsContext {
    pub search_paths: Vec<SearchPath>,
}

impl FsContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a game directory and then every pakN.pak inside it in numeric
    /// order. Later paks override earlier ones, and all paks override loose
    /// files in the directory.
    pub fn add_directory(&mut self, dir: &str) -> QResult<()> {
        let root = PathBuf::from(dir);
        if !root.is_dir() {
            return Err(QError::io(
                dir,
                io::Error::new(io::ErrorKind::NotFound, "not a directory"),
            ));
        }
        self.search_paths.insert(0, SearchPath::Directory(root.clone()));

        for pakfile in pak_files(&root)? {
            let pack = Pack::load(&pakfile)?;
            self.search_paths.insert(0, SearchPath::Pack(pack));
        }
        Ok(())
    }

    /// Loads a file into memory from the first search path that has it.
    pub fn load_file(&self, path: &str) -> QResult<Vec<u8>> {
        for search in &self.search_paths {
            match search {
                SearchPath::Pack(pack) => {
                    if let Some(pf) = pack.find_file(path) {
                        debug!("load_file: {} (from {})", path, pack.filename.display());
                        return pack.read(pf);
                    }
                }
                SearchPath::Directory(dir) => {
                    let full = dir.join(path);
                    if full.is_file() {
                        debug!("load_file: {}", full.display());
                        return std::fs::read(&full).map_err(|e| QError::io(path, e));
                    }
                }
            }
        }
        Err(QError::io(path, io::Error::new(io::ErrorKind::NotFound, "not found in search path")))
    }

    /// One line per search path entry, highest priority first.
    pub fn path_list(&self) -> Vec<String> {
        self.search_paths
            .iter()
            .map(|s| match s {
                SearchPath::Directory(dir) => dir.display().to_string(),
                SearchPath::Pack(pack) => format!("{} ({} files)", pack.filename.display(), pack.files.len()),
            })
            .collect()
    }
}
