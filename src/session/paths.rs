use std::path::PathBuf;

/// Derives chunk file paths from the output path a session was started with.
///
/// The extension is the suffix after the last `.` in the file name (default
/// `.m4a` when there is none; dots in directory components don't count);
/// chunk `index` is zero-padded to 4 digits and starts at 1, so
/// `start("a.m4a")` records into `a_0001.m4a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    base: String,
    ext: String,
}

impl ChunkPlan {
    pub fn new(output_path: &str) -> Self {
        let name_start = output_path.rfind('/').map_or(0, |i| i + 1);
        match output_path[name_start..].rfind('.') {
            Some(i) => Self {
                base: output_path[..name_start + i].to_string(),
                ext: output_path[name_start + i..].to_string(),
            },
            None => Self {
                base: output_path.to_string(),
                ext: ".m4a".to_string(),
            },
        }
    }

    pub fn chunk_path(&self, index: u32) -> PathBuf {
        PathBuf::from(format!("{}_{:04}{}", self.base, index, self.ext))
    }
}
