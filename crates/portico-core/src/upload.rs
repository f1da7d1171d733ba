//! Uploaded files and the nested structures that hold them.

use std::path::PathBuf;

use indexmap::IndexMap;

/// Upload outcome, with the conventional numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadStatus {
    /// The file uploaded successfully.
    #[default]
    Ok,
    /// The file exceeds the server-side size limit.
    IniSize,
    /// The file exceeds the form's size limit.
    FormSize,
    /// Only part of the file arrived.
    Partial,
    /// No file was sent.
    NoFile,
    /// No temporary directory is available.
    NoTmpDir,
    /// The file could not be written to disk.
    CantWrite,
    /// An extension stopped the upload.
    Extension,
}

impl UploadStatus {
    /// The numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::IniSize => 1,
            Self::FormSize => 2,
            Self::Partial => 3,
            Self::NoFile => 4,
            Self::NoTmpDir => 6,
            Self::CantWrite => 7,
            Self::Extension => 8,
        }
    }

    /// Look up a status by code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::IniSize),
            2 => Some(Self::FormSize),
            3 => Some(Self::Partial),
            4 => Some(Self::NoFile),
            6 => Some(Self::NoTmpDir),
            7 => Some(Self::CantWrite),
            8 => Some(Self::Extension),
            _ => None,
        }
    }
}

/// A file received with a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadedFile {
    /// Filename sent by the client.
    pub client_filename: Option<String>,
    /// Media type sent by the client.
    pub client_media_type: Option<String>,
    /// Size in bytes.
    pub size: Option<u64>,
    /// Where the upload is stored while the request runs.
    pub temp_path: Option<PathBuf>,
    /// Upload outcome.
    pub status: UploadStatus,
}

impl UploadedFile {
    /// Create an uploaded file stored at `temp_path`.
    pub fn new(temp_path: impl Into<PathBuf>) -> Self {
        Self {
            temp_path: Some(temp_path.into()),
            ..Default::default()
        }
    }

    /// Set the client filename.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.client_filename = Some(name.into());
        self
    }

    /// Set the client media type.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.client_media_type = Some(media_type.into());
        self
    }

    /// Set the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the upload status.
    pub fn with_status(mut self, status: UploadStatus) -> Self {
        self.status = status;
        self
    }
}

/// A tree of uploads as produced by bracketed form keys.
///
/// `files[0][avatar]` and `files[1][avatar]` produce
/// `Nested{"0": Nested{"avatar": File}, "1": Nested{"avatar": File}}` under
/// the top-level key `files`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTree<T> {
    /// A single file.
    File(T),
    /// Named children, in insertion order.
    Nested(IndexMap<String, UploadTree<T>>),
}

impl<T> Default for UploadTree<T> {
    fn default() -> Self {
        Self::Nested(IndexMap::new())
    }
}

impl<T> UploadTree<T> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file under a bracketed form key such as `files[0][avatar]`.
    ///
    /// An existing leaf on the path is replaced by a nested node.
    pub fn insert_path(&mut self, key: &str, file: T) {
        let segments = split_form_key(key);
        self.insert_segments(&segments, file);
    }

    fn insert_segments(&mut self, segments: &[String], file: T) {
        let Some((first, rest)) = segments.split_first() else {
            *self = Self::File(file);
            return;
        };

        if let Self::File(_) = self {
            *self = Self::default();
        }
        if let Self::Nested(children) = self {
            let key = if first.is_empty() {
                children.len().to_string()
            } else {
                first.clone()
            };
            children
                .entry(key)
                .or_default()
                .insert_segments(rest, file);
        }
    }

    /// Walk a path of keys.
    pub fn get(&self, path: &[&str]) -> Option<&UploadTree<T>> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => match self {
                Self::Nested(children) => children.get(*first)?.get(rest),
                Self::File(_) => None,
            },
        }
    }

    /// The file at this node, if it is a leaf.
    pub fn as_file(&self) -> Option<&T> {
        match self {
            Self::File(file) => Some(file),
            Self::Nested(_) => None,
        }
    }

    /// Whether the tree holds no files.
    pub fn is_empty(&self) -> bool {
        self.files().next().is_none()
    }

    /// Transform every leaf, keeping the shape.
    pub fn map<U>(&self, f: &impl Fn(&T) -> U) -> UploadTree<U> {
        match self {
            Self::File(file) => UploadTree::File(f(file)),
            Self::Nested(children) => UploadTree::Nested(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.map(f)))
                    .collect(),
            ),
        }
    }

    /// Every leaf, depth first, in insertion order.
    pub fn files(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            Self::File(file) => Box::new(std::iter::once(file)),
            Self::Nested(children) => Box::new(children.values().flat_map(|c| c.files())),
        }
    }
}

/// Split `files[0][avatar]` into `["files", "0", "avatar"]`.
///
/// Empty brackets (`files[]`) produce an empty segment, which means "append".
pub fn split_form_key(key: &str) -> Vec<String> {
    let (head, mut rest) = match key.find('[') {
        Some(idx) if idx > 0 => (&key[..idx], &key[idx..]),
        _ => return vec![key.to_string()],
    };

    let mut segments = vec![head.to_string()];
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(end) => {
                segments.push(stripped[..end].to_string());
                rest = &stripped[end + 1..];
            }
            None => break,
        }
    }
    segments
}
