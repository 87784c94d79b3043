use crate::error::RequestError;
use std::fmt;

/// A validated `(group, path)` pair declared by an extension.
///
/// `path` addresses either a top-level resource of the group (`"Gate"`) or a
/// nested one (`"Crawler/Shell"`). Only the first `/` separates the root name
/// from the child path; everything after it is handed to the host verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRequest {
    group: String,
    path: String,
    /// Byte index of the first `/`, if any
    split: Option<usize>,
}

impl ResourceRequest {
    pub fn new(group: impl Into<String>, path: impl Into<String>) -> Result<Self, RequestError> {
        let group = group.into();
        let path = path.into();

        if group.is_empty() {
            return Err(RequestError::MissingGroup);
        }
        let split = split_point(&path)?;

        Ok(Self { group, path, split })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name of the top-level resource.
    pub fn root(&self) -> &str {
        match self.split {
            Some(at) => &self.path[..at],
            None => &self.path,
        }
    }

    /// Path below the root, if the request is nested.
    pub fn child(&self) -> Option<&str> {
        self.split.map(|at| &self.path[at + 1..])
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.path)
    }
}

fn split_point(path: &str) -> Result<Option<usize>, RequestError> {
    let invalid = |reason| RequestError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    match path.find('/') {
        None => Ok(None),
        Some(0) => Err(invalid("path starts with '/'")),
        Some(at) if at == path.len() - 1 => Err(invalid("path ends with '/'")),
        Some(at) => Ok(Some(at)),
    }
}
