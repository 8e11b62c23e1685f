use localstyle_host::FileRef;
use localstyle_schema::FileId;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalStyleKind {
    /// Compiled from content injected into a component document.
    Inline,
    /// Compiled from a stylesheet file referenced by one or more components.
    External,
    /// A library's defaults stylesheet.
    Defaults,
}

/// One compiled local stylesheet handed back to the caller.
///
/// External holders additionally record every component document that
/// references the stylesheet; each distinct stylesheet is compiled once per
/// pass no matter how many users it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStyleHolder {
    pub file: FileRef,
    pub data: Vec<u8>,
    kind: LocalStyleKind,
    users: Vec<FileId>,
}

impl LocalStyleHolder {
    pub fn inline(file: FileRef, data: Vec<u8>) -> Self {
        Self {
            file,
            data,
            kind: LocalStyleKind::Inline,
            users: Vec::new(),
        }
    }

    pub fn defaults(file: FileRef, data: Vec<u8>) -> Self {
        Self {
            file,
            data,
            kind: LocalStyleKind::Defaults,
            users: Vec::new(),
        }
    }

    pub fn external(file: FileRef, data: Vec<u8>, first_user: FileId) -> Self {
        Self {
            file,
            data,
            kind: LocalStyleKind::External,
            users: vec![first_user],
        }
    }

    pub fn kind(&self) -> LocalStyleKind {
        self.kind
    }

    pub fn is_external(&self) -> bool {
        self.kind == LocalStyleKind::External
    }

    /// Documents referencing an external stylesheet, in first-seen order.
    /// Always empty for other kinds.
    pub fn users(&self) -> &[FileId] {
        &self.users
    }

    /// Record another referencing document. Returns `false` for holders
    /// that are not external and for users already recorded.
    pub fn add_user(&mut self, user: FileId) -> bool {
        if !self.is_external() || self.users.contains(&user) {
            return false;
        }
        self.users.push(user);
        true
    }

    /// Blake3 digest of the compiled output.
    pub fn digest(&self) -> String {
        blake3::hash(&self.data).to_hex().to_string()
    }
}

// The compiled bytes are opaque; serialized output carries their size and
// digest instead.
impl Serialize for LocalStyleHolder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("LocalStyleHolder", 5)?;
        s.serialize_field("file", &self.file.id)?;
        s.serialize_field("kind", &self.kind)?;
        s.serialize_field("size", &self.data.len())?;
        s.serialize_field("digest", &self.digest())?;
        s.serialize_field("users", &self.users)?;
        s.end()
    }
}
