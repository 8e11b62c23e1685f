use crate::holder::LocalStyleHolder;
use localstyle_schema::FileId;
use std::collections::HashMap;
use tracing::trace;

/// Index of a holder inside an [`IdentityCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HolderId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The stylesheet was compiled by this call.
    Created(HolderId),
    /// A holder for the same identity already existed.
    Existing(HolderId),
}

/// Arena of compiled holders for one collection pass, with external
/// stylesheets indexed by canonical file identity.
///
/// At most one external holder exists per identity. Holders are kept in
/// emission order, which is the order the pass returns them in.
#[derive(Debug, Default)]
pub struct IdentityCache {
    holders: Vec<LocalStyleHolder>,
    external: HashMap<FileId, HolderId>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the holder for `identity`, invoking `create` only on a miss.
    pub fn lookup_or_create<E>(
        &mut self,
        identity: &FileId,
        create: impl FnOnce() -> Result<LocalStyleHolder, E>,
    ) -> Result<Lookup, E> {
        if let Some(&id) = self.external.get(identity) {
            trace!("identity cache hit for {identity}");
            return Ok(Lookup::Existing(id));
        }
        trace!("identity cache miss for {identity}");
        let holder = create()?;
        let id = self.push(holder);
        self.external.insert(identity.clone(), id);
        Ok(Lookup::Created(id))
    }

    /// Store a holder that is never shared, such as inline content.
    pub fn push_inline(&mut self, holder: LocalStyleHolder) -> HolderId {
        self.push(holder)
    }

    pub fn add_user(&mut self, id: HolderId, user: FileId) -> bool {
        self.holders[id.0].add_user(user)
    }

    pub fn holder(&self, id: HolderId) -> &LocalStyleHolder {
        &self.holders[id.0]
    }

    pub fn get(&self, identity: &FileId) -> Option<&LocalStyleHolder> {
        self.external.get(identity).map(|id| self.holder(*id))
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    pub fn into_holders(self) -> Vec<LocalStyleHolder> {
        self.holders
    }

    fn push(&mut self, holder: LocalStyleHolder) -> HolderId {
        let id = HolderId(self.holders.len());
        self.holders.push(holder);
        id
    }
}
