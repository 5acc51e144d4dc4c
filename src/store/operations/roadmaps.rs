use crate::rewards::types::Roadmap;
use crate::store::keys;
use crate::store::{Mutation, Store, StoreError};

impl Store {
    pub fn get_roadmap(&self, user_id: &str, roadmap_id: &str) -> Result<Option<Roadmap>, StoreError> {
        let key = keys::roadmap_key(user_id, roadmap_id)?;
        match self.roadmaps.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Returns the stored roadmap and whether this call created it.
    pub fn insert_roadmap_if_absent(&self, roadmap: &Roadmap) -> Result<(Roadmap, bool), StoreError> {
        let key = keys::roadmap_key(&roadmap.user_id, &roadmap.id)?;
        Self::insert_if_absent(&self.roadmaps, &key, roadmap)
    }

    pub fn update_roadmap<R, F>(
        &self,
        user_id: &str,
        roadmap_id: &str,
        mutate: F,
    ) -> Result<(Roadmap, R), StoreError>
    where
        F: FnMut(&mut Roadmap) -> Mutation<R>,
    {
        let key = keys::roadmap_key(user_id, roadmap_id)?;
        Self::cas_update(&self.roadmaps, "roadmap", &key, || None, mutate)
    }
}
