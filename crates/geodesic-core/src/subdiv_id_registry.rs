use crate::id_registry::{Id, IdOwner, IdRefCount, IdRegistry};
use crate::SmallKeyHashMap;

/// An ID returned by [`SubdivIdRegistry::create_or_get`], and whether that call created it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MaybeNewId<I> {
    pub id: I,
    pub is_new: bool,
}

/// Marks an ID without parents.
const ROOT_KEY: u64 = u64::MAX;

/// Allocates IDs that are either roots or the child of an unordered pair of existing IDs.
///
/// Asking twice for the child of `(a, b)` (or `(b, a)`) gives the same ID. Each child holds a
/// reference on both of its parents, and removing a child drops those references, recursively
/// removing any parent that ends up unreferenced.
#[derive(Clone, Debug)]
pub struct SubdivIdRegistry<I> {
    ids: IdRegistry<I>,
    parents_to_id: SmallKeyHashMap<u64, I>,
    id_to_parents: Vec<u64>,
    refcounts: IdRefCount<I>,
}

impl<I> Default for SubdivIdRegistry<I> {
    fn default() -> Self {
        Self {
            ids: IdRegistry::new(),
            parents_to_id: SmallKeyHashMap::default(),
            id_to_parents: Vec::new(),
            refcounts: IdRefCount::default(),
        }
    }
}

impl<I: Id> SubdivIdRegistry<I> {
    pub fn create_root(&mut self) -> I {
        let id = self.ids.create();
        self.track(id, ROOT_KEY);
        id
    }

    pub fn create_or_get(&mut self, a: I, b: I) -> MaybeNewId<I> {
        debug_assert!(self.exists(a) && self.exists(b));
        debug_assert_ne!(a, b, "an ID can't be subdivided with itself");

        let key = pair_key(a, b);
        if let Some(&id) = self.parents_to_id.get(&key) {
            return MaybeNewId { id, is_new: false };
        }

        let id = self.ids.create();
        self.track(id, key);
        self.parents_to_id.insert(key, id);
        self.refcounts.increment(a);
        self.refcounts.increment(b);
        MaybeNewId { id, is_new: true }
    }

    pub fn get(&self, a: I, b: I) -> Option<I> {
        self.parents_to_id.get(&pair_key(a, b)).copied()
    }

    /// The two parents of `id`, in ascending index order. `None` for roots.
    pub fn parents(&self, id: I) -> Option<[I; 2]> {
        let key = self.id_to_parents[id.index()];
        (key != ROOT_KEY).then(|| unpack_key(key))
    }

    /// Removes an unreferenced ID, then any of its ancestors that become unreferenced.
    pub fn remove(&mut self, id: I) {
        assert_eq!(
            self.refcounts.count(id),
            0,
            "removing {:?} while it is still referenced",
            id
        );
        self.ids.remove(id);

        let key = std::mem::replace(&mut self.id_to_parents[id.index()], ROOT_KEY);
        if key == ROOT_KEY {
            return;
        }
        self.parents_to_id.remove(&key);
        for parent in unpack_key::<I>(key) {
            if self.refcounts.decrement(parent) == 0 {
                self.remove(parent);
            }
        }
    }

    pub fn store(&mut self, id: I) -> IdOwner<I> {
        debug_assert!(self.exists(id));
        self.refcounts.store(id)
    }

    /// Gives back an owner. The ID is removed when this was its last reference.
    pub fn release(&mut self, owner: IdOwner<I>) {
        let id = owner.id();
        if self.refcounts.release(owner) == 0 {
            self.remove(id);
        }
    }

    #[inline]
    pub fn refcount(&self, id: I) -> u16 {
        self.refcounts.count(id)
    }

    #[inline]
    pub fn exists(&self, id: I) -> bool {
        self.ids.exists(id)
    }

    pub fn size(&self) -> usize {
        self.ids.size()
    }

    pub fn capacity(&self) -> usize {
        self.ids.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = I> + '_ {
        self.ids.iter()
    }

    fn track(&mut self, id: I, key: u64) {
        let capacity = self.ids.capacity();
        if self.id_to_parents.len() < capacity {
            self.id_to_parents.resize(capacity, ROOT_KEY);
            self.refcounts.resize(capacity);
        }
        self.id_to_parents[id.index()] = key;
    }
}

fn pair_key<I: Id>(a: I, b: I) -> u64 {
    let (a, b) = (a.index() as u64, b.index() as u64);
    (a.min(b) << 32) | a.max(b)
}

fn unpack_key<I: Id>(key: u64) -> [I; 2] {
    [
        I::from_index((key >> 32) as usize),
        I::from_index((key & u64::from(u32::MAX)) as usize),
    ]
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
