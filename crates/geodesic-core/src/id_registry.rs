use crate::bitset::HierarchicalBitset;

use static_assertions::const_assert_eq;
use std::{fmt::Debug, hash::Hash, marker::PhantomData, mem, num::NonZeroU32};

/// A strongly typed, dense, 32-bit identifier.
///
/// Implemented by [`def_id!`](crate::def_id). Indices start at zero, but the raw value is never zero, so
/// an `Option` of an ID costs nothing extra.
pub trait Id: Copy + Debug + Eq + Hash {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

pub type RawId = NonZeroU32;

const_assert_eq!(mem::size_of::<Option<RawId>>(), mem::size_of::<RawId>());

const MAX_VALID_INDEX: usize = (u32::MAX - 1) as usize;

#[inline]
pub fn index_to_raw_id(index: usize) -> RawId {
    assert!(index <= MAX_VALID_INDEX, "ID index {} out of range", index);
    // XOR flips all of the bits so that index 0 maps to u32::MAX, which is non-zero.
    unsafe { RawId::new_unchecked((index as u32) ^ u32::MAX) }
}

#[inline]
pub const fn raw_id_to_index(raw: RawId) -> usize {
    (raw.get() ^ u32::MAX) as usize
}

/// Defines a new ID type implementing [`Id`].
#[macro_export]
macro_rules! def_id {
    ($(#[$meta:meta])* $t:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub struct $t($crate::id_registry::RawId);

        impl $crate::id_registry::Id for $t {
            #[inline]
            fn from_index(index: usize) -> Self {
                Self($crate::id_registry::index_to_raw_id(index))
            }

            #[inline]
            fn index(self) -> usize {
                $crate::id_registry::raw_id_to_index(self.0)
            }
        }
    };
}

/// A counted reference to an ID.
///
/// Only [`IdRefCount::store`] creates one, and the only way to get rid of one is to hand it back to
/// [`IdRefCount::release`]. It can't be cloned, so the count always matches the number of live owners.
#[must_use = "an IdOwner must be released back to the IdRefCount that issued it"]
#[derive(Debug, Eq, PartialEq)]
pub struct IdOwner<I: Id> {
    id: I,
}

impl<I: Id> IdOwner<I> {
    #[inline]
    pub fn id(&self) -> I {
        self.id
    }
}

/// Reference counts for one kind of ID.
#[derive(Clone, Debug)]
pub struct IdRefCount<I> {
    counts: Vec<u16>,
    marker: PhantomData<fn() -> I>,
}

impl<I> Default for IdRefCount<I> {
    fn default() -> Self {
        Self {
            counts: Vec::new(),
            marker: PhantomData,
        }
    }
}

impl<I: Id> IdRefCount<I> {
    pub fn resize(&mut self, capacity: usize) {
        self.counts.resize(capacity, 0);
    }

    pub fn capacity(&self) -> usize {
        self.counts.len()
    }

    /// Zero for IDs that were never counted.
    #[inline]
    pub fn count(&self, id: I) -> u16 {
        self.counts.get(id.index()).copied().unwrap_or(0)
    }

    pub fn store(&mut self, id: I) -> IdOwner<I> {
        self.increment(id);
        IdOwner { id }
    }

    /// Gives back an owner, returning the count that remains.
    pub fn release(&mut self, owner: IdOwner<I>) -> u16 {
        self.decrement(owner.id)
    }

    pub(crate) fn increment(&mut self, id: I) {
        let index = id.index();
        if index >= self.counts.len() {
            self.counts.resize(index + 1, 0);
        }
        let count = &mut self.counts[index];
        assert!(*count < u16::MAX, "reference count overflow for {:?}", id);
        *count += 1;
    }

    pub(crate) fn decrement(&mut self, id: I) -> u16 {
        let count = &mut self.counts[id.index()];
        assert!(*count != 0, "released {:?} with a reference count of zero", id);
        *count -= 1;
        *count
    }
}

/// Allocates dense IDs, always handing out the lowest free one.
///
/// Free slots are the set bits of a [`HierarchicalBitset`]. A growable registry doubles its capacity
/// when full, a fixed one refuses to create more IDs.
#[derive(Clone, Debug)]
pub struct IdRegistry<I> {
    free: HierarchicalBitset,
    growable: bool,
    marker: PhantomData<fn() -> I>,
}

impl<I> Default for IdRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> IdRegistry<I> {
    pub const MIN_GROWTH: usize = 64;

    pub fn new() -> Self {
        Self {
            free: HierarchicalBitset::default(),
            growable: true,
            marker: PhantomData,
        }
    }

    pub fn with_fixed_capacity(capacity: usize) -> Self {
        Self {
            free: HierarchicalBitset::new(capacity, true),
            growable: false,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.free.size()
    }

    /// Number of live IDs.
    #[inline]
    pub fn size(&self) -> usize {
        self.free.size() - self.free.count()
    }

    pub fn is_growable(&self) -> bool {
        self.growable
    }

    /// Grows to at least `capacity` slots. Works on fixed registries too.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.capacity() {
            self.free.resize(capacity, true);
        }
    }
}

impl<I: Id> IdRegistry<I> {
    /// `None` only when a fixed-capacity registry is full.
    pub fn try_create(&mut self) -> Option<I> {
        if self.free.is_empty() {
            if !self.growable {
                return None;
            }
            let capacity = (self.capacity() * 2).max(Self::MIN_GROWTH);
            self.reserve(capacity);
        }
        let mut created = None;
        self.free.take(1, |index| created = Some(I::from_index(index)));
        created
    }

    /// Like [`try_create`](Self::try_create), for registries that can't run out.
    pub fn create(&mut self) -> I {
        match self.try_create() {
            Some(id) => id,
            None => panic!("fixed-capacity ID registry is full ({})", self.capacity()),
        }
    }

    pub fn remove(&mut self, id: I) {
        assert!(self.exists(id), "removing {:?} which does not exist", id);
        self.free.set(id.index());
    }

    #[inline]
    pub fn exists(&self, id: I) -> bool {
        let index = id.index();
        index < self.capacity() && !self.free.test(index)
    }

    /// Live IDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = I> + '_ {
        self.free.zeros().map(I::from_index)
    }
}

/// A set of IDs, stored as one bit per possible ID.
#[derive(Clone, Debug)]
pub struct IdSet<I> {
    bits: HierarchicalBitset,
    marker: PhantomData<fn() -> I>,
}

impl<I> Default for IdSet<I> {
    fn default() -> Self {
        Self {
            bits: HierarchicalBitset::default(),
            marker: PhantomData,
        }
    }
}

impl<I> IdSet<I> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bits: HierarchicalBitset::new(capacity, false),
            marker: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bits.size()
    }

    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.capacity() {
            self.bits.resize(capacity, false);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn clear(&mut self) {
        self.bits.reset_all();
    }
}

impl<I: Id> IdSet<I> {
    /// Returns `true` if `id` was not yet in the set.
    pub fn insert(&mut self, id: I) -> bool {
        let index = id.index();
        if index >= self.capacity() {
            self.reserve((index + 1).max(self.capacity() * 2).max(64));
        }
        self.bits.set(index)
    }

    /// Returns `true` if `id` was in the set.
    pub fn remove(&mut self, id: I) -> bool {
        let index = id.index();
        index < self.capacity() && self.bits.reset(index)
    }

    /// Inserts or removes `id` depending on `value`.
    pub fn assign(&mut self, id: I, value: bool) {
        if value {
            self.insert(id);
        } else {
            self.remove(id);
        }
    }

    #[inline]
    pub fn contains(&self, id: I) -> bool {
        let index = id.index();
        index < self.capacity() && self.bits.test(index)
    }

    pub fn first(&self) -> Option<I> {
        self.bits.first_one().map(I::from_index)
    }

    /// Removes and returns the lowest ID.
    pub fn pop_first(&mut self) -> Option<I> {
        let first = self.bits.first_one()?;
        self.bits.reset(first);
        Some(I::from_index(first))
    }

    pub fn iter(&self) -> impl Iterator<Item = I> + '_ {
        self.bits.ones().map(I::from_index)
    }
}

impl<I: Id> Extend<I> for IdSet<I> {
    fn extend<T: IntoIterator<Item = I>>(&mut self, iter: T) {
        for id in iter {
            self.insert(id);
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    crate::def_id!(TestId);

    #[test]
    fn option_of_id_is_free() {
        assert_eq!(mem::size_of::<Option<TestId>>(), mem::size_of::<TestId>());
        assert_eq!(TestId::from_index(0).index(), 0);
        assert_eq!(TestId::from_index(12345).index(), 12345);
    }

    #[test]
    fn growable_registry_reuses_lowest_free_id() {
        let mut reg = IdRegistry::<TestId>::new();
        let ids: Vec<_> = (0..100).map(|_| reg.create()).collect();
        assert_eq!(ids[99].index(), 99);
        assert_eq!(reg.size(), 100);
        assert_eq!(reg.capacity(), 128);

        reg.remove(ids[10]);
        reg.remove(ids[3]);
        assert!(!reg.exists(ids[3]));
        assert_eq!(reg.create(), ids[3]);
        assert_eq!(reg.create(), ids[10]);
        assert_eq!(reg.iter().count(), 100);
    }

    #[test]
    fn fixed_registry_runs_out() {
        let mut reg = IdRegistry::<TestId>::with_fixed_capacity(2);
        let a = reg.try_create().unwrap();
        let _b = reg.try_create().unwrap();
        assert_eq!(reg.try_create(), None);
        reg.remove(a);
        assert_eq!(reg.try_create(), Some(a));
    }

    #[test]
    fn owners_track_reference_count() {
        let mut refs = IdRefCount::<TestId>::default();
        let id = TestId::from_index(7);
        let o1 = refs.store(id);
        let o2 = refs.store(id);
        assert_eq!(refs.count(id), 2);
        assert_eq!(o1.id(), id);
        assert_eq!(refs.release(o1), 1);
        assert_eq!(refs.release(o2), 0);
        assert_eq!(refs.count(TestId::from_index(1000)), 0);
    }

    #[test]
    fn id_set_grows_on_insert() {
        let mut set = IdSet::<TestId>::default();
        assert!(!set.contains(TestId::from_index(500)));
        assert!(set.insert(TestId::from_index(500)));
        assert!(!set.insert(TestId::from_index(500)));
        set.insert(TestId::from_index(2));
        assert_eq!(
            set.iter().map(Id::index).collect::<Vec<_>>(),
            vec![2, 500]
        );
        assert_eq!(set.pop_first(), Some(TestId::from_index(2)));
        assert!(set.remove(TestId::from_index(500)));
        assert!(set.is_empty());
    }
}
