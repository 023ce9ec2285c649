use std::any::type_name;
use std::fmt;

/// Stable identity of a value in [`DenseSlots`].
///
/// Keys survive the relocation of other values inside the arena. A key whose value has been
/// removed never matches again, even if its index is reused later.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct SlotKey {
    index: u32,
    generation: u32,
}

#[derive(Clone, Copy, Debug)]
enum Entry {
    Occupied { generation: u32, position: u32 },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// A generational arena that keeps its values densely packed.
///
/// Values live in one contiguous vector so iteration never visits holes. Removal swaps the
/// last value into the vacated position and updates that value's index entry, which keeps
/// the keys of all other values valid. The order of values is therefore not preserved.
pub(crate) struct DenseSlots<T> {
    values: Vec<T>,

    // Key of the value at the same position in `values`.
    keys: Vec<SlotKey>,

    // Indexed by SlotKey::index.
    entries: Vec<Entry>,

    free_head: Option<u32>,
}

impl<T> DenseSlots<T> {
    pub(crate) const fn new() -> Self {
        Self {
            values: Vec::new(),
            keys: Vec::new(),
            entries: Vec::new(),
            free_head: None,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            free_head: None,
        }
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.values.reserve(additional);
        self.keys.reserve(additional);

        // Vacant entries are reused before the index table grows.
        let vacant = self.entries.len().saturating_sub(self.values.len());
        self.entries.reserve(additional.saturating_sub(vacant));
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn insert(&mut self, value: T) -> SlotKey {
        let position =
            u32::try_from(self.values.len()).expect("slot count cannot exceed u32::MAX");

        let key = match self.free_head {
            Some(index) => {
                let entry = self
                    .entries
                    .get_mut(index as usize)
                    .expect("free list only points at existing entries");

                let Entry::Vacant {
                    generation,
                    next_free,
                } = *entry
                else {
                    panic!("free list points at an occupied entry");
                };

                self.free_head = next_free;
                *entry = Entry::Occupied {
                    generation,
                    position,
                };

                SlotKey { index, generation }
            }
            None => {
                let index =
                    u32::try_from(self.entries.len()).expect("slot count cannot exceed u32::MAX");

                self.entries.push(Entry::Occupied {
                    generation: 0,
                    position,
                });

                SlotKey {
                    index,
                    generation: 0,
                }
            }
        };

        self.values.push(value);
        self.keys.push(key);

        key
    }

    fn position_of(&self, key: SlotKey) -> Option<usize> {
        match *self.entries.get(key.index as usize)? {
            Entry::Occupied {
                generation,
                position,
            } if generation == key.generation => Some(position as usize),
            _ => None,
        }
    }

    pub(crate) fn contains(&self, key: SlotKey) -> bool {
        self.position_of(key).is_some()
    }

    pub(crate) fn get(&self, key: SlotKey) -> Option<&T> {
        self.values.get(self.position_of(key)?)
    }

    pub(crate) fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        let position = self.position_of(key)?;
        self.values.get_mut(position)
    }

    /// Removes the value, moving the last value into its position.
    pub(crate) fn remove(&mut self, key: SlotKey) -> Option<T> {
        let position = self.position_of(key)?;

        if let Some(entry) = self.entries.get_mut(key.index as usize) {
            *entry = Entry::Vacant {
                generation: key.generation.wrapping_add(1),
                next_free: self.free_head,
            };
        }
        self.free_head = Some(key.index);

        let value = self.values.swap_remove(position);
        self.keys.swap_remove(position);

        // If another value was moved into the vacated position, point its entry there.
        if let Some(moved) = self.keys.get(position) {
            if let Some(Entry::Occupied {
                position: moved_position,
                ..
            }) = self.entries.get_mut(moved.index as usize)
            {
                *moved_position =
                    u32::try_from(position).expect("positions always fit because keys do");
            }
        }

        Some(value)
    }

    /// Removes every value for which `predicate` returns `true` and hands them back.
    ///
    /// The removed values are returned instead of dropped, so the caller can decide when
    /// their destructors run.
    pub(crate) fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let doomed: Vec<SlotKey> = self
            .iter()
            .filter(|(_, value)| predicate(value))
            .map(|(key, _)| key)
            .collect();

        doomed.into_iter().filter_map(|key| self.remove(key)).collect()
    }

    /// Removes all values and hands them back. Every existing key is invalidated.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let keys = self.keys.clone();

        keys.into_iter().filter_map(|key| self.remove(key)).collect()
    }

    /// Keys of all values, in storage order.
    pub(crate) fn keys(&self) -> impl Iterator<Item = SlotKey> {
        self.keys.iter().copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (SlotKey, &T)> {
        self.keys.iter().copied().zip(self.values.iter())
    }
}

impl<T> Default for DenseSlots<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DenseSlots<T> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("len", &self.values.len())
            .field("entries", &self.entries.len())
            .field("free_head", &self.free_head)
            .finish_non_exhaustive()
    }
}
