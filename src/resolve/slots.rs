/// Correlates a fetch reply with the request that caused it.
///
/// `slot` is reused once freed; `generation` tells a late reply for a freed
/// slot apart from the request currently occupying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    pub slot: u32,
    pub generation: u32,
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Vacant { generation: u32 },
    Occupied { generation: u32, value: T },
}

/// A sparse table of outstanding requests.
///
/// Removing an entry leaves a hole; the lowest hole is reused by the next
/// insertion. Nothing is ever compacted, so ids of live entries stay valid.
#[derive(Debug, Clone)]
pub struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    len: usize,
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        SlotTable { slots: Vec::new(), len: 0 }
    }
}

impl<T> SlotTable<T> {
    pub fn new() -> Self {
        SlotTable::default()
    }

    /// Stores the value built by `make`, handing it its own id.
    pub fn insert_with(&mut self, make: impl FnOnce(RequestId) -> T) -> RequestId {
        let hole = self.slots.iter().enumerate().find_map(|(i, s)| match s {
            Slot::Vacant { generation } => Some((i, generation.wrapping_add(1))),
            Slot::Occupied { .. } => None,
        });
        let (slot, generation) = hole.unwrap_or_else(|| {
            self.slots.push(Slot::Vacant { generation: 0 });
            (self.slots.len() - 1, 0)
        });
        let id = RequestId { slot: slot as u32, generation };
        self.slots[slot] = Slot::Occupied { generation, value: make(id) };
        self.len += 1;
        id
    }

    pub fn insert(&mut self, value: T) -> RequestId {
        self.insert_with(|_| value)
    }

    pub fn get(&self, id: RequestId) -> Option<&T> {
        match self.slots.get(id.slot as usize)? {
            Slot::Occupied { generation, value } if *generation == id.generation => Some(value),
            _ => None,
        }
    }

    /// Frees the slot. Unknown or stale ids yield `None`.
    pub fn remove(&mut self, id: RequestId) -> Option<T> {
        let slot = self.slots.get_mut(id.slot as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == id.generation => {
                let vacant = Slot::Vacant { generation: *generation };
                let Slot::Occupied { value, .. } = std::mem::replace(slot, vacant) else { return None };
                self.len -= 1;
                Some(value)
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated, holes included.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RequestId, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| match s {
            Slot::Occupied { generation, value } => {
                Some((RequestId { slot: i as u32, generation: *generation }, value))
            }
            Slot::Vacant { .. } => None,
        })
    }
}
