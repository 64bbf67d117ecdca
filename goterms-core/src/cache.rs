use std::sync::OnceLock;

/// Computes each value at most once and serves it by reference afterwards.
pub trait Memo<K> {
    type Value;

    fn lookup(&self, key: K) -> Option<&Self::Value>;

    fn get_or_compute<F>(&self, key: K, compute: F) -> &Self::Value
        where F: FnOnce() -> Self::Value;

    fn populated(&self) -> usize;
}

/// Write-once slots addressed by arena index. Readers only ever wait on
/// the one slot being initialized.
#[derive(Debug)]
pub struct SlotCache<V> {
    slots: Vec<OnceLock<V>>,
}

impl<V> SlotCache<V> {
    pub fn with_slots(len: usize) -> SlotCache<V> {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, OnceLock::new);
        SlotCache { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<V> Memo<usize> for SlotCache<V> {
    type Value = V;

    fn lookup(&self, key: usize) -> Option<&V> {
        self.slots.get(key).and_then(OnceLock::get)
    }

    fn get_or_compute<F>(&self, key: usize, compute: F) -> &V
        where F: FnOnce() -> V
    {
        self.slots[key].get_or_init(compute)
    }

    fn populated(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }
}
