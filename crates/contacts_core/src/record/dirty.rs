//! Fixed-size bitset of changed properties, keyed by compact index.

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirtySet {
    words: Vec<u64>,
    len: usize,
}

impl DirtySet {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    pub fn insert(&mut self, index: usize) {
        debug_assert!(index < self.len, "dirty index {index} out of range");
        if index < self.len {
            self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.len && self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|word| *word = 0);
    }

    /// Iterates set indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|index| self.contains(*index))
    }
}

#[cfg(test)]
mod tests {
    use super::DirtySet;

    #[test]
    fn bits_span_multiple_words() {
        let mut set = DirtySet::new(130);
        assert!(set.is_empty());

        set.insert(0);
        set.insert(64);
        set.insert(129);

        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 64, 129]);
        assert!(!set.contains(1));
        assert!(!set.contains(500));

        set.clear();
        assert!(set.is_empty());
    }
}
