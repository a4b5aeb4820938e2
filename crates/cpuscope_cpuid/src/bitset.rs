/// Number of `u64` words needed to store `bits` bits.
pub const fn words_for_bits(bits: usize) -> usize {
    (bits + 63) / 64
}

/// Fixed-capacity bitset stored as `WORDS` 64-bit words, bit `i` lives in word `i / 64` at bit `i % 64`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BitSet<const WORDS: usize> {
    bits: [u64; WORDS],
}

impl<const WORDS: usize> BitSet<WORDS> {
    /// Number of bits in the bitset
    pub const BIT_COUNT : usize = WORDS * 64;

    pub const fn new() -> Self {
        Self { bits: [0; WORDS] }
    }

    const fn indices(idx: usize) -> (usize, usize) {
        (idx / 64, idx & 63)
    }

    /// Set the given bit.
    pub fn set(&mut self, idx: usize, set: bool) {
        if set {
            self.enable(idx);
        } else {
            self.disable(idx);
        }
    }

    /// Enable a bit
    pub fn enable(&mut self, idx: usize) {
        let (word_idx, bit_idx) = Self::indices(idx);
        self.bits[word_idx] |= 1u64 << bit_idx;
    }

    /// Disable a bit
    pub fn disable(&mut self, idx: usize) {
        let (word_idx, bit_idx) = Self::indices(idx);
        self.bits[word_idx] &= !(1u64 << bit_idx);
    }

    /// Get the given bit, bits outside of the bitset are reported as unset.
    pub fn get(&self, idx: usize) -> bool {
        let (word_idx, bit_idx) = Self::indices(idx);
        match self.bits.get(word_idx) {
            Some(word) => (word >> bit_idx) & 0x1 != 0,
            None => false,
        }
    }

    /// Check if any bit is set
    pub fn any(&self) -> bool {
        self.bits.iter().any(|word| *word != 0)
    }

    /// Check if no bit is set
    pub fn none(&self) -> bool {
        !self.any()
    }

    /// Count the number of set bits
    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Clear all bits
    pub fn clear(&mut self) {
        self.bits = [0; WORDS];
    }

    /// Check if every bit set in `other` is also set in `self`
    pub fn contains_all(&self, other: &Self) -> bool {
        self.bits.iter().zip(other.bits.iter()).all(|(a, b)| a & b == *b)
    }

    /// Set every bit that is set in `other`
    pub fn union_with(&mut self, other: &Self) {
        for (dst, src) in self.bits.iter_mut().zip(other.bits.iter()) {
            *dst |= *src;
        }
    }

    /// Iterate over the indices of all set bits, in ascending order
    pub fn iter_ones(&self) -> IterOnes<'_, WORDS> {
        IterOnes { bitset: self, word_idx: 0, word: self.bits.first().copied().unwrap_or(0) }
    }
}

impl<const WORDS: usize> Default for BitSet<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the set bits of a [`BitSet`]
pub struct IterOnes<'a, const WORDS: usize> {
    bitset: &'a BitSet<WORDS>,
    word_idx: usize,
    /// Remaining bits of the current word
    word: u64,
}

impl<const WORDS: usize> Iterator for IterOnes<'_, WORDS> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.word == 0 {
            self.word_idx += 1;
            self.word = *self.bitset.bits.get(self.word_idx)?;
        }
        let bit = self.word.trailing_zeros() as usize;
        // Clear the lowest set bit
        self.word &= self.word - 1;
        Some(self.word_idx * 64 + bit)
    }
}
