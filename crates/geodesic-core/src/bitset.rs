//! A bitset with a small tower of summary rows on top of it.
//!
//! Row 0 holds the actual bits. Every row above holds one bit per block of the row below, and that
//! bit is set iff the block below is non-zero. The top row always fits in a single block, so
//! finding the lowest set bit is a walk of at most [`MAX_ROWS`] `trailing_zeros` calls.

type Block = u64;

const BLOCK_BITS: usize = Block::BITS as usize;

/// 64^8 bits is far more than any ID space we allocate from.
pub const MAX_ROWS: usize = 8;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Row {
    offset: usize,
    size: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HierarchicalBitset {
    blocks: Vec<Block>,
    rows: [Row; MAX_ROWS],
    row_count: usize,
    size: usize,
    count: usize,
}

impl Default for HierarchicalBitset {
    fn default() -> Self {
        Self::new(0, false)
    }
}

impl HierarchicalBitset {
    /// A bitset of `size` bits, all set to `fill`.
    pub fn new(size: usize, fill: bool) -> Self {
        let (rows, row_count, block_count) = calc_rows(size);
        let mut bitset = Self {
            blocks: vec![0; block_count],
            rows,
            row_count,
            size,
            count: 0,
        };
        if fill {
            bitset.set_all();
        }
        bitset
    }

    /// Number of bits, set or not.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of set bits.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn test(&self, bit: usize) -> bool {
        self.bounds_check(bit);
        self.blocks[bit / BLOCK_BITS] & block_mask(bit) != 0
    }

    /// Returns `true` if the bit was previously clear.
    pub fn set(&mut self, bit: usize) -> bool {
        self.bounds_check(bit);
        let changed = self.set_in_row(0, bit);
        if changed {
            self.count += 1;
        }
        changed
    }

    /// Returns `true` if the bit was previously set.
    pub fn reset(&mut self, bit: usize) -> bool {
        self.bounds_check(bit);
        let changed = self.reset_in_row(0, bit);
        if changed {
            self.count -= 1;
        }
        changed
    }

    pub fn set_all(&mut self) {
        let row0 = self.rows[0];
        for block in &mut self.blocks[row0.offset..row0.offset + row0.size] {
            *block = Block::MAX;
        }
        self.mask_tail();
        self.rebuild_summary();
    }

    pub fn reset_all(&mut self) {
        for block in &mut self.blocks {
            *block = 0;
        }
        self.count = 0;
    }

    /// The lowest set bit, found by descending the summary rows.
    pub fn first_one(&self) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        let mut index = 0;
        for row in (0..self.row_count).rev() {
            let block = self.blocks[self.rows[row].offset + index];
            debug_assert_ne!(block, 0, "summary row {} out of sync", row);
            index = index * BLOCK_BITS + block.trailing_zeros() as usize;
        }
        Some(index)
    }

    /// Clears up to `count` set bits in ascending order, passing each position to `out`.
    ///
    /// Returns how many of the requested bits could not be taken.
    pub fn take(&mut self, count: usize, mut out: impl FnMut(usize)) -> usize {
        let mut remaining = count;
        while remaining != 0 {
            match self.first_one() {
                Some(bit) => {
                    self.reset(bit);
                    out(bit);
                    remaining -= 1;
                }
                None => break,
            }
        }
        remaining
    }

    /// Changes the number of bits, keeping the content of bits below `min(old, new)` size. New bits
    /// are set to `fill`.
    pub fn resize(&mut self, size: usize, fill: bool) {
        let old_size = self.size;
        let old_row0 = self.rows[0];
        let (rows, row_count, block_count) = calc_rows(size);

        let mut blocks = vec![0; block_count];
        let keep = old_row0.size.min(rows[0].size);
        blocks[..keep].copy_from_slice(&self.blocks[old_row0.offset..old_row0.offset + keep]);

        self.blocks = blocks;
        self.rows = rows;
        self.row_count = row_count;
        self.size = size;

        if fill && size > old_size {
            for bit in old_size..size {
                self.blocks[bit / BLOCK_BITS] |= block_mask(bit);
            }
        }
        self.mask_tail();
        self.rebuild_summary();
    }

    /// Ascending positions of all set bits.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.row0()
            .iter()
            .enumerate()
            .flat_map(|(i, &block)| BlockBits(block).map(move |b| i * BLOCK_BITS + b))
    }

    /// Ascending positions of all clear bits.
    pub fn zeros(&self) -> impl Iterator<Item = usize> + '_ {
        let size = self.size;
        self.row0()
            .iter()
            .enumerate()
            .flat_map(|(i, &block)| BlockBits(!block).map(move |b| i * BLOCK_BITS + b))
            .take_while(move |&b| b < size)
    }

    fn row0(&self) -> &[Block] {
        let row = self.rows[0];
        &self.blocks[row.offset..row.offset + row.size]
    }

    #[inline]
    fn bounds_check(&self, bit: usize) {
        assert!(
            bit < self.size,
            "bit index {} out of range for bitset of size {}",
            bit,
            self.size
        );
    }

    fn set_in_row(&mut self, row: usize, bit: usize) -> bool {
        let block = &mut self.blocks[self.rows[row].offset + bit / BLOCK_BITS];
        let mask = block_mask(bit);
        if *block & mask != 0 {
            return false;
        }
        let was_empty = *block == 0;
        *block |= mask;
        if was_empty && row + 1 < self.row_count {
            self.set_in_row(row + 1, bit / BLOCK_BITS);
        }
        true
    }

    fn reset_in_row(&mut self, row: usize, bit: usize) -> bool {
        let block = &mut self.blocks[self.rows[row].offset + bit / BLOCK_BITS];
        let mask = block_mask(bit);
        if *block & mask == 0 {
            return false;
        }
        *block &= !mask;
        if *block == 0 && row + 1 < self.row_count {
            self.reset_in_row(row + 1, bit / BLOCK_BITS);
        }
        true
    }

    /// Clears every bit of row 0 at or past `size`.
    fn mask_tail(&mut self) {
        let row0 = self.rows[0];
        let full = self.size / BLOCK_BITS;
        let rem = self.size % BLOCK_BITS;
        if rem != 0 {
            self.blocks[row0.offset + full] &= (1 << rem) - 1;
        }
        let first_unused = full + usize::from(rem != 0);
        for block in first_unused..row0.size {
            self.blocks[row0.offset + block] = 0;
        }
    }

    /// Recomputes every summary row and the count from row 0.
    fn rebuild_summary(&mut self) {
        for row in 1..self.row_count {
            let below = self.rows[row - 1];
            let this = self.rows[row];
            for j in 0..this.size {
                let mut summary = 0;
                let first = j * BLOCK_BITS;
                let last = (first + BLOCK_BITS).min(below.size);
                for k in first..last {
                    if self.blocks[below.offset + k] != 0 {
                        summary |= block_mask(k);
                    }
                }
                self.blocks[this.offset + j] = summary;
            }
        }
        self.count = self.row0().iter().map(|b| b.count_ones() as usize).sum();
    }
}

fn calc_rows(size: usize) -> ([Row; MAX_ROWS], usize, usize) {
    let mut rows = [Row::default(); MAX_ROWS];
    let mut row_count = 0;
    let mut offset = 0;
    let mut bits = size;
    loop {
        assert!(row_count < MAX_ROWS, "bitset of size {} is too large", size);
        let blocks = ((bits + BLOCK_BITS - 1) / BLOCK_BITS).max(1);
        rows[row_count] = Row {
            offset,
            size: blocks,
        };
        row_count += 1;
        offset += blocks;
        if blocks == 1 {
            break;
        }
        bits = blocks;
    }
    (rows, row_count, offset)
}

#[inline]
fn block_mask(bit: usize) -> Block {
    1 << (bit % BLOCK_BITS)
}

struct BlockBits(Block);

impl Iterator for BlockBits {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(bit)
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

    #[test]
    fn set_reset_and_count() {
        let mut bits = HierarchicalBitset::new(1000, false);
        assert!(bits.set(3));
        assert!(!bits.set(3));
        assert!(bits.set(999));
        assert!(bits.set(64));
        assert_eq!(bits.count(), 3);
        assert!(bits.test(64));
        assert!(!bits.test(65));

        assert!(bits.reset(3));
        assert!(!bits.reset(3));
        assert_eq!(bits.count(), 2);
        assert_eq!(bits.first_one(), Some(64));
    }

    #[test]
    #[should_panic]
    fn out_of_range_panics() {
        let bits = HierarchicalBitset::new(10, false);
        bits.test(10);
    }

    #[test]
    fn take_is_ascending_and_reports_shortfall() {
        let mut bits = HierarchicalBitset::new(300_000, false);
        for i in [5, 70_000, 4096, 299_999, 128] {
            bits.set(i);
        }

        let mut taken = Vec::new();
        let remaining = bits.take(3, |i| taken.push(i));
        assert_eq!(remaining, 0);
        assert_eq!(taken, vec![5, 128, 4096]);

        taken.clear();
        let remaining = bits.take(10, |i| taken.push(i));
        assert_eq!(remaining, 8);
        assert_eq!(taken, vec![70_000, 299_999]);
        assert!(bits.is_empty());
        assert_eq!(bits.first_one(), None);
    }

    #[test]
    fn filled_bitset_only_covers_its_size() {
        let bits = HierarchicalBitset::new(130, true);
        assert_eq!(bits.count(), 130);
        assert_eq!(bits.ones().last(), Some(129));
        assert_eq!(bits.zeros().count(), 0);
    }

    #[test]
    fn resize_keeps_content_and_rebuilds_summary() {
        let mut bits = HierarchicalBitset::new(100, false);
        bits.set(7);
        bits.set(99);

        bits.resize(10_000, true);
        assert_eq!(bits.count(), 2 + (10_000 - 100));
        assert!(bits.test(7));
        assert!(!bits.test(8));
        assert!(bits.test(100));

        let mut taken = Vec::new();
        bits.take(3, |i| taken.push(i));
        assert_eq!(taken, vec![7, 99, 100]);

        bits.resize(50, false);
        assert_eq!(bits.count(), 0);
        bits.set(49);
        assert_eq!(bits.first_one(), Some(49));
        assert_eq!(bits.zeros().count(), 49);
    }

    #[test]
    fn ones_and_zeros_partition_the_bits() {
        let mut bits = HierarchicalBitset::new(200, false);
        for i in (0..200).step_by(3) {
            bits.set(i);
        }
        let ones: Vec<_> = bits.ones().collect();
        let zeros: Vec<_> = bits.zeros().collect();
        assert_eq!(ones.len(), bits.count());
        assert_eq!(ones.len() + zeros.len(), 200);
        assert!(ones.iter().all(|i| i % 3 == 0));
        assert!(zeros.iter().all(|i| i % 3 != 0));
    }
}
