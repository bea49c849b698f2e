/// A horizontal band of rows `[start_row, end_row)` belonging to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub start_row: u32,
    pub end_row: u32,
    /// The frame this band belongs to.
    pub task_id: u64,
}

impl Tile {
    pub fn rows(&self) -> u32 {
        self.end_row - self.start_row
    }

    /// Number of pixels in this band for a frame `width` pixels wide.
    pub fn pixel_count(&self, width: u32) -> usize {
        width as usize * self.rows() as usize
    }
}

/// Split rows `[0, height)` into at most `count` contiguous bands.
///
/// Bands are `ceil(height / count)` rows tall; the last one takes the
/// remainder. No empty band is produced, so fewer than `count` bands come
/// back when `height < count`.
pub fn partition_rows(height: u32, count: u32, task_id: u64) -> Vec<Tile> {
    if height == 0 {
        return Vec::new();
    }
    let rows_per_band = height.div_ceil(count.max(1));
    let mut tiles = Vec::with_capacity(count as usize);
    let mut start_row = 0;
    while start_row < height {
        let end_row = (start_row + rows_per_band).min(height);
        tiles.push(Tile {
            start_row,
            end_row,
            task_id,
        });
        start_row = end_row;
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_cover_frame() {
        let tiles = partition_rows(150, 4, 7);
        let total_pixels: usize = tiles.iter().map(|t| t.pixel_count(200)).sum();
        assert_eq!(total_pixels, 200 * 150);
        assert!(tiles.iter().all(|t| t.task_id == 7));
    }

    #[test]
    fn bands_are_contiguous_without_overlap() {
        let tiles = partition_rows(101, 8, 1);
        assert_eq!(tiles[0].start_row, 0);
        for pair in tiles.windows(2) {
            assert_eq!(pair[0].end_row, pair[1].start_row);
        }
        assert_eq!(tiles.last().unwrap().end_row, 101);
    }

    #[test]
    fn ceil_division_sizes() {
        let tiles = partition_rows(10, 4, 0);
        let rows: Vec<u32> = tiles.iter().map(Tile::rows).collect();
        assert_eq!(rows, vec![3, 3, 3, 1]);
        // Ceil sizing can leave workers idle rather than produce empty bands.
        let tiles = partition_rows(9, 4, 0);
        let rows: Vec<u32> = tiles.iter().map(Tile::rows).collect();
        assert_eq!(rows, vec![3, 3, 3]);
    }

    #[test]
    fn fewer_rows_than_workers() {
        let tiles = partition_rows(3, 8, 0);
        assert_eq!(tiles.len(), 3);
        assert!(tiles.iter().all(|t| t.rows() == 1));
        assert!(partition_rows(0, 8, 0).is_empty());
    }

    #[test]
    fn zero_workers_is_one_band() {
        let tiles = partition_rows(20, 0, 0);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].rows(), 20);
    }
}
