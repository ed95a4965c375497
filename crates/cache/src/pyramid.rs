//! Tile pyramid geometry.
//!
//! Scale 0 is full resolution; every scale above it halves both dimensions,
//! rounding up, until the whole image fits in a single tile.

/// Edge length of a square tile, in pixels.
pub const TILE_SIZE: u32 = 256;

/// Length of `dimension` at `scale`.
pub fn scaled(dimension: u32, scale: u32) -> u32 {
    if scale >= u32::BITS {
        return u32::from(dimension > 0);
    }
    let divisor = 1u64 << scale;
    u64::from(dimension).div_ceil(divisor) as u32
}

/// Coarsest scale: the smallest one at which the image fits in one tile.
pub fn max_scale(width: u32, height: u32) -> u32 {
    let mut scale = 0;
    while scaled(width, scale) > TILE_SIZE || scaled(height, scale) > TILE_SIZE {
        scale += 1;
    }
    scale
}

/// Columns and rows of tiles at `scale`. Edge tiles are truncated, never
/// padded, so they count as whole tiles here.
pub fn grid(width: u32, height: u32, scale: u32) -> (u32, u32) {
    (scaled(width, scale).div_ceil(TILE_SIZE), scaled(height, scale).div_ceil(TILE_SIZE))
}

pub fn tile_count(width: u32, height: u32, scale: u32) -> u64 {
    let (columns, rows) = grid(width, height, scale);
    u64::from(columns) * u64::from(rows)
}

/// Tiles in the whole pyramid, scale 0 through [`max_scale`].
pub fn total_tiles(width: u32, height: u32) -> u64 {
    (0..=max_scale(width, height)).map(|scale| tile_count(width, height, scale)).sum()
}
