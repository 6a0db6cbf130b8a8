/// Domain primitives shared across the task tree.
///
/// Spatial math lives in `pos` (block/chunk conversions, dimension tags);
/// item matching rules and version shims live in `item`.
pub mod item;
pub mod pos;

pub use item::{item_matches, GameVersion, ItemStack, ItemTarget};
pub use pos::{
    block_center, block_of, distance_xz_sq, overworld_to_nether, seconds_to_ticks, xz, xz_of_block,
    ChunkPos, Dimension, CHUNK_SIZE, TICKS_PER_SECOND,
};
