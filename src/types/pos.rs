/// Spatial primitives shared by every task: block positions, chunk columns,
/// dimension classification.
///
/// Block positions are `glam::IVec3` throughout; this module adds the
/// conversions and distance helpers the task layer leans on.
use glam::{IVec2, IVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of a chunk column in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// One game tick is 1/20 s; all durations in the core are tick counts.
pub const TICKS_PER_SECOND: u64 = 20;

/// Convert a wall-clock duration in seconds to game ticks.
#[inline]
pub fn seconds_to_ticks(seconds: f32) -> u64 {
    (seconds * TICKS_PER_SECOND as f32).round() as u64
}

/// A 16x16 chunk column identified by its (x, z) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk containing a block position. Uses euclidean division so
    /// negative coordinates land in the right column.
    pub fn from_block(block: IVec3) -> Self {
        Self {
            x: block.x.div_euclid(CHUNK_SIZE),
            z: block.z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Center column of this chunk at the given height: `chunk*16 + 8`.
    pub fn center_block(&self, y: i32) -> IVec3 {
        IVec3::new(
            self.x * CHUNK_SIZE + CHUNK_SIZE / 2,
            y,
            self.z * CHUNK_SIZE + CHUNK_SIZE / 2,
        )
    }

    /// Chebyshev distance in chunks, the ring index used by expanding scans.
    pub fn ring_distance(&self, other: ChunkPos) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// All chunks at exactly `ring` Chebyshev distance from this one.
    /// Ring 0 is the chunk itself.
    pub fn ring(&self, ring: i32) -> Vec<ChunkPos> {
        if ring == 0 {
            return vec![*self];
        }
        let mut out = Vec::with_capacity((ring as usize) * 8);
        for dx in -ring..=ring {
            for dz in -ring..=ring {
                if dx.abs().max(dz.abs()) == ring {
                    out.push(ChunkPos::new(self.x + dx, self.z + dz));
                }
            }
        }
        out
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// The three worlds the agent can be in. Routes the orchestrator's
/// top-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Overworld,
    Nether,
    End,
}

impl Dimension {
    /// Classify a dimension identifier string. Identifiers contain "nether"
    /// or "end" as a substring; anything else is the overworld.
    pub fn classify(id: &str) -> Self {
        if id.contains("nether") {
            Dimension::Nether
        } else if id.contains("end") {
            Dimension::End
        } else {
            Dimension::Overworld
        }
    }

    /// Nether horizontal coordinates are compressed by this factor relative
    /// to the overworld. Y is preserved.
    pub const NETHER_SCALE: i32 = 8;
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Overworld => write!(f, "overworld"),
            Dimension::Nether => write!(f, "nether"),
            Dimension::End => write!(f, "end"),
        }
    }
}

/// Block-center point of a block position (x+0.5, y, z+0.5).
#[inline]
pub fn block_center(block: IVec3) -> Vec3 {
    Vec3::new(block.x as f32 + 0.5, block.y as f32, block.z as f32 + 0.5)
}

/// The block position containing a continuous point.
#[inline]
pub fn block_of(pos: Vec3) -> IVec3 {
    IVec3::new(
        pos.x.floor() as i32,
        pos.y.floor() as i32,
        pos.z.floor() as i32,
    )
}

/// Squared horizontal (XZ) distance between two points.
#[inline]
pub fn distance_xz_sq(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz
}

/// Project a point onto the XZ plane.
#[inline]
pub fn xz(pos: Vec3) -> glam::Vec2 {
    glam::Vec2::new(pos.x, pos.z)
}

/// Scale an overworld XZ target down to its nether counterpart.
pub fn overworld_to_nether(target: IVec3) -> IVec3 {
    IVec3::new(
        target.x.div_euclid(Dimension::NETHER_SCALE),
        target.y,
        target.z.div_euclid(Dimension::NETHER_SCALE),
    )
}

/// Truncated XZ pair used where height is irrelevant (stronghold estimates).
pub fn xz_of_block(block: IVec3) -> IVec2 {
    IVec2::new(block.x, block.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_to_chunk_positive() {
        assert_eq!(ChunkPos::from_block(IVec3::new(16, 64, 16)), ChunkPos::new(1, 1));
        assert_eq!(ChunkPos::from_block(IVec3::new(0, 0, 0)), ChunkPos::new(0, 0));
        assert_eq!(ChunkPos::from_block(IVec3::new(15, 0, 15)), ChunkPos::new(0, 0));
    }

    #[test]
    fn test_block_to_chunk_negative() {
        assert_eq!(
            ChunkPos::from_block(IVec3::new(-17, 64, -17)),
            ChunkPos::new(-2, -2)
        );
        assert_eq!(
            ChunkPos::from_block(IVec3::new(-1, 64, -1)),
            ChunkPos::new(-1, -1)
        );
    }

    #[test]
    fn test_chunk_to_block_center() {
        assert_eq!(
            ChunkPos::new(1, 1).center_block(100),
            IVec3::new(24, 100, 24)
        );
        assert_eq!(ChunkPos::new(0, 0).center_block(64), IVec3::new(8, 64, 8));
    }

    #[test]
    fn test_chunk_roundtrip_is_identity() {
        for cx in -3..=3 {
            for cz in -3..=3 {
                let chunk = ChunkPos::new(cx, cz);
                assert_eq!(
                    ChunkPos::from_block(chunk.center_block(70)),
                    chunk,
                    "chunk -> block center -> chunk must be identity"
                );
            }
        }
    }

    #[test]
    fn test_ring_sizes() {
        let origin = ChunkPos::new(0, 0);
        assert_eq!(origin.ring(0).len(), 1);
        assert_eq!(origin.ring(1).len(), 8);
        assert_eq!(origin.ring(2).len(), 16);
        for chunk in origin.ring(3) {
            assert_eq!(origin.ring_distance(chunk), 3);
        }
    }

    #[test]
    fn test_dimension_classification() {
        assert_eq!(Dimension::classify("the_nether"), Dimension::Nether);
        assert_eq!(Dimension::classify("the_end"), Dimension::End);
        assert_eq!(Dimension::classify("overworld"), Dimension::Overworld);
        assert_eq!(Dimension::classify("unknown_world"), Dimension::Overworld);
    }

    #[test]
    fn test_overworld_to_nether_scaling() {
        assert_eq!(
            overworld_to_nether(IVec3::new(800, 64, -800)),
            IVec3::new(100, 64, -100)
        );
    }
}
