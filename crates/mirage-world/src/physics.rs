//! Per-tile physics: genesis, the per-tick update, and hazard damage.
//!
//! Tiles degrade a little every tick, degradation feeds hazard growth and
//! accelerates resource drain, and only lightly-degraded tiles regrow.
//! All values are clamped back into their domains after every update:
//! `degradation` and `hazard` to `[0, 1]`, `resource` to `[0, 100]`.

use mirage_types::Tile;

use crate::seed::stable_unit;

/// Maximum resource a tile can hold.
pub const MAX_TILE_RESOURCE: u32 = 100;

/// Degradation added to every tile every tick, before the tick-phase term.
const BASE_DEGRADATION_RATE: f64 = 0.006;

/// Extra degradation per unit of `tick mod 7`, a small 7-tick ripple.
const DEGRADATION_PHASE_RATE: f64 = 0.0005;

/// Hazard growth per unit of degradation per tick.
const HAZARD_GROWTH_RATE: f64 = 0.0015;

/// Degradation below which a tile still regrows one resource per tick.
const REGROWTH_CUTOFF: f64 = 0.25;

/// Clamp a value to `[0, 1]`.
fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Create the tile at `(x, y)` from its deterministic per-coordinate seeds.
///
/// Resource starts in `[60, 100)` and hazard in `[0.05, 0.30)`; degradation
/// starts at zero. The same coordinates always produce the same tile, which
/// is what makes world resets and replay-driven regeneration exact.
pub fn make_tile(x: i32, y: i32) -> Tile {
    let r = stable_unit(&format!("resource:{x}:{y}"));
    let h = stable_unit(&format!("hazard:{x}:{y}"));
    // r is in [0, 1), so the value is in [60, 100); truncation is the intent.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let resource = (60.0 + r * 40.0) as u32;
    Tile {
        degradation: 0.0,
        resource,
        hazard: 0.05 + h * 0.25,
    }
}

/// Apply one tick of physics to a tile.
///
/// Order matters: degradation first, then hazard growth from the new
/// degradation, then drain, then regrowth for lightly-degraded tiles.
pub fn apply_tile_tick(tile: &mut Tile, tick: u64) {
    // The phase is at most 6; exactly representable as f64.
    #[allow(clippy::cast_precision_loss)]
    let phase = (tick % 7) as f64;
    tile.degradation = clamp01(tile.degradation + BASE_DEGRADATION_RATE + phase * DEGRADATION_PHASE_RATE);
    tile.hazard = clamp01(tile.hazard + HAZARD_GROWTH_RATE * tile.degradation);

    // degradation is clamped to [0, 1], so the cast term is in [0, 3].
    #[allow(
        clippy::arithmetic_side_effects,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let drain = 1 + (3.0 * tile.degradation) as u32;
    tile.resource = tile.resource.saturating_sub(drain);
    if tile.degradation < REGROWTH_CUTOFF {
        tile.resource = (tile.resource.saturating_add(1)).min(MAX_TILE_RESOURCE);
    }
}

/// Hit points an agent loses to its tile at the end of a tick.
///
/// The effective exposure is `hazard * (0.6 + degradation)`, stepped into
/// damage bands at 0.15, 0.35, and 0.65.
pub fn hazard_damage(hazard: f64, degradation: f64) -> i32 {
    let x = hazard * (0.6 + degradation);
    if x < 0.15 {
        0
    } else if x < 0.35 {
        1
    } else if x < 0.65 {
        2
    } else {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_deterministic() {
        assert_eq!(make_tile(3, 7), make_tile(3, 7));
        assert_ne!(make_tile(3, 7), make_tile(7, 3));
    }

    #[test]
    fn genesis_values_are_in_domain() {
        for y in 0..20 {
            for x in 0..20 {
                let t = make_tile(x, y);
                assert!((60..100).contains(&t.resource));
                assert!((0.05..0.30).contains(&t.hazard));
                assert!(t.degradation.abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn values_stay_in_domain_over_many_ticks() {
        let mut tile = make_tile(0, 0);
        for tick in 1..=1000 {
            apply_tile_tick(&mut tile, tick);
            assert!((0.0..=1.0).contains(&tile.degradation));
            assert!((0.0..=1.0).contains(&tile.hazard));
            assert!(tile.resource <= MAX_TILE_RESOURCE);
        }
    }

    #[test]
    fn fresh_tiles_regrow_as_fast_as_they_drain() {
        let mut tile = Tile {
            degradation: 0.0,
            resource: 50,
            hazard: 0.1,
        };
        apply_tile_tick(&mut tile, 1);
        // Drain of 1 offset by regrowth of 1 while degradation is low.
        assert_eq!(tile.resource, 50);
    }

    #[test]
    fn degraded_tiles_drain_without_regrowth() {
        let mut tile = Tile {
            degradation: 0.9,
            resource: 50,
            hazard: 0.1,
        };
        apply_tile_tick(&mut tile, 1);
        // Drain is 1 + floor(3 * degradation) with no regrowth above the cutoff.
        assert_eq!(tile.resource, 50 - 3);
    }

    #[test]
    fn hazard_damage_bands() {
        assert_eq!(hazard_damage(0.1, 0.0), 0);
        assert_eq!(hazard_damage(0.3, 0.0), 1);
        assert_eq!(hazard_damage(0.5, 0.2), 2);
        assert_eq!(hazard_damage(0.9, 0.9), 3);
    }
}
