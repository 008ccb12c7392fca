//! `Halo::without_corners` grows a partitioning along axis-aligned faces
//! only: diagonal corner cells a full halo would pick up must stay
//! uncovered, while the four axis-aligned neighbor cells are covered.

use ispace::group::ProcessGroup;
use ispace::partitioner::{Bisection, Halo};
use ispace::partitioning::Partitioning;
use ispace::range::IndexSpace;

#[test]
fn plus_shape_halo_skips_diagonal_corners() {
    let space = IndexSpace::new("grid", &[8, 8]).unwrap();
    let group = ProcessGroup::world(4, 0);
    let owned = Partitioning::build("owned", &space, &group, &Bisection, None);
    let full_halo = Partitioning::build("full", &space, &group, &Halo::new(1), Some(&owned));
    let plus_halo =
        Partitioning::build("plus", &space, &group, &Halo::without_corners(1), Some(&owned));

    // Every process has a cell strictly inside the grid and strictly inside
    // its own slice whose diagonal neighbor lands outside that slice.
    for process in 0..4i32 {
        let slice = owned.slices().iter().find(|s| s.process == process).unwrap();
        let from = slice.range.from();
        let to = slice.range.to();
        let corner = [to[0], to[1]];
        if !space.full_range().contains_index(&corner) {
            continue;
        }
        if slice.range.contains_index(&corner) {
            continue;
        }

        let full_covers = full_halo
            .slices()
            .iter()
            .filter(|s| s.process == process)
            .any(|s| s.range.contains_index(&corner));
        assert!(full_covers, "full halo should cover the diagonal corner for P{process}");

        let plus_covers = plus_halo
            .slices()
            .iter()
            .filter(|s| s.process == process)
            .any(|s| s.range.contains_index(&corner));
        assert!(
            !plus_covers,
            "plus-shape halo must not cover the diagonal corner for P{process}, from={from:?} to={to:?}"
        );

        // But the axis-aligned neighbor just past the right edge, if
        // in-bounds, is covered by one of the plus-shape arms.
        let right = [to[0], from[1]];
        if space.full_range().contains_index(&right) && !slice.range.contains_index(&right) {
            let arm_covers = plus_halo
                .slices()
                .iter()
                .filter(|s| s.process == process)
                .any(|s| s.range.contains_index(&right));
            assert!(arm_covers, "plus-shape halo should cover the axis-aligned neighbor for P{process}");
        }
    }
}
