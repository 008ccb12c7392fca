//! Element-weighted block partitioning feeding a global sum-reduce: each
//! process computes a local residual over an unevenly weighted 1-D split,
//! then all processes combine their residuals into a single total via a
//! root reduce followed by a broadcast (see `container::tests::block_sum_via_all_reduce`
//! for why the in-process backend needs that root-then-broadcast shape).

use ispace::backend::local::LocalBackend;
use ispace::container::Container;
use ispace::error::Result;
use ispace::group::ProcessGroup;
use ispace::partitioner::{All, BlockElementWeighted, Single};
use ispace::partitioning::Partitioning;
use ispace::range::IndexSpace;
use ispace::reduce::{Elem, Flow, ReductionOp};

/// `switch_to` needs its backend as both `&dyn Backend` and
/// `&mut dyn Transport` at once; `LocalBackend` is a cheap `Rc` handle, so a
/// clone stands in for the immutable half.
fn sw<T: Elem>(
    c: &mut Container<T>,
    to: &Partitioning,
    flow: Flow,
    op: ReductionOp,
    backend: &mut LocalBackend,
) -> Result<()> {
    let b = backend.clone();
    c.switch_to(to, flow, op, &b, backend)
}

#[test]
fn weighted_split_residuals_sum_to_known_total() {
    let n = 3usize;
    let len = 12usize;
    // Heavier weight on the tail: should push process 2's owned range
    // narrower than a plain block split would.
    let weights: Vec<f64> = (0..len).map(|i| if i >= len - 3 { 5.0 } else { 1.0 }).collect();

    let space = IndexSpace::new("residual", &[len as i64]).unwrap();
    let group = ProcessGroup::world(n, 0);
    let weighted = Partitioning::build(
        "weighted",
        &space,
        &group,
        &BlockElementWeighted::new(0, &weights),
        None,
    );
    assert_eq!(weighted.slices().len(), n);

    let mut backends = LocalBackend::world(n);
    let mut residuals: Vec<Container<f64>> = (0..n)
        .map(|id| Container::new(space.clone(), ProcessGroup::world(n, id as i32)))
        .collect();

    let mut expected_total = 0.0;
    for (id, c) in residuals.iter_mut().enumerate() {
        sw(c, &weighted, Flow::Init, ReductionOp::None, &mut backends[id]).unwrap();
        let slice = weighted.slices().iter().find(|s| s.process as usize == id).unwrap();
        for idx in slice.range.iter_indices() {
            let value = idx[0] as f64 * 0.5;
            expected_total += value;
            c.get_map_mut(slice.map_no).unwrap().set(&idx, value);
        }
    }

    let sum_space = IndexSpace::new("sum", &[1]).unwrap();
    let all_part = Partitioning::build("all", &sum_space, &group, &All, None);
    let root_part = Partitioning::build("root", &sum_space, &group, &Single(0), None);
    let mut sums: Vec<Container<f64>> = (0..n)
        .map(|id| Container::new(sum_space.clone(), ProcessGroup::world(n, id as i32)))
        .collect();

    for (id, c) in sums.iter_mut().enumerate() {
        sw(c, &all_part, Flow::Init, ReductionOp::None, &mut backends[id]).unwrap();
        let slice = weighted.slices().iter().find(|s| s.process as usize == id).unwrap();
        let local_sum: f64 = residuals[id].get_map(slice.map_no).unwrap().as_slice().iter().sum();
        c.get_map_mut(0).unwrap().set(&[0], local_sum);
    }

    for id in (0..n).rev() {
        sw(&mut sums[id], &root_part, Flow::Preserve, ReductionOp::Sum, &mut backends[id]).unwrap();
    }
    for id in 0..n {
        sw(&mut sums[id], &all_part, Flow::Preserve, ReductionOp::None, &mut backends[id]).unwrap();
    }

    for id in 0..n {
        let total = sums[id].get_map(0).unwrap().get(&[0]);
        assert!((total - expected_total).abs() < 1e-9);
    }
}
