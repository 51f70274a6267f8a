use mpi::traits::*;

use rusty_kdtree::{
    constants::COORDINATOR,
    distributed::DistributedKdTreeBuilder,
    helpers::{configure_logger, random_points, staircase},
    serial,
    topology::ProcessTopology,
    transport::MpiTransport,
    types::{
        node::KdTree,
        point::{Coordinate, PointSet},
    },
};

const NPOINTS: usize = 10000;
const DIMS: usize = 3;

/// Build a tree over `points` on every worker of `world`. Only the coordinator
/// returns a tree.
fn tree_fixture<C: Communicator>(world: &C, points: &[Coordinate], dims: usize) -> Option<KdTree> {
    let comm = world.duplicate();
    let transport = MpiTransport::new(&comm);
    let builder = DistributedKdTreeBuilder::new(&transport, dims).unwrap();

    let points: &[Coordinate] = if world.rank() == COORDINATOR { points } else { &[] };
    builder.build(points).unwrap()
}

/// Test that every point made it into the tree exactly once.
fn test_node_count(tree: &KdTree, points: &[Coordinate], dims: usize) {
    let mut expected: Vec<Vec<Coordinate>> = points.chunks_exact(dims).map(|p| p.to_vec()).collect();
    expected.sort();

    assert_eq!(tree.len(), expected.len());
    assert_eq!(tree.sorted_points(), expected);
}

/// Test the k-d property at every node.
fn test_kd_invariant(tree: &KdTree) {
    assert!(tree.is_valid());
}

/// Test that the tree does not depend on the number of workers.
fn test_worker_count_invariance(tree: &KdTree, points: &[Coordinate], dims: usize) {
    let points = PointSet::new(points.to_vec(), dims).unwrap();
    let expected = KdTree::new(serial::build(points, 0), dims);

    assert_eq!(tree, &expected);
}

/// Test that the finalized form of the tree unpacks to the same tree.
fn test_round_trip(tree: &KdTree) {
    let flat = tree.finalize().unwrap();
    let unpacked = KdTree::from_serialized(&flat, tree.dims()).unwrap();

    assert_eq!(&unpacked, tree);
}

/// Test the six point staircase, whose root splits on x = 7.
fn test_staircase<C: Communicator>(world: &C) {
    let points = staircase(6, 2);
    if let Some(tree) = tree_fixture(world, &points, 2) {
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.root().unwrap().get(0), Some(7));
        test_worker_count_invariance(&tree, &points, 2);
    }
}

/// Test that an empty input gives an empty tree on any number of workers.
fn test_empty<C: Communicator>(world: &C) {
    if let Some(tree) = tree_fixture(world, &[], DIMS) {
        assert!(tree.is_empty());
        assert!(tree.finalize().unwrap().is_empty());
    }
}

/// Test that every rank other than the coordinator is fed by exactly one parent.
fn test_topology<C: Communicator>(world: &C) {
    let topology = ProcessTopology::new(world.rank(), world.size()).unwrap();
    match topology.parent() {
        None => assert_eq!(world.rank(), COORDINATOR),
        Some((parent, depth)) => {
            assert!(parent < world.rank());
            assert!(depth <= topology.max_depth() + 1);
            // Surplus ranks are the last ones and join below the full levels.
            let first_surplus = world.size() - topology.surplus();
            assert_eq!(world.rank() >= first_surplus, depth == topology.max_depth() + 1);
        }
    }
}

fn main() {
    let universe = mpi::initialize().unwrap();
    let world = universe.world();
    let _guard = configure_logger(ftlog::LevelFilter::Warn, None).unwrap();

    test_topology(&world);
    test_staircase(&world);
    test_empty(&world);

    let points = random_points(NPOINTS, DIMS, 1000, 0);
    if let Some(tree) = tree_fixture(&world, &points, DIMS) {
        test_node_count(&tree, &points, DIMS);
        test_kd_invariant(&tree);
        test_worker_count_invariance(&tree, &points, DIMS);
        test_round_trip(&tree);
    }

    world.barrier();
    if world.rank() == COORDINATOR {
        println!("parallel tests passed on {} workers", world.size());
    }
}
