//! Three-dimensional fit with one- and two-way margins.
//!
//! A 2×4×3 table over `dma × size × age` raked to three one-way margins and
//! two joint margins, `(dma, size)` and `(size, age)`, in both
//! representations.

use ipf_core::{
    Coord, DenseTable, DimensionSet, FitState, GroupTargets, IpfConfig, Ipfn, RowTable, Table,
};

// ── Fixture ──────────────────────────────────────────────────────────────────

const SEED: [f64; 24] = [
    1., 2., 1., 3., 5., 5., 6., 2., 2., 1., 7., 2., //
    5., 4., 2., 5., 5., 5., 3., 8., 7., 2., 7., 6.,
];
const SHAPE: [usize; 3] = [2, 4, 3];
const DMAS: [i64; 2] = [501, 502];
const SIZES: [i64; 4] = [1, 2, 3, 4];
const AGES: [&str; 3] = ["20-25", "30-35", "40-45"];

const XIPP: [f64; 2] = [52., 48.];
const XPJP: [f64; 4] = [20., 30., 35., 15.];
const XPPK: [f64; 3] = [35., 40., 25.];
const XIJP: [[f64; 4]; 2] = [[9., 17., 19., 7.], [11., 13., 16., 8.]];
const XPJK: [[f64; 3]; 4] = [[7., 9., 4.], [8., 12., 10.], [15., 12., 8.], [5., 7., 3.]];

fn dense_targets() -> Vec<DenseTable> {
    vec![
        DenseTable::from_vec(XIPP.to_vec()),
        DenseTable::from_vec(XPJP.to_vec()),
        DenseTable::from_vec(XPPK.to_vec()),
        DenseTable::from_rows(&XIJP).unwrap(),
        DenseTable::from_rows(&XPJK).unwrap(),
    ]
}

fn dense_dimensions() -> Vec<Vec<usize>> {
    vec![vec![0], vec![1], vec![2], vec![0, 1], vec![1, 2]]
}

fn row_table() -> RowTable {
    let mut t = RowTable::new(["dma", "size", "age"]);
    let mut weights = SEED.iter();
    for &dma in &DMAS {
        for &size in &SIZES {
            for &age in &AGES {
                let w = *weights.next().unwrap();
                t.push_row(vec![Coord::Int(dma), Coord::Int(size), Coord::from(age)], w)
                    .unwrap();
            }
        }
    }
    t
}

fn group_targets() -> Vec<GroupTargets> {
    let mut xijp = GroupTargets::new();
    for (i, &dma) in DMAS.iter().enumerate() {
        for (j, &size) in SIZES.iter().enumerate() {
            xijp.insert(vec![Coord::Int(dma), Coord::Int(size)], XIJP[i][j]);
        }
    }
    let mut xpjk = GroupTargets::new();
    for (j, &size) in SIZES.iter().enumerate() {
        for (k, &age) in AGES.iter().enumerate() {
            xpjk.insert(vec![Coord::Int(size), Coord::from(age)], XPJK[j][k]);
        }
    }
    vec![
        GroupTargets::single(DMAS.iter().copied().zip(XIPP)),
        GroupTargets::single(SIZES.iter().copied().zip(XPJP)),
        GroupTargets::single(AGES.iter().copied().zip(XPPK)),
        xijp,
        xpjk,
    ]
}

fn group_dimensions() -> Vec<Vec<&'static str>> {
    vec![vec!["dma"], vec!["size"], vec!["age"], vec!["dma", "size"], vec!["size", "age"]]
}

fn within(got: f64, want: f64, rate: f64) -> bool {
    (got / want - 1.0).abs() <= rate
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn test_dense_3d_converges_on_every_margin() {
    let ipfn = Ipfn::dense(
        DenseTable::new(SHAPE.to_vec(), SEED.to_vec()).unwrap(),
        dense_targets(),
        dense_dimensions(),
        IpfConfig::default(),
    )
    .unwrap();
    let report = ipfn.run();
    assert_eq!(report.state, FitState::Converged);

    let m = report.table.as_dense().unwrap();
    assert_eq!(m.shape(), &SHAPE);
    for (target, axes) in dense_targets().iter().zip(dense_dimensions()) {
        let achieved = m.marginal(&axes);
        for (got, want) in achieved.data().iter().zip(target.data()) {
            assert!(within(*got, *want, 0.01), "axes {axes:?}: {got} vs {want}");
        }
    }
}

#[test]
fn test_tabular_3d_converges_on_every_margin() {
    let ipfn = Ipfn::tabular(row_table(), group_targets(), group_dimensions(), IpfConfig::default())
        .unwrap();
    let report = ipfn.run();
    assert_eq!(report.state, FitState::Converged);

    let t = report.table.as_rows().unwrap();
    for (target, columns) in group_targets().iter().zip(group_dimensions()) {
        let achieved = t.marginal(columns.as_slice()).unwrap();
        assert_eq!(achieved.len(), target.len());
        for (key, want) in target.iter() {
            let got = achieved.get(key).unwrap();
            assert!(within(got, want, 0.01), "{columns:?} {key:?}: {got} vs {want}");
        }
    }
}

#[test]
fn test_representations_agree_cell_by_cell() {
    let dense = Ipfn::dense(
        DenseTable::new(SHAPE.to_vec(), SEED.to_vec()).unwrap(),
        dense_targets(),
        dense_dimensions(),
        IpfConfig::default().with_convergence_rate(1e-6),
    )
    .unwrap()
    .run();
    let rows = Ipfn::tabular(
        row_table(),
        group_targets(),
        group_dimensions(),
        IpfConfig::default().with_convergence_rate(1e-6),
    )
    .unwrap()
    .run();

    // Rows were pushed in the dense table's row-major order.
    assert_eq!(dense.table.weights().len(), rows.table.weights().len());
    for (a, b) in dense.table.weights().iter().zip(rows.table.weights()) {
        assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }
}

#[test]
fn test_collapsed_records_match_prebuilt_table() {
    // One record per unit of seed weight, reordered by size.
    let mut records = Vec::new();
    for (row, w) in row_table().rows() {
        for _ in 0..w as usize {
            records.push(row.to_vec());
        }
    }
    records.sort_by(|a, b| a[1].cmp(&b[1]));
    let collapsed = RowTable::collapse(["dma", "size", "age"], records).unwrap();
    assert!(collapsed.same_identity(&row_table()));
    assert_eq!(collapsed.weights(), row_table().weights());
}

#[test]
fn test_joint_margin_listed_out_of_axis_order() {
    // (size, dma) is the transpose of (dma, size).
    let transposed: Vec<f64> = (0..4).flat_map(|j| (0..2).map(move |i| XIJP[i][j])).collect();
    let ipfn = Ipfn::new(
        Table::Dense(DenseTable::new(SHAPE.to_vec(), SEED.to_vec()).unwrap()),
        vec![DenseTable::new(vec![4, 2], transposed).unwrap().into()],
        vec![DimensionSet::axes([1, 0])],
        IpfConfig::default(),
    )
    .unwrap();
    let report = ipfn.run();
    assert_eq!(report.state, FitState::Converged);
    let m = report.table.as_dense().unwrap();
    for (i, row) in XIJP.iter().enumerate() {
        for (j, &want) in row.iter().enumerate() {
            assert!(within(m.slice_sum(&[0, 1], &[i, j]), want, 1e-9));
        }
    }
}
