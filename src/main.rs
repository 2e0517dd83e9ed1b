use semiblas::config;
use semiblas::{
    assign, emult, mxm, AssignSource, BinaryOp, Descriptor, DupPolicy, IndexList, Matrix,
    Semiring, Sparsity, NO_MASK,
};
use tracing_subscriber::EnvFilter;

fn main() -> semiblas::Result<()> {
    // RUST_LOG=semiblas::burble=debug shows the algorithm choices
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    config::set_burble(true);

    println!("semiblas {}", semiblas::VERSION);

    // Diagonal times diagonal
    let a = Matrix::from_tuples(3, 3, &[0, 1, 2], &[0, 1, 2], &[1, 2, 3], DupPolicy::Error)?;
    println!("\nMatrix A:");
    println!("{:?}", a);

    let c = mxm(NO_MASK, &Semiring::plus_times(), &a, &a, &Descriptor::default())?;
    println!("\nC = A*A over plus.times ({}):", c.sparsity());
    for (r, col, v) in c.iter()? {
        println!("  C({}, {}) = {}", r, col, v);
    }

    // Shortest two-hop paths
    let w = Matrix::from_tuples(
        4,
        4,
        &[0, 0, 1, 2],
        &[1, 2, 3, 3],
        &[4.0, 1.0, 1.0, 5.0],
        DupPolicy::Error,
    )?;
    let d = mxm(NO_MASK, &Semiring::min_plus(), &w, &w, &Descriptor::default())?;
    println!("\nTwo-hop distances over min.plus:");
    for (r, col, v) in d.iter()? {
        println!("  d({}, {}) = {}", r, col, v);
    }

    // Pattern intersection
    let p = emult(NO_MASK, BinaryOp::<f64, f64, bool>::pair_bool(), &w, &d, &Descriptor::default())?;
    println!("\nEdges that also close a two-hop path: {}", p.nvals()?);

    // Assignment into a bitmap
    let mut b = Matrix::<i32>::new_with(2, 2, false, Sparsity::Bitmap)?;
    let (rows, cols) = (IndexList::List(vec![0]), IndexList::List(vec![1]));
    assign(&mut b, NO_MASK, None, AssignSource::Scalar(5), &rows, &cols, &Descriptor::default())?;
    assign(
        &mut b,
        NO_MASK,
        Some(BinaryOp::plus()),
        AssignSource::Scalar(5),
        &rows,
        &cols,
        &Descriptor::default(),
    )?;
    println!(
        "\nAfter two assignments: B(0, 1) = {:?}, {} entries",
        b.extract_element(0, 1)?,
        b.nvals()?
    );

    Ok(())
}
