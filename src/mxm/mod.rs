//! # Matrix multiply engine
//!
//! `C<M> = A*B` over a semiring, with either operand optionally transposed.
//! Two families of kernels compute it:
//!
//! - **dot** (inner product): every output cell is one merge of a vector of
//!   `A'` with a vector of `B`. `dot2` fills a bitmap; `dot3` computes only
//!   the cells of a sparse mask.
//! - **saxpy** (Gustavson): every output vector accumulates scaled vectors
//!   of `A`, in a per-task workspace.
//!
//! All kernels work on vectors. A by-column product is computed as is. A
//! by-row product is computed as `C' = B'*A'` with the operands of the
//! multiply swapped, since the vectors of a by-row matrix are the columns of
//! its transpose.

pub mod accumulator;
mod dot;
mod saxpy;

use std::borrow::Cow;

use crate::config::{self, burble, AxBMethod};
use crate::constants::DOT_BITMAP_MAX_CELLS;
use crate::descriptor::Descriptor;
use crate::error::{GrbError, Result};
use crate::ewise::mask::Mask;
use crate::matrix::buffer::try_alloc;
use crate::matrix::{Matrix, Store, View};
use crate::ops::{BinaryOp, Monoid, Opcode, Semiring};
use crate::parallel::Context;
use crate::types::Scalar;

/// Multiply of a left operand of type `P` and a right operand of type `Q`
pub(crate) trait Multiply<P, Q, Z>: Copy + Send + Sync {
    fn mult(&self, l: P, r: Q) -> Z;
}

/// `z = f(l, r)`
#[derive(Clone, Copy)]
pub(crate) struct Straight<X, Y, Z>(pub BinaryOp<X, Y, Z>);

impl<X: Scalar, Y: Scalar, Z: Scalar> Multiply<X, Y, Z> for Straight<X, Y, Z> {
    #[inline(always)]
    fn mult(&self, l: X, r: Y) -> Z {
        self.0.apply(l, r)
    }
}

/// `z = f(r, l)`, for products computed on transposes
#[derive(Clone, Copy)]
pub(crate) struct Flipped<X, Y, Z>(pub BinaryOp<X, Y, Z>);

impl<X: Scalar, Y: Scalar, Z: Scalar> Multiply<Y, X, Z> for Flipped<X, Y, Z> {
    #[inline(always)]
    fn mult(&self, l: Y, r: X) -> Z {
        self.0.apply(r, l)
    }
}

/// Which operand values a kernel reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Access {
    pub left: bool,
    pub right: bool,
}

impl Access {
    pub const BOTH: Access = Access {
        left: true,
        right: true,
    };
}

/// Specialized kernel flavor for a multiply opcode
///
/// `first`, `second` and `pair` do not depend on one or both operands, so
/// their kernels skip reading those values. Every other opcode has no
/// specialized flavor and yields `NoValue`.
pub(crate) fn specialized_access(opcode: Opcode, flipped: bool) -> Result<Access> {
    let (x, y) = match opcode {
        Opcode::First => (true, false),
        Opcode::Second => (false, true),
        Opcode::Pair => (false, false),
        _ => return Err(GrbError::NoValue),
    };
    Ok(if flipped {
        Access { left: y, right: x }
    } else {
        Access { left: x, right: y }
    })
}

/// Kernel flavor to run, falling back to the generic kernel
fn access_for(opcode: Opcode, flipped: bool) -> Result<Access> {
    match specialized_access(opcode, flipped) {
        Err(GrbError::NoValue) => Ok(Access::BOTH),
        other => other,
    }
}

/// Operands and algebra of one product, in vector space
pub(crate) struct Factors<'a, P, Q, Z, F> {
    pub left: View<'a, P>,
    pub right: View<'a, Q>,
    pub mult: F,
    pub add: Monoid<Z>,
    pub access: Access,
}

impl<'a, P, Q, Z, F> Factors<'a, P, Q, Z, F>
where
    P: Scalar,
    Q: Scalar,
    Z: Scalar,
    F: Multiply<P, Q, Z>,
{
    /// Product of the left entry at `pl` and the right entry at `pr`
    #[inline(always)]
    pub fn product(&self, pl: usize, pr: usize) -> Z {
        let l = if self.access.left {
            self.left.value(pl)
        } else {
            P::default()
        };
        let r = if self.access.right {
            self.right.value(pr)
        } else {
            Q::default()
        };
        self.mult.mult(l, r)
    }
}

/// Kernel output, possibly holding zombies still to be removed
pub(crate) struct Product<Z> {
    pub store: Store<Z>,
    pub nzombies: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Dot2,
    Dot3,
    Saxpy,
}

impl Method {
    fn name(&self) -> &'static str {
        match self {
            Method::Dot2 => "dot2",
            Method::Dot3 => "dot3",
            Method::Saxpy => "saxpy",
        }
    }
}

/// Matrix multiply, `C<M> = A*B` over `semiring`
///
/// `C` takes the orientation of `A`. The method comes from the descriptor,
/// or from the process-wide setting when the descriptor leaves it open; the
/// result does not depend on the method.
///
/// # Errors
///
/// `DimensionMismatch` if the inner dimensions differ or the mask does not
/// match the shape of `C`; `OutOfMemory` if a workspace cannot be allocated.
#[tracing::instrument(skip_all, fields(semiring = %semiring.name()))]
pub fn mxm<X, Y, Z, M>(
    mask: Option<&Matrix<M>>,
    semiring: &Semiring<X, Y, Z>,
    a: &Matrix<X>,
    b: &Matrix<Y>,
    desc: &Descriptor,
) -> Result<Matrix<Z>>
where
    X: Scalar,
    Y: Scalar,
    Z: Scalar,
    M: Scalar,
{
    let (ar, ac) = if desc.transpose_a {
        (a.ncols(), a.nrows())
    } else {
        (a.nrows(), a.ncols())
    };
    let (br, bc) = if desc.transpose_b {
        (b.ncols(), b.nrows())
    } else {
        (b.nrows(), b.ncols())
    };
    if ac != br {
        return Err(GrbError::dims(
            "mxm",
            format!("A is {}x{}, B is {}x{}", ar, ac, br, bc),
        ));
    }
    if let Some(m) = mask {
        if (m.nrows(), m.ncols()) != (ar, bc) {
            return Err(GrbError::dims(
                "mxm",
                format!("mask is {}x{}, C is {}x{}", m.nrows(), m.ncols(), ar, bc),
            ));
        }
    }

    let is_csc = a.is_csc();
    let a = a.reoriented(is_csc)?;
    let b = b.reoriented(is_csc)?;
    let m = mask.map(|m| m.reoriented(is_csc)).transpose()?;

    let cfg = config::global();
    let plan = Plan {
        method: desc.axb_method.unwrap_or(cfg.axb_method),
        mask: m.as_deref(),
        desc,
        ratio: cfg.dot_saxpy_ratio,
        ctx: cfg.context(),
    };
    let add = *semiring.add();
    let op = *semiring.multiply();
    let opcode = op.opcode();

    let (cvlen, cvdim, product) = if is_csc {
        let access = access_for(opcode, false)?;
        plan.run(Straight(op), add, access, (&*a, desc.transpose_a), (&*b, desc.transpose_b))?
    } else {
        let access = access_for(opcode, true)?;
        plan.run(Flipped(op), add, access, (&*b, desc.transpose_b), (&*a, desc.transpose_a))?
    };
    Matrix::with_zombies(cvlen, cvdim, is_csc, product.store, product.nzombies)
}

/// Method choice and operand preparation for one call
struct Plan<'m, 'd, M> {
    method: AxBMethod,
    /// Mask in the orientation of `C`
    mask: Option<&'m Matrix<M>>,
    desc: &'d Descriptor,
    ratio: f64,
    ctx: Context,
}

impl<'m, 'd, M: Scalar> Plan<'m, 'd, M> {
    /// Computes `C = op(X) * op(Y)` in vector space, where `x` and `y` hold
    /// the stored operand and whether it is transposed. Returns the vector
    /// length and count of `C` with the kernel output.
    fn run<P, Q, Z, F>(
        &self,
        mult: F,
        add: Monoid<Z>,
        access: Access,
        x: (&Matrix<P>, bool),
        y: (&Matrix<Q>, bool),
    ) -> Result<(usize, usize, Product<Z>)>
    where
        P: Scalar,
        Q: Scalar,
        Z: Scalar,
        F: Multiply<P, Q, Z>,
    {
        let (xm, tx) = x;
        let (ym, ty) = y;
        let r: Cow<'_, Matrix<Q>> = if ty {
            Cow::Owned(ym.transpose()?)
        } else {
            Cow::Borrowed(ym)
        };
        let (cvlen, cvdim) = if tx {
            (xm.vdim, r.vdim)
        } else {
            (xm.vlen, r.vdim)
        };

        let method = self.choose(xm, tx, &r, cvlen, cvdim)?;
        let mask = self
            .mask
            .map(|m| Mask::new(m, self.desc.mask_struct, self.desc.mask_comp));
        burble!(
            "{} C{}=A{}*B ({} x {})",
            method.name(),
            match &mask {
                None => "",
                Some(m) if m.is_complement() => "<!M>",
                Some(_) => "<M>",
            },
            if method == Method::Saxpy { "" } else { "'" },
            xm.describe(),
            r.describe()
        );

        let product = match method {
            Method::Saxpy => {
                let l: Cow<'_, Matrix<P>> = if tx {
                    Cow::Owned(xm.transpose()?)
                } else {
                    Cow::Borrowed(xm)
                };
                let factors = Factors {
                    left: l.view(),
                    right: r.view(),
                    mult,
                    add,
                    access,
                };
                saxpy::saxpy(&factors, mask.as_ref(), &self.ctx)?
            }
            Method::Dot2 | Method::Dot3 => {
                let lt: Cow<'_, Matrix<P>> = if tx {
                    Cow::Borrowed(xm)
                } else {
                    Cow::Owned(xm.transpose()?)
                };
                let factors = Factors {
                    left: lt.view(),
                    right: r.view(),
                    mult,
                    add,
                    access,
                };
                match (method, self.mask) {
                    (Method::Dot3, Some(m)) => {
                        dot::dot3(&factors, m, self.desc.mask_struct, &self.ctx)?
                    }
                    _ => dot::dot2(&factors, mask.as_ref(), &self.ctx)?,
                }
            }
        };
        Ok((cvlen, cvdim, product))
    }

    fn choose<P: Scalar, Q: Scalar>(
        &self,
        xm: &Matrix<P>,
        tx: bool,
        r: &Matrix<Q>,
        cvlen: usize,
        cvdim: usize,
    ) -> Result<Method> {
        let sparse_mask = self
            .mask
            .filter(|m| !self.desc.mask_comp && m.sparsity().is_sparse_like());
        let small = (cvlen as u128) * (cvdim as u128) <= DOT_BITMAP_MAX_CELLS as u128;
        Ok(match self.method {
            AxBMethod::Saxpy => Method::Saxpy,
            AxBMethod::Dot if sparse_mask.is_some() => Method::Dot3,
            AxBMethod::Dot if small => Method::Dot2,
            AxBMethod::Dot => {
                burble!("dot2 output of {} x {} cells too large, using saxpy", cvlen, cvdim);
                Method::Saxpy
            }
            AxBMethod::Default => {
                if let Some(m) = sparse_mask {
                    let flops = saxpy_flops(&xm.view(), tx, &r.view())?;
                    if (m.nvals_held() as f64) * self.ratio < flops as f64 {
                        return Ok(Method::Dot3);
                    }
                }
                if tx && small {
                    Method::Dot2
                } else {
                    Method::Saxpy
                }
            }
        })
    }
}

/// Length of every vector `k` of the saxpy left operand, which is the
/// stored `x` or its transpose
fn left_lengths<P: Scalar>(x: &View<'_, P>, transposed: bool) -> Result<Vec<usize>> {
    if transposed {
        let mut len = try_alloc(x.vlen, 0)?;
        for k in 0..x.nvec() {
            for (i, _) in x.live_in(k, 0..x.vlen) {
                len[i] += 1;
            }
        }
        Ok(len)
    } else {
        let mut len = try_alloc(x.vdim, 0)?;
        for k in 0..x.nvec() {
            len[x.vector(k)] = x.vector_nnz(k);
        }
        Ok(len)
    }
}

/// Number of multiplies a saxpy product would do
fn saxpy_flops<P: Scalar, Q: Scalar>(x: &View<'_, P>, tx: bool, r: &View<'_, Q>) -> Result<usize> {
    let len = left_lengths(x, tx)?;
    Ok((0..r.nvec())
        .map(|kb| {
            r.live_in(kb, 0..r.vlen)
                .map(|(k, _)| len.get(k).copied().unwrap_or(0))
                .sum::<usize>()
        })
        .sum())
}
