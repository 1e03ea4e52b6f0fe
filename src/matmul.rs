//! Small dense kernels used by `Layer`.
//!
//! All matrices are row-major `f64` buffers. Callers validate shapes at the API
//! boundary; these helpers only `debug_assert!`.

/// `y = A x` for `A` with shape `(rows, cols)`.
#[inline]
pub(crate) fn matvec(a: &[f64], rows: usize, cols: usize, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(a.len(), rows * cols);
    debug_assert_eq!(x.len(), cols);
    debug_assert_eq!(y.len(), rows);

    for (r, out) in y.iter_mut().enumerate() {
        let row = &a[r * cols..(r + 1) * cols];
        let mut acc = 0.0_f64;
        for (&w, &v) in row.iter().zip(x) {
            acc = w.mul_add(v, acc);
        }
        *out = acc;
    }
}

/// `y = A^T x` for `A` with shape `(rows, cols)`.
#[inline]
pub(crate) fn matvec_transposed(a: &[f64], rows: usize, cols: usize, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(a.len(), rows * cols);
    debug_assert_eq!(x.len(), rows);
    debug_assert_eq!(y.len(), cols);

    y.fill(0.0);
    for (r, &xv) in x.iter().enumerate() {
        let row = &a[r * cols..(r + 1) * cols];
        for (out, &w) in y.iter_mut().zip(row) {
            *out = w.mul_add(xv, *out);
        }
    }
}

/// `acc += u v^T`, with `acc` shaped `(u.len(), v.len())`.
#[inline]
pub(crate) fn outer_accumulate(u: &[f64], v: &[f64], acc: &mut [f64]) {
    debug_assert_eq!(acc.len(), u.len() * v.len());

    let cols = v.len();
    for (r, &uv) in u.iter().enumerate() {
        let row = &mut acc[r * cols..(r + 1) * cols];
        for (out, &vv) in row.iter_mut().zip(v) {
            *out = uv.mul_add(vv, *out);
        }
    }
}
