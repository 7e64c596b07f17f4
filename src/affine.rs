//! Decomposition of voxel to world affines into the NIfTI-1 quaternion
//! representation.

use nalgebra::{Matrix3, Matrix4, RowVector4, SymmetricEigen, Vector3};

/// A 3x3 linear transformation, usually a rotation.
pub type Affine3 = Matrix3<f64>;
/// A 4x4 homogeneous affine transformation.
pub type Affine4 = Matrix4<f64>;

/// Separate a 4x4 affine into its 3x3 affine and translation components.
pub fn get_affine_and_translation(affine: &Affine4) -> (Affine3, Vector3<f64>) {
    let translation = Vector3::new(affine[(0, 3)], affine[(1, 3)], affine[(2, 3)]);
    let linear = affine.fixed_view::<3, 3>(0, 0).into_owned();
    (linear, translation)
}

/// Split an affine into the pieces stored by the qform: a proper rotation,
/// the (positive) voxel sizes, the `qfac` sign of the third axis and the
/// translation.
///
/// The rotation is the nearest orthonormal matrix to the normalized linear
/// part, so small shears from single precision rounding are absorbed.
pub(crate) fn decompose_affine(affine: &Affine4) -> (Affine3, Vector3<f64>, f64, Vector3<f64>) {
    let (mut linear, translation) = get_affine_and_translation(affine);
    let mut zooms = Vector3::new(
        linear.column(0).norm(),
        linear.column(1).norm(),
        linear.column(2).norm(),
    );
    for (i, z) in zooms.iter_mut().enumerate() {
        if *z == 0.0 {
            // degenerate axis, keep the column as a unit vector
            linear[(i, i)] = 1.0;
            *z = 1.0;
        }
    }
    let mut qfac = 1.0;
    if linear.determinant() < 0.0 {
        qfac = -1.0;
    }
    let mut rotation = linear;
    for c in 0..3 {
        let scale = if c == 2 { zooms[c] * qfac } else { zooms[c] };
        let mut column = rotation.column_mut(c);
        column /= scale;
    }

    let svd = rotation.svd(true, true);
    if let (Some(u), Some(v_t)) = (svd.u, svd.v_t) {
        rotation = u * v_t;
    }
    (rotation, zooms, qfac, translation)
}

/// Calculate quaternion corresponding to given rotation matrix.
///
/// Method claimed to be robust to numerical errors in `affine`. Constructs quaternion by
/// calculating maximum eigenvector for matrix `k` (constructed from input `affine`). Although this
/// is not tested, a maximum eigenvalue of 1 corresponds to a valid rotation.
///
/// A quaternion `q * -1.0` corresponds to the same rotation as `q`; thus the sign of the
/// reconstructed quaternion is arbitrary, and we return quaternions with positive `w` `(q[0])`.
///
/// Bar-Itzhack, Itzhack Y. "New method for extracting the quaternion from a rotation
/// matrix", AIAA Journal of Guidance, Control and Dynamics 23(6):1085-1087, 2000
pub(crate) fn affine_to_quaternion(affine: &Affine3) -> RowVector4<f64> {
    // qyx refers to the contribution of the y input vector component to the x output vector
    // component. qyx is therefore the same as M[0, 1]. The notation is from the Wikipedia article.
    let qxx = affine[0];
    let qyx = affine[3];
    let qzx = affine[6];
    let qxy = affine[1];
    let qyy = affine[4];
    let qzy = affine[7];
    let qxz = affine[2];
    let qyz = affine[5];
    let qzz = affine[8];

    // Fill only lower half of symmetric matrix
    #[rustfmt::skip]
    let k = Affine4::new(
        qxx - qyy - qzz, 0.0,             0.0,             0.0,
        qyx + qxy,       qyy - qxx - qzz, 0.0,             0.0,
        qzx + qxz,       qzy + qyz,       qzz - qxx - qyy, 0.0,
        qyz - qzy,       qzx - qxz,       qxy - qyx,       qxx + qyy + qzz,
    );

    // Use Hermitian eigenvectors, values for speed
    let SymmetricEigen {
        eigenvalues: values,
        eigenvectors: vectors,
    } = k.symmetric_eigen();

    // Select largest eigenvector, reorder to w,x,y,z quaternion
    let max_idx = values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, v)| {
            if *v > bv {
                (i, *v)
            } else {
                (bi, bv)
            }
        })
        .0;
    let max_vector = vectors.column(max_idx);
    let quaternion = RowVector4::new(max_vector[3], max_vector[0], max_vector[1], max_vector[2]);

    // Prefer quaternion with positive `w`.
    if quaternion[0] < 0.0 {
        quaternion * -1.0
    } else {
        quaternion
    }
}

/// Rotation about the first axis by `angle` radians.
pub(crate) fn rotation_x(angle: f64) -> Affine3 {
    let (s, c) = angle.sin_cos();
    #[rustfmt::skip]
    let m = Affine3::new(
        1.0, 0.0, 0.0,
        0.0, c,   -s,
        0.0, s,   c,
    );
    m
}

/// Rotation about the second axis by `angle` radians.
pub(crate) fn rotation_y(angle: f64) -> Affine3 {
    let (s, c) = angle.sin_cos();
    #[rustfmt::skip]
    let m = Affine3::new(
        c,   0.0, s,
        0.0, 1.0, 0.0,
        -s,  0.0, c,
    );
    m
}

/// Rotation about the third axis by `angle` radians.
pub(crate) fn rotation_z(angle: f64) -> Affine3 {
    let (s, c) = angle.sin_cos();
    #[rustfmt::skip]
    let m = Affine3::new(
        c,   -s,  0.0,
        s,   c,   0.0,
        0.0, 0.0, 1.0,
    );
    m
}

/// Build a homogeneous affine from a linear part and a translation.
pub(crate) fn from_matvec(linear: &Affine3, translation: &Vector3<f64>) -> Affine4 {
    let mut affine = Affine4::identity();
    affine.fixed_view_mut::<3, 3>(0, 0).copy_from(linear);
    affine.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    affine
}
