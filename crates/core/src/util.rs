//! Common `[f64; 3]` helpers shared across modules.

#[inline(always)]
pub fn sub3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline(always)]
pub fn add3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Componentwise product, e.g. integer image shifts times box edges.
#[inline(always)]
pub fn mul3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2]]
}

#[inline(always)]
pub fn norm_squared(v: &[f64; 3]) -> f64 {
    v[0] * v[0] + v[1] * v[1] + v[2] * v[2]
}

/// Compute squared distance between two 3D points.
#[inline(always)]
pub fn distance_squared(p1: &[f64; 3], p2: &[f64; 3]) -> f64 {
    norm_squared(&sub3(p1, p2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_squared() {
        let p1 = [0.0, 0.0, 0.0];
        let p2 = [1.0, 0.0, 0.0];
        assert!((distance_squared(&p1, &p2) - 1.0).abs() < 1e-10);

        let p3 = [1.0, 1.0, 1.0];
        assert!((distance_squared(&p1, &p3) - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_componentwise_ops() {
        let a = [1.0, 2.0, 3.0];
        let b = [0.5, -1.0, 2.0];
        assert_eq!(add3(&a, &b), [1.5, 1.0, 5.0]);
        assert_eq!(sub3(&a, &b), [0.5, 3.0, 1.0]);
        assert_eq!(mul3(&a, &b), [0.5, -2.0, 6.0]);
    }
}
