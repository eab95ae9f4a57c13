/// Create a gaussian blur kernel.
///
/// # Arguments
///
/// * `kernel_size` - The size of the kernel.
/// * `sigma` - The sigma of the gaussian kernel.
///
/// # Returns
///
/// A vector of the normalized kernel weights.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f32) -> Vec<f32> {
    let mut kernel = Vec::with_capacity(kernel_size);

    let mean = kernel_size.saturating_sub(1) as f32 / 2.0;
    let sigma_sq = sigma * sigma;

    // compute the kernel
    for i in 0..kernel_size {
        let x = i as f32 - mean;
        kernel.push((-(x * x) / (2.0 * sigma_sq)).exp());
    }

    // normalize the kernel
    let norm = kernel.iter().sum::<f32>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

/// Radius at which an unnormalized gaussian of the given sigma drops below `cutoff`.
///
/// Solves `exp(-r^2 / 2s^2) / sqrt(2 pi s^2) = cutoff` for `r` and rounds up.
pub fn gaussian_radius(sigma: f32, cutoff: f32) -> usize {
    let ssq2 = 2.0 * sigma * sigma;
    let r = (-ssq2 * (cutoff * (std::f32::consts::PI * ssq2).sqrt()).ln()).sqrt();
    if r.is_finite() {
        r.ceil() as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_kernel_1d() {
        let kernel = gaussian_kernel_1d(5, 1.0);
        assert_eq!(kernel.len(), 5);
        assert_relative_eq!(kernel.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(kernel[0], kernel[4]);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
    }

    #[test]
    fn test_gaussian_radius() {
        assert_eq!(gaussian_radius(4.2, 1e-4), 16);
        assert_eq!(gaussian_radius(1.0, 1e-4), 5);
        assert!(gaussian_radius(7.0, 1e-4) > gaussian_radius(4.2, 1e-4));
    }
}
