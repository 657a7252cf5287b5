// Radix-2 iterative FFT on complex sequences

use num_complex::Complex64;
use std::f64::consts::PI;

/// In-place radix-2 decimation-in-time FFT.
/// The buffer length must be a power of two.
pub fn fft_in_place(buf: &mut [Complex64]) -> Result<(), String> {
    let n = buf.len();
    if n == 0 || !n.is_power_of_two() {
        return Err(format!("FFT length {} is not a power of two", n));
    }

    // Bit-reversal permutation
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if j > i {
            buf.swap(i, j);
        }
    }

    // Butterflies
    let mut len = 2;
    while len <= n {
        let ang = -2.0 * PI / len as f64;
        let wlen = Complex64::new(ang.cos(), ang.sin());
        for start in (0..n).step_by(len) {
            let mut w = Complex64::new(1.0, 0.0);
            for k in 0..len / 2 {
                let u = buf[start + k];
                let v = buf[start + k + len / 2] * w;
                buf[start + k] = u + v;
                buf[start + k + len / 2] = u - v;
                w *= wlen;
            }
        }
        len <<= 1;
    }

    Ok(())
}

/// Forward FFT returning a new vector.
pub fn fft(input: &[Complex64]) -> Result<Vec<Complex64>, String> {
    let mut buf = input.to_vec();
    fft_in_place(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dft_naive(x: &[Complex64]) -> Vec<Complex64> {
        let n = x.len();
        (0..n)
            .map(|k| {
                (0..n)
                    .map(|j| {
                        let ang = -2.0 * PI * (j * k) as f64 / n as f64;
                        x[j] * Complex64::new(ang.cos(), ang.sin())
                    })
                    .sum()
            })
            .collect()
    }

    #[test]
    fn matches_naive_dft() {
        let input: Vec<Complex64> = (0..16)
            .map(|i| Complex64::new((i as f64 * 0.7).sin(), (i as f64 * 0.3).cos()))
            .collect();
        let fast = fft(&input).unwrap();
        let slow = dft_naive(&input);
        for (a, b) in fast.iter().zip(&slow) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn impulse_transforms_to_ones() {
        let mut buf = vec![Complex64::new(0.0, 0.0); 8];
        buf[0] = Complex64::new(1.0, 0.0);
        fft_in_place(&mut buf).unwrap();
        for c in &buf {
            assert!((c - Complex64::new(1.0, 0.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn rejects_non_power_of_two() {
        let mut buf = vec![Complex64::new(1.0, 0.0); 6];
        assert!(fft_in_place(&mut buf).is_err());
    }
}
