//! Scalar root finding for fallible functions: bracket expansion around a guess followed by Brent's
//! method (inverse quadratic interpolation, secant and bisection with a bracket that shrinks at
//! every step).
use crate::errors::EvolutionError;

#[derive(Debug, Clone, Copy)]
pub struct RootSettings {
    pub x_tol: f64, // on the bracket width
    pub f_tol: f64, // on |f(x)|
    pub max_iter: usize,
}

impl Default for RootSettings {
    fn default() -> Self {
        Self {
            x_tol: 1e-12,
            f_tol: 1e-14,
            max_iter: 100,
        }
    }
}

/// Brent's method on `[a, b]`; `f(a)` and `f(b)` must have opposite signs.
pub fn brent(
    mut f: impl FnMut(f64) -> Result<f64, EvolutionError>,
    a: f64,
    b: f64,
    settings: &RootSettings,
) -> Result<f64, EvolutionError> {
    let (mut a, mut b) = (a, b);
    let (mut fa, mut fb) = (f(a)?, f(b)?);
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if (fa > 0.0) == (fb > 0.0) {
        return Err(EvolutionError::Equilibrium(format!(
            "root is not bracketed by [{}, {}]",
            a, b
        )));
    }
    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let (mut c, mut fc) = (a, fa);
    let mut d = b - a;
    let mut bisected = true;

    for _ in 0..settings.max_iter {
        if fb.abs() < settings.f_tol || (b - a).abs() < settings.x_tol * (1.0 + b.abs()) {
            return Ok(b);
        }
        let mut s = if fa != fc && fb != fc {
            a * fb * fc / ((fa - fb) * (fa - fc))
                + b * fa * fc / ((fb - fa) * (fb - fc))
                + c * fa * fb / ((fc - fa) * (fc - fb))
        } else {
            b - fb * (b - a) / (fb - fa)
        };
        let three_quarter = (3.0 * a + b) / 4.0;
        let outside = if three_quarter < b {
            s < three_quarter || s > b
        } else {
            s > three_quarter || s < b
        };
        let slow = if bisected {
            (s - b).abs() >= (b - c).abs() / 2.0 || (b - c).abs() < settings.x_tol
        } else {
            (s - b).abs() >= (c - d).abs() / 2.0 || (c - d).abs() < settings.x_tol
        };
        if outside || slow {
            s = 0.5 * (a + b);
            bisected = true;
        } else {
            bisected = false;
        }
        let fs = f(s)?;
        d = c;
        c = b;
        fc = fb;
        if (fa > 0.0) != (fs > 0.0) {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }
        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
    }
    Err(EvolutionError::Equilibrium(format!(
        "Brent iteration did not converge in {} steps",
        settings.max_iter
    )))
}

/// Widens `[guess - w, guess + w]` geometrically, starting from `w = (factor - 1) |guess|`,
/// until the function changes sign.
pub fn bracket_root(
    f: &mut impl FnMut(f64) -> Result<f64, EvolutionError>,
    guess: f64,
    factor: f64,
    max_expansions: usize,
) -> Result<(f64, f64), EvolutionError> {
    if factor <= 1.0 {
        return Err(EvolutionError::Configuration(format!(
            "bracketing factor must exceed 1, got {}",
            factor
        )));
    }
    let mut width = (factor - 1.0) * guess.abs().max(1.0e-3);
    for _ in 0..max_expansions {
        let (a, b) = (guess - width, guess + width);
        if (f(a)? > 0.0) != (f(b)? > 0.0) {
            return Ok((a, b));
        }
        width *= 2.0;
    }
    Err(EvolutionError::Equilibrium(format!(
        "no sign change found around {} after {} expansions",
        guess, max_expansions
    )))
}

/// root of `f` near `guess`
pub fn compute_1d_root(
    mut f: impl FnMut(f64) -> Result<f64, EvolutionError>,
    guess: f64,
    factor: f64,
) -> Result<f64, EvolutionError> {
    let settings = RootSettings::default();
    let (a, b) = bracket_root(&mut f, guess, factor, settings.max_iter)?;
    brent(f, a, b, &settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_brent_sqrt2() {
        let r = brent(|x| Ok(x * x - 2.0), 0.0, 2.0, &RootSettings::default()).unwrap();
        assert_relative_eq!(r, std::f64::consts::SQRT_2, epsilon = 1e-11);
    }

    #[test]
    fn test_unbracketed_is_an_error() {
        assert!(brent(|x| Ok(x * x + 1.0), -1.0, 1.0, &RootSettings::default()).is_err());
        assert!(compute_1d_root(|x| Ok(x * x + 1.0), 0.5, 1.1).is_err());
    }

    #[test]
    fn test_compute_1d_root_far_from_guess() {
        // root at ln(1000)
        let r = compute_1d_root(|x| Ok(x.exp() - 1000.0), 0.5, 1.1).unwrap();
        assert_relative_eq!(r, 1000f64.ln(), epsilon = 1e-10);
        let r = compute_1d_root(|x| Ok(x + 0.3), -0.31, 1.1).unwrap();
        assert_relative_eq!(r, -0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_errors_from_the_function_propagate() {
        let r = compute_1d_root(
            |x| {
                if x > 0.0 {
                    Err(EvolutionError::Equilibrium("out of domain".into()))
                } else {
                    Ok(x + 1.0)
                }
            },
            -0.5,
            1.1,
        );
        assert!(matches!(r, Err(EvolutionError::Equilibrium(_))));
    }
}
