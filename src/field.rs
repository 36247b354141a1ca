//! Modular arithmetic in `GF(p)` for the two-point secret sharing scheme.
//!
//! The field is `p = 2^256 + 297`, a prime just above 2^256 chosen so every
//! 256-bit hash output is already a valid residue. Arithmetic is done with
//! [`num_bigint`]'s arbitrary-precision integers rather than a fixed-width
//! type, which sidesteps the 257th-bit overflow the spec warns fixed-width
//! 256-bit implementations must watch for.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use once_cell::sync::Lazy;

use crate::errors::FieldError;

/// A point `(x, y)` on the secret-sharing line, both coordinates already
/// reduced into `[0, p)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Point {
    pub x: BigUint,
    pub y: BigUint,
}

static DEFAULT_PRIME: Lazy<BigUint> = Lazy::new(|| (BigUint::one() << 256) + BigUint::from(297u32));

/// The field's modulus, bundled so an embedder can substitute a different
/// prime in tests without touching process-global state. The protocol's
/// own constant (`p = 2^256 + 297`) is the [`Default`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldParams {
    pub prime: BigUint,
}

impl Default for FieldParams {
    fn default() -> Self {
        FieldParams { prime: DEFAULT_PRIME.clone() }
    }
}

/// Field arithmetic over `GF(p)`, parameterized by [`FieldParams`].
#[derive(Clone, Debug, Default)]
pub struct FieldArith {
    params: FieldParams,
}

impl FieldArith {
    /// Construct field arithmetic bound to `params`.
    #[must_use]
    pub fn new(params: FieldParams) -> Self {
        FieldArith { params }
    }

    /// The field's modulus.
    #[must_use]
    pub fn prime(&self) -> &BigUint {
        &self.params.prime
    }

    /// Canonical residue of `v` modulo `p`, correct for negative `v`.
    #[must_use]
    pub fn real_mod(&self, v: &BigInt) -> BigUint {
        let p = BigInt::from_biguint(Sign::Plus, self.params.prime.clone());
        let r = ((v % &p) + &p) % &p;
        r.to_biguint().expect("real_mod result is always non-negative")
    }

    /// The slope `a` of the line through `c1` and `c2`:
    /// `(c2.y - c1.y) * modinv(c2.x - c1.x) mod p`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::DegenerateSlope`] if `c1.x == c2.x mod p`, in
    /// which case the modular inverse is undefined and the pair must be
    /// treated by the caller as a decryption failure.
    pub fn derive_slope(&self, c1: &Point, c2: &Point) -> Result<BigUint, FieldError> {
        let dx = self.real_mod(&(to_signed(&c2.x) - to_signed(&c1.x)));
        if dx.is_zero() {
            return Err(FieldError::DegenerateSlope);
        }
        let dy = self.real_mod(&(to_signed(&c2.y) - to_signed(&c1.y)));
        let dx_inv = self.modinv(&dx);
        Ok((dy * dx_inv) % self.prime())
    }

    /// The intercept `k = c.y - slope * c.x mod p`.
    #[must_use]
    pub fn intercept(&self, c: &Point, slope: &BigUint) -> BigUint {
        self.real_mod(&(to_signed(&c.y) - to_signed(slope) * to_signed(&c.x)))
    }

    /// Modular inverse of `v` modulo `p`, computed via Fermat's little
    /// theorem (`p` is prime): `v^(p-2) mod p`.
    ///
    /// Panics if `v` is zero; callers must check for degeneracy first, as
    /// [`derive_slope`](Self::derive_slope) does.
    #[must_use]
    pub fn modinv(&self, v: &BigUint) -> BigUint {
        assert!(!v.is_zero(), "modinv of zero is undefined");
        let exponent = self.prime() - BigUint::from(2u32);
        v.modpow(&exponent, self.prime())
    }
}

fn to_signed(v: &BigUint) -> BigInt {
    BigInt::from_biguint(Sign::Plus, v.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_mod_handles_negative_intermediates() {
        let field = FieldArith::default();
        let p = field.prime().clone();
        let v = BigInt::from_biguint(Sign::Minus, BigUint::from(5u32));
        let r = field.real_mod(&v);
        assert_eq!(r, &p - BigUint::from(5u32));
    }

    #[test]
    fn slope_and_intercept_round_trip() {
        let field = FieldArith::default();
        let a = BigUint::from(7u32);
        let k = BigUint::from(42u32);
        let p = field.prime();

        let c1 = Point { x: BigUint::from(1u32), y: (&a * BigUint::from(1u32) + &k) % p };
        let c2 = Point { x: BigUint::from(2u32), y: (&a * BigUint::from(2u32) + &k) % p };

        let slope = field.derive_slope(&c1, &c2).expect("non-degenerate pair");
        assert_eq!(slope, a);

        let intercept = field.intercept(&c1, &slope);
        assert_eq!(intercept, k);
    }

    #[test]
    fn degenerate_pair_is_rejected() {
        let field = FieldArith::default();
        let c1 = Point { x: BigUint::from(3u32), y: BigUint::from(10u32) };
        let c2 = Point { x: BigUint::from(3u32), y: BigUint::from(20u32) };
        assert_eq!(field.derive_slope(&c1, &c2), Err(FieldError::DegenerateSlope));
    }

    #[test]
    fn modinv_is_correct() {
        let field = FieldArith::default();
        let p = field.prime().clone();
        let v = BigUint::from(123456789u64);
        let inv = field.modinv(&v);
        assert_eq!((v * inv) % &p, BigUint::one());
    }

    #[test]
    fn custom_field_params_are_honored() {
        let custom = FieldParams { prime: BigUint::from(101u32) };
        let field = FieldArith::new(custom.clone());
        assert_eq!(field.prime(), &custom.prime);
    }
}
