//! Prime field arithmetic over GF(2^61 - 1).
//!
//! Signed plaintexts are embedded with a centered lift: values in
//! `[0, p/2]` are non-negative, values above map to `v - p`.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Mersenne prime 2^61 - 1
pub const MODULUS: u64 = (1 << 61) - 1;

/// Largest magnitude that survives the centered lift. Sums that cross it
/// wrap silently, so callers bound their inputs against it.
pub const MAX_PLAINTEXT: i64 = (MODULUS / 2) as i64;

/// A field element, always reduced
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fp(u64);

impl Fp {
    pub const ZERO: Fp = Fp(0);
    pub const ONE: Fp = Fp(1);

    pub fn new(value: u64) -> Self {
        Self(value % MODULUS)
    }

    /// Embed a signed integer, reducing it without any range check
    pub fn from_i64(value: i64) -> Self {
        let magnitude = Self::new(value.unsigned_abs());
        if value < 0 { -magnitude } else { magnitude }
    }

    /// Embed a signed integer, `None` when `|value| > MAX_PLAINTEXT`
    pub fn try_from_i64(value: i64) -> Option<Self> {
        (value.unsigned_abs() <= MAX_PLAINTEXT as u64).then(|| Self::from_i64(value))
    }

    /// Lift back to a signed integer (centered representative)
    pub fn to_i64(self) -> i64 {
        if self.0 <= MODULUS / 2 {
            self.0 as i64
        } else {
            -((MODULUS - self.0) as i64)
        }
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(0..MODULUS))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Square-and-multiply
    pub fn pow(self, mut exp: u64) -> Self {
        let mut base = self;
        let mut result = Fp::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result * base;
            }
            base = base * base;
            exp >>= 1;
        }
        result
    }

    /// Multiplicative inverse via Fermat: a^(p-2). `None` for zero.
    pub fn inv(self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(self.pow(MODULUS - 2))
        }
    }
}

impl fmt::Debug for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fp({})", self.0)
    }
}

impl Add for Fp {
    type Output = Fp;

    fn add(self, rhs: Fp) -> Fp {
        let sum = self.0 + rhs.0;
        Fp(if sum >= MODULUS { sum - MODULUS } else { sum })
    }
}

impl Sub for Fp {
    type Output = Fp;

    fn sub(self, rhs: Fp) -> Fp {
        self + (-rhs)
    }
}

impl Neg for Fp {
    type Output = Fp;

    fn neg(self) -> Fp {
        if self.0 == 0 { self } else { Fp(MODULUS - self.0) }
    }
}

impl Mul for Fp {
    type Output = Fp;

    fn mul(self, rhs: Fp) -> Fp {
        let wide = (self.0 as u128) * (rhs.0 as u128);
        Fp((wide % MODULUS as u128) as u64)
    }
}
