//! Overflow-free integer helpers for token amounts.
//!
//! Scores and rewards are both 18-decimal fixed-point values, so their
//! product routinely exceeds `u128`. [`mul_div_floor`] computes
//! `floor(a * b / c)` through a 256-bit intermediate and only fails when
//! the final quotient itself does not fit.

const LOW_MASK: u128 = u128::MAX >> 64;

/// Full 256-bit product of two `u128` values as `(high, low)`.
#[allow(clippy::arithmetic_side_effects)] // limb products are < 2^128 and sums are bounded
const fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    let (a_hi, a_lo) = (a >> 64, a & LOW_MASK);
    let (b_hi, b_lo) = (b >> 64, b & LOW_MASK);

    let lo_lo = a_lo * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_lo = a_hi * b_lo;
    let hi_hi = a_hi * b_hi;

    let mid = (lo_lo >> 64) + (lo_hi & LOW_MASK) + (hi_lo & LOW_MASK);
    let low = (lo_lo & LOW_MASK) | (mid << 64);
    let high = hi_hi + (lo_hi >> 64) + (hi_lo >> 64) + (mid >> 64);
    (high, low)
}

/// `floor(a * b / c)`, or `None` if `c` is zero or the quotient exceeds `u128`.
#[allow(clippy::arithmetic_side_effects)] // restoring division keeps rem < divisor
pub const fn mul_div_floor(a: u128, b: u128, c: u128) -> Option<u128> {
    if c == 0 {
        return None;
    }

    let (high, low) = widening_mul(a, b);
    if high == 0 {
        return Some(low / c);
    }
    if high >= c {
        return None;
    }

    // Bitwise long division of (high, low) by c; the quotient fits in
    // 128 bits because high < c.
    let mut rem = high;
    let mut quotient: u128 = 0;
    let mut bit = 128;
    while bit > 0 {
        bit -= 1;
        let carry = rem >> 127;
        rem = (rem << 1) | ((low >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quotient |= 1;
        }
    }
    Some(quotient)
}
