//! Order quantization: a raw signed size delta is rounded
//! away from zero to the venue's `size_step`, then bumped up to `min_size`
//! or dropped to zero if that still leaves nothing tradeable. Large deltas
//! are split into `max_single_order_size`-bounded chunks, each itself
//! quantized, rather than rejected outright.

use crate::model::SymbolSpec;

/// Rounds `raw_qty`'s magnitude up to the next `size_step` multiple
/// (away from zero, never toward it -- undershooting a target depth is
/// worse than a slightly larger fill). Magnitudes that round to nothing
/// tradeable collapse to exactly `0.0`; magnitudes below `min_size` after
/// rounding are bumped up to `min_size`.
pub fn quantize(raw_qty: f64, spec: &SymbolSpec) -> f64 {
    if raw_qty == 0.0 || spec.size_step <= 0.0 {
        return 0.0;
    }
    let sign = raw_qty.signum();
    let magnitude = raw_qty.abs();

    let steps = (magnitude / spec.size_step).ceil();
    let mut quantized = steps * spec.size_step;
    if quantized <= 0.0 {
        return 0.0;
    }
    if quantized < spec.min_size {
        quantized = spec.min_size;
    }
    sign * quantized
}

/// Splits a quantized signed delta into same-signed chunks no larger than
/// `max_single_order_size`, each itself a `size_step` multiple
/// ("chunked large order"). Returns an empty vec if
/// `signed_qty` quantizes to zero.
pub fn chunk_order(signed_qty: f64, spec: &SymbolSpec) -> Vec<f64> {
    let total = quantize(signed_qty, spec);
    if total == 0.0 {
        return Vec::new();
    }
    let sign = total.signum();
    let mut remaining = total.abs();
    let mut chunks = Vec::new();

    while remaining > 1e-12 {
        let target = remaining.min(spec.max_single_order_size);
        let steps = (target / spec.size_step).floor().max(1.0);
        let chunk = steps * spec.size_step;
        if chunk <= 0.0 {
            break;
        }
        chunks.push(sign * chunk);
        remaining -= chunk;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> SymbolSpec {
        SymbolSpec { min_size: 0.001, size_step: 0.001, price_step: 0.01, max_single_order_size: 100.0, contract_multiplier: 1.0, max_leverage: 20 }
    }

    #[test]
    fn rounds_away_from_zero_to_size_step() {
        let s = spec();
        assert!((quantize(0.0751, &s) - 0.076).abs() < 1e-9);
        assert!((quantize(-0.0751, &s) + 0.076).abs() < 1e-9);
    }

    #[test]
    fn exact_multiple_is_unchanged() {
        let s = spec();
        assert!((quantize(0.075, &s) - 0.075).abs() < 1e-9);
    }

    #[test]
    fn below_min_size_bumps_up() {
        let s = SymbolSpec { min_size: 0.01, size_step: 0.001, ..spec() };
        assert!((quantize(0.0005, &s) - 0.01).abs() < 1e-9);
    }

    #[test]
    fn zero_quantizes_to_zero() {
        let s = spec();
        assert_eq!(quantize(0.0, &s), 0.0);
    }

    #[test]
    fn chunked_large_order_splits_into_max_size_pieces() {
        let s = spec();
        let chunks = chunk_order(500.0, &s);
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| (*c - 100.0).abs() < 1e-9));
    }

    #[test]
    fn chunked_negative_order_preserves_sign() {
        let s = spec();
        let chunks = chunk_order(-250.0, &s);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| *c < 0.0));
        let total: f64 = chunks.iter().sum();
        assert!((total + 250.0).abs() < 1e-9);
    }

    #[test]
    fn small_order_yields_single_chunk() {
        let s = spec();
        let chunks = chunk_order(0.075, &s);
        assert_eq!(chunks.len(), 1);
        assert!((chunks[0] - 0.075).abs() < 1e-9);
    }
}
