use crate::market::types::ResourceKey;
use rand::Rng;
use std::collections::BTreeMap;

/// Perturbs free-unit counts to emulate an occupancy sensor with mean squared error `mse`.
///
/// Each count moves by `±sqrt(e)` with `e` uniform in `0..=2·mse`, truncated
/// toward zero and floored at zero units.
pub fn distort_capacities<R: Rng + ?Sized>(
    free: &BTreeMap<ResourceKey, u32>,
    mse: u32,
    rng: &mut R,
) -> BTreeMap<ResourceKey, u32> {
    if mse == 0 {
        return free.clone();
    }
    free.iter()
        .map(|(key, &units)| {
            let squared = rng.random_range(0..=2 * u64::from(mse));
            let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
            let distorted = (units as f64 + sign * (squared as f64).sqrt()).trunc();
            (key.clone(), distorted.max(0.0) as u32)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn free() -> BTreeMap<ResourceKey, u32> {
        [(ResourceKey::from("A"), 5), (ResourceKey::from("B"), 0), (ResourceKey::from("C"), 20)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_zero_mse_is_identity() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(distort_capacities(&free(), 0, &mut rng), free());
    }

    #[test]
    fn test_error_stays_within_root_of_twice_mse() {
        let mut rng = StdRng::seed_from_u64(11);
        let mse = 8;
        let bound = (2.0 * mse as f64).sqrt();
        for _ in 0..200 {
            let distorted = distort_capacities(&free(), mse, &mut rng);
            assert_eq!(distorted.len(), 3);
            for (key, &units) in &free() {
                let diff = (distorted[key] as f64 - units as f64).abs();
                assert!(diff <= bound.ceil(), "{key}: {diff}");
            }
        }
    }

    #[test]
    fn test_huge_mse_does_not_overflow() {
        let mut rng = StdRng::seed_from_u64(5);
        let bound = (2.0 * u32::MAX as f64).sqrt().ceil() as u32;
        for _ in 0..50 {
            let distorted = distort_capacities(&free(), u32::MAX, &mut rng);
            assert!(distorted.values().all(|&units| units <= 20 + bound));
        }
    }

    #[test]
    fn test_same_seed_same_distortion() {
        let a = distort_capacities(&free(), 4, &mut StdRng::seed_from_u64(99));
        let b = distort_capacities(&free(), 4, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
