use crate::error::LifecycleError;

const BASE_PRICE: f64 = 15.0;
const PRICE_PER_KG: f64 = 2.5;
const INSURANCE_FEE: f64 = 5.0;

/// Booking estimate: a base fee plus a per-kilogram charge, plus a flat fee
/// for insured parcels. Rounded to two decimals.
pub fn estimate_price(weight_kg: f64, insured: bool) -> Result<f64, LifecycleError> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(LifecycleError::Validation(
            "weight must be greater than 0".to_string(),
        ));
    }

    let insurance = if insured { INSURANCE_FEE } else { 0.0 };
    let price = BASE_PRICE + weight_kg * PRICE_PER_KG + insurance;

    Ok((price * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::estimate_price;

    #[test]
    fn base_fee_plus_weight_charge() {
        assert_eq!(estimate_price(4.0, false), Ok(25.0));
    }

    #[test]
    fn insurance_adds_flat_fee() {
        assert_eq!(estimate_price(4.0, true), Ok(30.0));
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(estimate_price(0.333, false), Ok(15.83));
    }

    #[test]
    fn rejects_non_positive_weight() {
        assert!(estimate_price(0.0, false).is_err());
        assert!(estimate_price(-1.0, true).is_err());
        assert!(estimate_price(f64::NAN, false).is_err());
    }
}
