use agenx::models::Region;
use agenx::services::pricing::final_price;
use agenx::utils::formatters::{digits_only, format_currency, format_duration, format_phone};
use agenx::utils::tokens::{reschedule_token, validate_reschedule_token};
use proptest::prelude::*;
use uuid::Uuid;

fn region() -> impl Strategy<Value = Region> {
    prop_oneof![Just(Region::Br), Just(Region::Pt)]
}

proptest! {
    #[test]
    fn discount_never_leaves_the_price_range(price in 0.0f64..10_000.0, discount in -50.0f64..150.0) {
        let result = final_price(price, discount);
        prop_assert!(result >= 0.0);
        prop_assert!(result <= price + 0.005);
    }

    #[test]
    fn full_discount_is_free(price in 0.0f64..10_000.0) {
        prop_assert_eq!(final_price(price, 100.0), 0.0);
    }

    #[test]
    fn durations_end_in_a_unit(minutes in 0i64..10_000) {
        let text = format_duration(minutes);
        prop_assert!(text.ends_with("min") || text.ends_with('h'), "{}", text);
    }

    #[test]
    fn currency_starts_with_the_region_symbol(value in proptest::option::of(-1e9f64..1e9), region in region()) {
        let text = format_currency(value, region, true);
        let prefix = match region {
            Region::Br => "R$ ",
            Region::Pt => "€ ",
        };
        let unsigned = text.strip_prefix('-').unwrap_or(&text);
        prop_assert!(unsigned.starts_with(prefix), "{}", text);
        prop_assert!(text.contains(','), "{}", text);
        prop_assert!(!unsigned.contains('-'), "{}", text);
    }

    #[test]
    fn digits_only_keeps_only_digits(raw in ".*") {
        let digits = digits_only(&raw);
        prop_assert!(digits.chars().all(|c| c.is_ascii_digit()));
        prop_assert_eq!(digits.len(), raw.chars().filter(|c| c.is_ascii_digit()).count());
    }

    #[test]
    fn phone_mask_preserves_the_digits(raw in "[0-9]{0,11}") {
        let masked = format_phone(&raw, Region::Br);
        prop_assert_eq!(digits_only(&masked), raw);
    }

    #[test]
    fn reschedule_tokens_are_bound_to_their_booking(a in any::<u128>(), b in any::<u128>()) {
        prop_assume!(a != b);
        let secret = "reschedule-secret";
        let token = reschedule_token(Uuid::from_u128(a), secret);
        prop_assert!(validate_reschedule_token(Uuid::from_u128(a), &token, secret));
        prop_assert!(!validate_reschedule_token(Uuid::from_u128(b), &token, secret));
    }
}
