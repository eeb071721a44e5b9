//! Appointment wizard price and duration arithmetic.

use uuid::Uuid;

use crate::models::{round_cents, CustomService, Service, DEFAULT_SERVICE_DURATION};

/// Shortest appointment the wizard produces.
pub const MIN_DURATION_MINUTES: i32 = 30;
pub const DEFAULT_CUSTOM_SERVICE_NAME: &str = "Serviço Personalizado";

/// Sum of the selected services' prices.
pub fn base_price(services: &[Service]) -> f64 {
    round_cents(services.iter().map(|s| s.price).sum())
}

/// Base price plus the custom service, when one is enabled.
pub fn suggested_price(services: &[Service], custom: &CustomService) -> f64 {
    let custom_price = if custom.enabled { custom.price.max(0.0) } else { 0.0 };
    round_cents(base_price(services) + custom_price)
}

/// Price after a percentage discount; the discount is clamped to 0..=100.
pub fn final_price(price: f64, discount_percent: f64) -> f64 {
    let discount = if discount_percent.is_finite() {
        discount_percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    round_cents(price.max(0.0) * (1.0 - discount / 100.0))
}

pub fn total_duration(services: &[Service], custom: &CustomService) -> i32 {
    let from_services: i32 = services
        .iter()
        .map(|s| {
            if s.duration_minutes > 0 {
                s.duration_minutes
            } else {
                DEFAULT_SERVICE_DURATION
            }
        })
        .sum();
    let from_custom = if custom.enabled {
        custom.duration_minutes.filter(|d| *d > 0).unwrap_or(0)
    } else {
        0
    };
    (from_services + from_custom).max(MIN_DURATION_MINUTES)
}

/// Label stored on the appointment: service names joined, custom service last.
pub fn service_label(services: &[Service], custom: &CustomService) -> String {
    let mut names: Vec<String> = services.iter().map(|s| s.name.clone()).collect();
    if custom.enabled {
        names.push(custom_service_name(custom));
    }
    names.join(", ")
}

pub fn custom_service_name(custom: &CustomService) -> String {
    custom
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_CUSTOM_SERVICE_NAME)
        .to_string()
}

/// Price and duration written by an edit. Switching to a service the
/// appointment does not already have resets both to that service's values;
/// otherwise the requested values are kept.
pub fn edited_price_and_duration(
    current_service_ids: &[Uuid],
    selected: Option<&Service>,
    requested_price: Option<f64>,
    requested_duration: Option<i32>,
) -> (Option<f64>, Option<i32>) {
    match selected {
        Some(service) if !current_service_ids.contains(&service.id) => (
            Some(service.price),
            requested_duration.or(Some(service.duration_minutes)),
        ),
        _ => (requested_price, requested_duration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn service(name: &str, price: f64, duration: i32) -> Service {
        Service {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            category_id: None,
            name: name.to_string(),
            description: None,
            price,
            duration_minutes: duration,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn custom(price: f64, enabled: bool) -> CustomService {
        CustomService {
            enabled,
            name: None,
            price,
            duration_minutes: Some(15),
        }
    }

    #[test]
    fn price_adds_custom_service_only_when_enabled() {
        let services = vec![service("Corte", 45.0, 30), service("Barba", 30.5, 20)];
        assert_eq!(base_price(&services), 75.5);
        assert_eq!(suggested_price(&services, &custom(20.0, true)), 95.5);
        assert_eq!(suggested_price(&services, &custom(20.0, false)), 75.5);
    }

    #[test]
    fn discount_is_clamped_and_rounded() {
        assert_eq!(final_price(100.0, 10.0), 90.0);
        assert_eq!(final_price(99.99, 15.0), 84.99);
        assert_eq!(final_price(50.0, -5.0), 50.0);
        assert_eq!(final_price(50.0, 150.0), 0.0);
        assert_eq!(final_price(50.0, f64::NAN), 50.0);
    }

    #[test]
    fn duration_has_floor_and_defaults() {
        assert_eq!(total_duration(&[], &CustomService::default()), 30);
        assert_eq!(total_duration(&[service("Corte", 45.0, 0)], &CustomService::default()), 30);
        assert_eq!(
            total_duration(&[service("Corte", 45.0, 30), service("Barba", 30.0, 20)], &custom(0.0, true)),
            65
        );
        assert_eq!(total_duration(&[service("Pé", 10.0, 10)], &CustomService::default()), 30);
    }

    #[test]
    fn label_names_custom_service() {
        let services = vec![service("Corte", 45.0, 30)];
        assert_eq!(service_label(&services, &custom(10.0, true)), "Corte, Serviço Personalizado");
        let named = CustomService {
            enabled: true,
            name: Some("  Pigmentação ".into()),
            price: 10.0,
            duration_minutes: None,
        };
        assert_eq!(service_label(&[], &named), "Pigmentação");
    }

    #[test]
    fn switching_service_resets_price() {
        let current = service("Corte", 45.0, 30);
        let other = service("Barba", 30.0, 20);

        assert_eq!(
            edited_price_and_duration(&[current.id], Some(&other), Some(99.0), None),
            (Some(30.0), Some(20))
        );
    }

    #[test]
    fn echoing_the_current_service_keeps_the_edited_price() {
        let current = service("Corte", 45.0, 30);

        assert_eq!(
            edited_price_and_duration(&[current.id], Some(&current), Some(55.0), None),
            (Some(55.0), None)
        );
        assert_eq!(
            edited_price_and_duration(&[current.id], None, Some(55.0), Some(40)),
            (Some(55.0), Some(40))
        );
    }
}
