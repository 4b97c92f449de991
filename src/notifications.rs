//! Email content builders.
//!
//! Pure functions from domain models to (subject, html) pairs; the queue
//! and dispatcher never know what kind of email they carry.

use crate::entities::{lead::Model as LeadModel, order::Model as OrderModel};

/// Formats minor currency units as a major-unit string, e.g. 98600 -> "986.00".
pub fn format_amount(minor: i64, currency: &str) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}{} {}.{:02}", sign, currency, abs / 100, abs % 100)
}

/// Confirmation sent to the customer once their payment is verified.
pub fn order_confirmation_email(order: &OrderModel) -> (String, String) {
    let subject = format!("Order {} confirmed", order.order_number);
    let html = format!(
        "<h1>Thank you, {}!</h1>\
         <p>Your payment for order <strong>{}</strong> has been confirmed.</p>\
         <p>Total: <strong>{}</strong></p>\
         <p>Delivery method: {}</p>\
         <p>We will be in touch when your order is on its way.</p>",
        order.customer_name,
        order.order_number,
        format_amount(order.total, &order.currency),
        order.delivery_method,
    );
    (subject, html)
}

/// Alert sent to the store owner for each newly paid order.
pub fn owner_order_alert_email(order: &OrderModel) -> (String, String) {
    let subject = format!(
        "New paid order {} ({})",
        order.order_number,
        format_amount(order.total, &order.currency)
    );
    let destination = match order.delivery_method.as_str() {
        "pickup" => order
            .pickup_location
            .clone()
            .unwrap_or_else(|| "pickup location not set".to_string()),
        _ => order
            .delivery_address
            .clone()
            .unwrap_or_else(|| "delivery address not set".to_string()),
    };
    let html = format!(
        "<h2>New paid order</h2>\
         <p>Order: <strong>{}</strong></p>\
         <p>Customer: {} ({}, {})</p>\
         <p>Total: <strong>{}</strong></p>\
         <p>{}: {}</p>",
        order.order_number,
        order.customer_name,
        order.customer_email,
        order.customer_phone,
        format_amount(order.total, &order.currency),
        if order.delivery_method == "pickup" {
            "Pickup"
        } else {
            "Deliver to"
        },
        destination,
    );
    (subject, html)
}

/// Notification sent to the store owner when a lead is captured.
pub fn lead_notification_email(lead: &LeadModel) -> (String, String) {
    let subject = format!("New lead: {}", lead.name);
    let html = format!(
        "<h2>New lead captured</h2>\
         <p>Name: <strong>{}</strong></p>\
         <p>Email: <strong>{}</strong></p>\
         <p>Phone: {}</p>\
         <p>Source: {}</p>\
         <p>Message: {}</p>",
        lead.name,
        lead.email,
        lead.phone.as_deref().unwrap_or("not provided"),
        lead.source.as_deref().unwrap_or("unknown"),
        lead.message.as_deref().unwrap_or(""),
    );
    (subject, html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_order() -> OrderModel {
        OrderModel {
            id: Uuid::new_v4(),
            order_number: "SF-123456-ABCDE".to_string(),
            customer_name: "Ada Obi".to_string(),
            customer_email: "ada@example.com".to_string(),
            customer_phone: "+2348012345678".to_string(),
            subtotal: 98600,
            delivery_fee: 1500,
            total: 100100,
            currency: "NGN".to_string(),
            status: "processing".to_string(),
            payment_status: "paid".to_string(),
            delivery_method: "delivery".to_string(),
            delivery_address: Some("12 Marina Rd, Lagos".to_string()),
            pickup_location: None,
            payment_reference: Some("ref_abc".to_string()),
            idempotency_key: None,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(format_amount(98600, "NGN"), "NGN 986.00");
        assert_eq!(format_amount(5, "NGN"), "NGN 0.05");
        assert_eq!(format_amount(0, "USD"), "USD 0.00");
        assert_eq!(format_amount(-150, "NGN"), "-NGN 1.50");
    }

    #[test]
    fn confirmation_mentions_order_number_and_total() {
        let order = sample_order();
        let (subject, html) = order_confirmation_email(&order);
        assert!(subject.contains("SF-123456-ABCDE"));
        assert!(html.contains("NGN 1001.00"));
        assert!(html.contains("Ada Obi"));
    }

    #[test]
    fn owner_alert_uses_pickup_location_for_pickup_orders() {
        let mut order = sample_order();
        order.delivery_method = "pickup".to_string();
        order.pickup_location = Some("Ikeja City Mall".to_string());
        let (_, html) = owner_order_alert_email(&order);
        assert!(html.contains("Ikeja City Mall"));
        assert!(html.contains("Pickup"));
    }
}
