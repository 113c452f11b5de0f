//! Transactional mail for enrollment and payment receipts.
//!
//! Sending is best-effort everywhere except the explicit receipt
//! endpoint: a student who paid is enrolled even when SMTP is down, and
//! the failure is logged instead of surfaced.

use crate::config::EmailConfig;
use lettre::{transport::smtp::authentication::Credentials, Message, SmtpTransport, Transport};

pub fn build_mailer(config: &EmailConfig) -> Result<SmtpTransport, String> {
    let creds = Credentials::new(config.username.clone(), config.password.clone());
    let mailer = SmtpTransport::relay(&config.server)
        .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
        .port(config.port)
        .credentials(creds)
        .build();
    Ok(mailer)
}

pub fn send_enrollment_email(
    mailer: &SmtpTransport,
    config: &EmailConfig,
    to: &str,
    first_name: &str,
    course_name: &str,
) -> Result<(), String> {
    let (subject, body) = compose_enrollment(first_name, course_name);
    send(mailer, config, to, &subject, body)
}

pub fn send_payment_receipt(
    mailer: &SmtpTransport,
    config: &EmailConfig,
    to: &str,
    first_name: &str,
    amount: i64,
    order_id: &str,
    payment_id: &str,
) -> Result<(), String> {
    let (subject, body) = compose_receipt(first_name, amount, order_id, payment_id);
    send(mailer, config, to, &subject, body)
}

fn send(
    mailer: &SmtpTransport,
    config: &EmailConfig,
    to: &str,
    subject: &str,
    body: String,
) -> Result<(), String> {
    let email = Message::builder()
        .from(
            config
                .from
                .parse()
                .map_err(|e| format!("Invalid from address: {}", e))?,
        )
        .to(to
            .parse()
            .map_err(|e| format!("Invalid to address: {}", e))?)
        .subject(subject)
        .body(body)
        .map_err(|e| format!("Failed to build email: {}", e))?;

    mailer
        .send(&email)
        .map_err(|e| format!("Failed to send email: {}", e))?;

    log::info!("Sent \"{}\" to {}", subject, to);
    Ok(())
}

fn compose_enrollment(first_name: &str, course_name: &str) -> (String, String) {
    let subject = format!("Successfully Enrolled into {}", course_name);
    let body = format!(
        "Dear {},\n\n\
         You have successfully enrolled into the course \"{}\".\n\
         Head over to your dashboard to start learning.\n\n\
         Happy learning!",
        first_name, course_name
    );
    (subject, body)
}

/// Amounts arrive in minor currency units, the way the gateway reports
/// them, and are shown in major units on the receipt.
fn compose_receipt(
    first_name: &str,
    amount: i64,
    order_id: &str,
    payment_id: &str,
) -> (String, String) {
    let subject = "Payment Received".to_string();
    let body = format!(
        "Dear {},\n\n\
         We have received your payment of Rs {:.2}.\n\n\
         Order ID: {}\n\
         Payment ID: {}\n\n\
         Thank you for learning with us!",
        first_name,
        amount as f64 / 100.0,
        order_id,
        payment_id
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    #[test]
    fn test_enrollment_subject_names_course() {
        test_util::setup();
        let (subject, body) = compose_enrollment("Priya", "Rust for Web");
        assert_eq!(subject, "Successfully Enrolled into Rust for Web");
        assert!(body.contains("Dear Priya"));
        assert!(body.contains("Rust for Web"));
    }

    #[test]
    fn test_receipt_converts_minor_units() {
        test_util::setup();
        let (subject, body) = compose_receipt("Priya", 49900, "order_x", "pay_y");
        assert_eq!(subject, "Payment Received");
        assert!(body.contains("Rs 499.00"));
        assert!(body.contains("order_x"));
        assert!(body.contains("pay_y"));
    }
}
