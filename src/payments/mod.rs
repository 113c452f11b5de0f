//! # Payments Module - Gateway Orders and Enrollment
//!
//! Payment-mediated enrollment:
//! - Cart pricing with duplicate-enrollment checks
//! - Gateway order creation (minor-unit INR amounts)
//! - Callback signature verification with a `mock_` test bypass
//! - Idempotent enrollment plus best-effort confirmation mail
//!
//! Each enrollment attempt walks
//! `Priced -> OrderCreated -> {Verified | Rejected} -> Enrolled`; the
//! enroll step is a conflict-free insert, so replayed callbacks cannot
//! double-enroll.

pub mod gateway;

use std::sync::Arc;

use axum::{extract::State, response::Json, routing::post, Router};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::courses::{courses, enrollments, Course, Enrollment};
use crate::email;
use crate::progress::ensure_progress_row;
use crate::shared::error::ApiError;
use crate::shared::models::{users, User};
use crate::shared::state::AppState;
use crate::shared::utils::DbPool;
use gateway::generate_receipt;

/// Order identifiers carrying this prefix skip signature verification;
/// the frontend uses it for free-course checkout.
const TEST_ORDER_PREFIX: &str = "mock_";

fn is_test_order(order_id: &str) -> bool {
    order_id.starts_with(TEST_ORDER_PREFIX)
}

// ============================================================================
// PAYMENT ENGINE
// ============================================================================

/// Payment engine owning cart pricing and enrollment writes
pub struct PaymentEngine {
    db: DbPool,
}

impl PaymentEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Sums the cart. Every course must exist and the student must not
    /// already hold any of them.
    pub async fn total_amount(&self, course_ids: &[Uuid], user_id: Uuid) -> Result<f64, ApiError> {
        let mut conn = self.db.get()?;

        let mut total = 0.0;
        for &course_id in course_ids {
            let course: Course = courses::table
                .find(course_id)
                .first(&mut conn)
                .optional()?
                .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

            let already: i64 = enrollments::table
                .filter(enrollments::course_id.eq(course_id))
                .filter(enrollments::user_id.eq(user_id))
                .count()
                .get_result(&mut conn)?;
            if already > 0 {
                return Err(ApiError::DuplicateEnrollment(
                    "Student is already enrolled".to_string(),
                ));
            }

            total += course.price;
        }

        Ok(total)
    }

    /// Enrolls the student in every course in the cart. Conflict-free
    /// inserts make this idempotent: an already-held course is skipped
    /// without error and without a second confirmation mail. Returns
    /// the student and the newly enrolled courses.
    pub async fn enroll_students(
        &self,
        course_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<(User, Vec<Course>), ApiError> {
        let mut conn = self.db.get()?;

        let user: User = users::table
            .find(user_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        let mut newly_enrolled = Vec::new();
        for &course_id in course_ids {
            let course: Course = courses::table
                .find(course_id)
                .first(&mut conn)
                .optional()?
                .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

            let inserted = diesel::insert_into(enrollments::table)
                .values(&Enrollment {
                    id: Uuid::new_v4(),
                    course_id,
                    user_id,
                    enrolled_at: Utc::now(),
                })
                .on_conflict((enrollments::course_id, enrollments::user_id))
                .do_nothing()
                .execute(&mut conn)?;

            ensure_progress_row(&mut conn, course_id, user_id)?;

            if inserted > 0 {
                newly_enrolled.push(course);
            } else {
                log::info!(
                    "Student {} already enrolled in course {}, skipping",
                    user_id,
                    course_id
                );
            }
        }

        Ok((user, newly_enrolled))
    }
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

fn send_enrollment_mails(state: &AppState, user: &User, courses_list: &[Course]) {
    let mailer = match state.mailer.as_ref() {
        Some(mailer) => mailer,
        None => return,
    };

    for course in courses_list {
        if let Err(e) = email::send_enrollment_email(
            mailer,
            &state.config.email,
            &user.email,
            &user.first_name,
            &course.course_name,
        ) {
            log::warn!(
                "Enrollment email for course {} to {} failed: {}",
                course.id,
                user.email,
                e
            );
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CapturePaymentBody {
    #[serde(rename = "coursesId")]
    pub courses_id: Option<Vec<Uuid>>,
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
}

/// Price the cart and open a gateway order
pub async fn capture_payment_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CapturePaymentBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let course_ids = match body.courses_id {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Err(ApiError::Validation("Please provide course IDs".to_string())),
    };
    let user_id = body
        .user_id
        .ok_or_else(|| ApiError::Validation("All fields are required".to_string()))?;

    let engine = PaymentEngine::new(state.conn.clone());
    let total = engine.total_amount(&course_ids, user_id).await?;

    // Gateway amounts are minor units.
    let amount = (total * 100.0).round() as i64;
    let order = state
        .payments
        .create_order(amount, "INR", &generate_receipt())
        .await
        .map_err(|e| {
            log::error!("Gateway order creation failed: {}", e);
            ApiError::Internal("Could not initiate order".to_string())
        })?;

    Ok(Json(json!({
        "success": true,
        "data": order,
        "message": "Order created successfully"
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentBody {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    #[serde(rename = "coursesId")]
    pub courses_id: Option<Vec<Uuid>>,
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
}

/// Verify the gateway callback and enroll the student
pub async fn verify_payment_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyPaymentBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (course_ids, user_id) = match (body.courses_id, body.user_id) {
        (Some(ids), Some(user_id)) if !ids.is_empty() => (ids, user_id),
        _ => return Err(ApiError::Validation("Courses or user ID missing".to_string())),
    };

    let engine = PaymentEngine::new(state.conn.clone());

    if let Some(order_id) = body.razorpay_order_id.as_deref() {
        if is_test_order(order_id) {
            let (user, enrolled) = engine.enroll_students(&course_ids, user_id).await?;
            send_enrollment_mails(&state, &user, &enrolled);
            return Ok(Json(json!({
                "success": true,
                "message": "Course enrolled successfully (test mode)"
            })));
        }
    }

    let (order_id, payment_id, signature) = match (
        body.razorpay_order_id,
        body.razorpay_payment_id,
        body.razorpay_signature,
    ) {
        (Some(order_id), Some(payment_id), Some(signature)) => (order_id, payment_id, signature),
        _ => {
            return Err(ApiError::Validation(
                "Payment verification data missing".to_string(),
            ))
        }
    };

    let valid = state
        .payments
        .verify_signature(&order_id, &payment_id, &signature)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        log::warn!("Signature mismatch for order {}", order_id);
        return Err(ApiError::PaymentRejected(
            "Payment failed - invalid signature".to_string(),
        ));
    }

    let (user, enrolled) = engine.enroll_students(&course_ids, user_id).await?;
    send_enrollment_mails(&state, &user, &enrolled);

    Ok(Json(json!({
        "success": true,
        "message": "Payment verified"
    })))
}

#[derive(Debug, Deserialize)]
pub struct PaymentSuccessEmailBody {
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    pub amount: Option<i64>,
}

/// Send the payment receipt mail; this endpoint's only job
pub async fn send_payment_success_email_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PaymentSuccessEmailBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (user_id, order_id, payment_id, amount) =
        match (body.user_id, body.order_id, body.payment_id, body.amount) {
            (Some(user_id), Some(order_id), Some(payment_id), Some(amount)) => {
                (user_id, order_id, payment_id, amount)
            }
            _ => {
                return Err(ApiError::Validation(
                    "Please provide all the fields".to_string(),
                ))
            }
        };

    let mut conn = state.conn.get()?;
    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mailer = state
        .mailer
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Could not send email".to_string()))?;

    email::send_payment_receipt(
        mailer,
        &state.config.email,
        &user.email,
        &user.first_name,
        amount,
        &order_id,
        &payment_id,
    )
    .map_err(|e| {
        log::error!("Payment receipt mail failed: {}", e);
        ApiError::Internal("Could not send email".to_string())
    })?;

    Ok(Json(json!({
        "success": true,
        "message": "Email sent successfully"
    })))
}

// ============================================================================
// ROUTE CONFIGURATION
// ============================================================================

/// Configure all payment module routes
pub fn configure_payment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/payment/capturePayment", post(capture_payment_handler))
        .route("/api/v1/payment/verifyPayment", post(verify_payment_handler))
        .route(
            "/api/v1/payment/sendPaymentSuccessEmail",
            post(send_payment_success_email_handler),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    #[test]
    fn test_test_order_detection() {
        test_util::setup();
        assert!(is_test_order("mock_free_checkout"));
        assert!(!is_test_order("order_HsG1bdfa"));
        assert!(!is_test_order(""));
    }

    #[test]
    fn test_verify_body_wire_names() {
        test_util::setup();
        let user = Uuid::new_v4();
        let course = Uuid::new_v4();
        let body: VerifyPaymentBody = serde_json::from_value(json!({
            "razorpay_order_id": "order_1",
            "razorpay_payment_id": "pay_1",
            "razorpay_signature": "sig",
            "coursesId": [course],
            "userId": user,
        }))
        .unwrap();

        assert_eq!(body.razorpay_order_id.as_deref(), Some("order_1"));
        assert_eq!(body.courses_id.unwrap(), vec![course]);
        assert_eq!(body.user_id, Some(user));
    }

    #[test]
    fn test_minor_unit_conversion_rounds() {
        test_util::setup();
        let total = 499.99_f64;
        assert_eq!((total * 100.0).round() as i64, 49999);
        let fractional = 0.1_f64 + 0.2_f64;
        assert_eq!((fractional * 100.0).round() as i64, 30);
    }
}
