#[cfg(test)]
mod payment_gateway_integration_tests {
    use courseserver::config::PaymentConfig;
    use courseserver::payments::gateway::{compute_signature, PaymentClient, PaymentError};
    use mockito::Matcher;
    use serde_json::json;

    fn gateway_config(api_url: String) -> PaymentConfig {
        PaymentConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: "rzp_test_secret".to_string(),
            api_url,
        }
    }

    #[tokio::test]
    async fn test_create_order_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders")
            .match_header("authorization", Matcher::Regex("Basic .+".to_string()))
            .match_body(Matcher::Json(json!({
                "amount": 49900,
                "currency": "INR",
                "receipt": "rcpt_test_1"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "order_abc123",
                    "amount": 49900,
                    "currency": "INR",
                    "receipt": "rcpt_test_1",
                    "status": "created"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = PaymentClient::new(&gateway_config(server.url()));
        let order = client
            .create_order(49900, "INR", "rcpt_test_1")
            .await
            .expect("order should be created");

        assert_eq!(order.id, "order_abc123");
        assert_eq!(order.amount, 49900);
        assert_eq!(order.currency, "INR");
        assert_eq!(order.status.as_deref(), Some("created"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_order_surfaces_gateway_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/orders")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "error": {
                        "code": "BAD_REQUEST_ERROR",
                        "description": "Order amount less than minimum amount allowed"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = PaymentClient::new(&gateway_config(server.url()));
        let err = client
            .create_order(50, "INR", "rcpt_test_2")
            .await
            .expect_err("gateway rejection should surface");

        match err {
            PaymentError::ApiError(message) => {
                assert!(message.contains("less than minimum"));
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_order_requires_keys() {
        let config = PaymentConfig {
            key_id: String::new(),
            key_secret: String::new(),
            api_url: "http://127.0.0.1:1".to_string(),
        };
        let client = PaymentClient::new(&config);

        let err = client
            .create_order(10000, "INR", "rcpt_test_3")
            .await
            .expect_err("unconfigured client must refuse");
        assert!(matches!(err, PaymentError::NotConfigured));
    }

    #[tokio::test]
    async fn test_signature_round_trip_against_client() {
        let client = PaymentClient::new(&gateway_config("http://127.0.0.1:1".to_string()));

        let signature =
            compute_signature("rzp_test_secret", "order_abc123", "pay_def456").unwrap();
        assert!(client
            .verify_signature("order_abc123", "pay_def456", &signature)
            .unwrap());
        assert!(!client
            .verify_signature("order_abc123", "pay_other", &signature)
            .unwrap());
    }
}
