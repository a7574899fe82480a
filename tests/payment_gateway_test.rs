use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal_macros::dec;
use std::time::Duration;
use storefront_api::{
    entities::{order::Model as OrderModel, OrderItem, OrderItems, PaymentMethod},
    errors::ServiceError,
    gateways::{
        build_http_client, GatewayVerdict, IntentContext, PaymentGateway, PaymentIntent,
        PaymentOutcome, RazorpayConfig, RazorpayGateway, StripeConfig, StripeGateway,
        VerificationEvidence,
    },
};
use uuid::Uuid;
use wiremock::matchers::{body_json, body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn order(method: PaymentMethod) -> OrderModel {
    let now = Utc::now();
    OrderModel {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        items: OrderItems(vec![OrderItem {
            item_id: "p1".into(),
            size: "M".into(),
            quantity: 2,
            price: dec!(10),
            name: Some("Cotton Tee".into()),
        }]),
        amount: dec!(30),
        address: serde_json::json!({ "city": "Pune" }),
        status: "Order Placed".into(),
        payment_method: method,
        payment: false,
        gateway_ref: None,
        cart_cleared: false,
        date: now,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

fn stripe(api_base: String) -> StripeGateway {
    StripeGateway::new(
        build_http_client(Duration::from_secs(2)).unwrap(),
        StripeConfig {
            secret_key: "sk_test_123".into(),
            api_base,
            currency: "inr".into(),
            delivery_charge: dec!(10),
            webhook_secret: None,
            webhook_tolerance_secs: 300,
            allow_client_verification: true,
        },
    )
}

fn razorpay(api_base: String) -> RazorpayGateway {
    RazorpayGateway::new(
        build_http_client(Duration::from_secs(2)).unwrap(),
        RazorpayConfig {
            key_id: "rzp_test_key".into(),
            key_secret: "rzp_test_secret".into(),
            api_base,
            currency: "INR".into(),
        },
    )
}

fn ctx() -> IntentContext {
    IntentContext {
        origin: "https://shop.test".into(),
    }
}

#[tokio::test]
async fn stripe_creates_checkout_session_with_redirect_urls() {
    let server = MockServer::start().await;
    let order = order(PaymentMethod::Stripe);

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header_exists("authorization"))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains(order.id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_test_abc",
            "url": "https://checkout.stripe.test/c/cs_test_abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let intent = stripe(server.uri())
        .create_intent(&order, &ctx())
        .await
        .expect("session created");

    assert_matches!(
        intent,
        PaymentIntent::CheckoutSession { session_id, session_url, success_url, cancel_url, reference }
            if session_id == "cs_test_abc"
                && session_url == "https://checkout.stripe.test/c/cs_test_abc"
                && success_url == format!("https://shop.test/verify?success=true&orderId={}", order.id)
                && cancel_url == format!("https://shop.test/verify?success=false&orderId={}", order.id)
                && reference == order.id
    );
}

#[tokio::test]
async fn stripe_error_response_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "message": "Invalid currency" }
        })))
        .mount(&server)
        .await;

    let err = stripe(server.uri())
        .create_intent(&order(PaymentMethod::Stripe), &ctx())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::GatewayError(msg) if msg == "Invalid currency");
}

#[tokio::test]
async fn stripe_timeout_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(serde_json::json!({ "id": "cs_slow", "url": "https://x" })),
        )
        .mount(&server)
        .await;

    let err = stripe(server.uri())
        .create_intent(&order(PaymentMethod::Stripe), &ctx())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::GatewayError(_));
}

#[tokio::test]
async fn stripe_webhook_without_secret_is_rejected() {
    let err = stripe("http://127.0.0.1:9".into())
        .verify(VerificationEvidence::SignedEvent {
            payload: bytes::Bytes::from_static(b"{}"),
            signature: "t=1,v1=00".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidArgument(_));
}

#[tokio::test]
async fn razorpay_creates_order_in_minor_units() {
    let server = MockServer::start().await;
    let order = order(PaymentMethod::Razorpay);

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(body_json(serde_json::json!({
            "amount": 3000,
            "currency": "INR",
            "receipt": order.id.to_string()
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "order_rzp_1",
            "amount": 3000,
            "currency": "INR",
            "receipt": order.id.to_string(),
            "status": "created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let intent = razorpay(server.uri())
        .create_intent(&order, &ctx())
        .await
        .expect("provider order created");

    assert_eq!(
        intent,
        PaymentIntent::ProviderOrder {
            provider_order_id: "order_rzp_1".into(),
            amount: 3000,
            currency: "INR".into(),
            receipt: order.id.to_string(),
        }
    );
}

#[tokio::test]
async fn razorpay_verify_reads_receipt_and_status() {
    let server = MockServer::start().await;
    let order_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/v1/orders/order_paid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "order_paid",
            "amount": 3000,
            "currency": "INR",
            "receipt": order_id.to_string(),
            "status": "paid"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/order_attempted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "order_attempted",
            "amount": 3000,
            "currency": "INR",
            "receipt": order_id.to_string(),
            "status": "attempted"
        })))
        .mount(&server)
        .await;

    let gateway = razorpay(server.uri());

    let paid = gateway
        .verify(VerificationEvidence::ProviderOrder {
            provider_order_id: "order_paid".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        paid,
        Some(GatewayVerdict {
            order_id,
            outcome: PaymentOutcome::Paid
        })
    );

    let attempted = gateway
        .verify(VerificationEvidence::ProviderOrder {
            provider_order_id: "order_attempted".into(),
        })
        .await
        .unwrap();
    assert_eq!(attempted.map(|v| v.outcome), Some(PaymentOutcome::Pending));
}

#[tokio::test]
async fn razorpay_unknown_order_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/order_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "description": "The id provided does not exist" }
        })))
        .mount(&server)
        .await;

    let err = razorpay(server.uri())
        .verify(VerificationEvidence::ProviderOrder {
            provider_order_id: "order_missing".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn razorpay_lookup_refuses_ids_that_leave_the_orders_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "pay_1",
            "status": "captured"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = razorpay(server.uri());
    for id in ["x/../../payments/pay_1", "order_1/../../payments/pay_1", "order_1?x=1"] {
        let err = gateway
            .verify(VerificationEvidence::ProviderOrder {
                provider_order_id: id.into(),
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidArgument(_));
    }
}

#[tokio::test]
async fn razorpay_order_without_receipt_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/order_orphan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "order_orphan",
            "amount": 3000,
            "currency": "INR",
            "status": "paid"
        })))
        .mount(&server)
        .await;

    let err = razorpay(server.uri())
        .verify(VerificationEvidence::ProviderOrder {
            provider_order_id: "order_orphan".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::GatewayError(_));
}

#[tokio::test]
async fn razorpay_rejects_redirect_evidence() {
    let err = razorpay("http://127.0.0.1:9".into())
        .verify(VerificationEvidence::ClientRedirect {
            order_id: Uuid::new_v4(),
            success: true,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidArgument(_));
}
