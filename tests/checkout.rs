mod common;

use common::{customer_request, guest_request, Harness};
use opensase_checkout::domain::aggregates::{CartLine, User};
use opensase_checkout::domain::events::NotificationJob;
use opensase_checkout::domain::value_objects::{OrderStatus, PaymentStatus};
use opensase_checkout::search::{self, SearchIndex};
use opensase_checkout::services::CheckoutError;
use opensase_checkout::store::RecordStore;
use opensase_checkout::CheckoutRequest;
use rust_decimal::Decimal;

#[tokio::test]
async fn test_plain_cart_checkout() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let lan = h.customer("lan@example.com", 0).await;
    h.fill_cart(&lan, &[(&widget, 2)]).await;

    let order = h.checkout.create_order(customer_request(&lan)).await.unwrap();
    assert_eq!(order.subtotal, Decimal::from(200_000));
    assert_eq!(order.tax, Decimal::from(20_000));
    assert_eq!(order.shipping_fee, Decimal::from(49_000));
    assert_eq!(order.total_amount, 269_000);
    assert_eq!((order.loyalty_points_used, order.loyalty_points_earned), (0, 20));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.user_id, Some(lan.id));
    assert_eq!(order.user_name.as_deref(), Some("Lan Nguyen"));

    assert_eq!(h.stock(&widget).await, 3);
    assert_eq!(h.balance(&lan).await, 20);
    assert!(h.store.cart_by_user(lan.id).await.unwrap().is_none());
    assert!(h.index.get_document(search::ORDERS, &order.id.to_string()).await.unwrap().is_some());

    let jobs = h.queue.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert!(matches!(&jobs[0], NotificationJob::OrderConfirmation { email, order_details } if email == "lan@example.com" && order_details.order_id == order.id));
}

#[tokio::test]
async fn test_coupon_checkout() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let lan = h.customer("lan@example.com", 0).await;
    h.fill_cart(&lan, &[(&widget, 2)]).await;
    h.coupon("SAVE5", 50_000, 3).await;

    let req = CheckoutRequest { coupon_code: Some("SAVE5".into()), ..customer_request(&lan) };
    let order = h.checkout.create_order(req).await.unwrap();
    assert_eq!(order.total_amount, 219_000);
    assert_eq!(order.discount_amount, Decimal::from(50_000));
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE5"));

    let coupon = h.store.coupon_by_code("SAVE5").await.unwrap().unwrap();
    assert_eq!(coupon.usage_count, 1);
    assert_eq!(coupon.orders_used, vec![order.id]);
}

#[tokio::test]
async fn test_loyalty_spend_is_capped_at_half() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let lan = h.customer("lan@example.com", 200).await;
    h.fill_cart(&lan, &[(&widget, 2)]).await;

    let order = h.checkout.create_order(customer_request(&lan)).await.unwrap();
    assert_eq!(order.loyalty_points_used, 134);
    assert_eq!(order.total_amount, 135_000);
    assert_eq!(order.loyalty_points_earned, 20);
    // 200 - 134 + 20
    assert_eq!(h.balance(&lan).await, 86);
}

#[tokio::test]
async fn test_stale_price_corrects_cart_and_rejects() {
    let h = Harness::new();
    let mut widget = h.variant("Widget", 100_000, 5).await;
    let lan = h.customer("lan@example.com", 0).await;
    h.fill_cart(&lan, &[(&widget, 2)]).await;
    widget.price = Decimal::from(120_000);
    h.save_variant(&widget).await;

    let err = h.checkout.create_order(customer_request(&lan)).await.unwrap_err();
    assert!(matches!(&err, CheckoutError::PriceChanged { lines } if lines == &vec!["Widget".to_string()]));
    assert!(err.is_rejection());

    let cart = h.store.cart_by_user(lan.id).await.unwrap().unwrap();
    assert_eq!(cart.items[0].unit_price, Decimal::from(120_000));
    assert!(h.store.all_orders().await.unwrap().is_empty());
    assert_eq!(h.stock(&widget).await, 5);

    let order = h.checkout.create_order(customer_request(&lan)).await.unwrap();
    assert_eq!(order.subtotal, Decimal::from(240_000));
}

#[tokio::test]
async fn test_guest_checkout_opens_account() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let other = h.customer("other@example.com", 0).await;
    let other_cart = h.fill_cart(&other, &[(&widget, 1)]).await;

    let order = h.checkout.create_order(guest_request("Guest@Example.com", vec![CartLine::for_variant(&widget, 2)])).await.unwrap();
    assert_eq!(order.email, "guest@example.com");
    assert_eq!(order.payment_status, PaymentStatus::Paid);

    let guest = h.store.user_by_email("guest@example.com").await.unwrap().unwrap();
    assert_eq!(order.user_id, Some(guest.id));
    assert!(guest.password_hash.starts_with("$argon2"));
    assert_eq!(guest.address.as_deref(), Some(common::ADDRESS));
    assert_eq!(guest.loyalty_points, 20);

    let jobs = h.queue.jobs().await;
    assert_eq!(jobs.iter().map(NotificationJob::kind).collect::<Vec<_>>(), vec!["create_account", "order_confirmation"]);
    assert!(matches!(&jobs[0], NotificationJob::CreateAccount { email, password, .. } if email == "guest@example.com" && password.len() == 12));
    assert_eq!(h.store.cart_by_user(other.id).await.unwrap().map(|c| c.id), Some(other_cart.id));
}

#[tokio::test]
async fn test_guest_with_known_email_earns_but_spends_nothing() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let lan = h.customer("lan@example.com", 200).await;

    let order = h.checkout.create_order(guest_request("LAN@example.com", vec![CartLine::for_variant(&widget, 2)])).await.unwrap();
    assert_eq!(order.user_id, Some(lan.id));
    assert_eq!(order.loyalty_points_used, 0);
    assert_eq!(order.total_amount, 269_000);
    assert_eq!(h.balance(&lan).await, 220);
    assert!(h.queue.jobs().await.iter().all(|j| j.kind() != "create_account"));
}

#[tokio::test]
async fn test_insufficient_stock_has_no_side_effects() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let lan = h.customer("lan@example.com", 200).await;
    h.fill_cart(&lan, &[(&widget, 6)]).await;
    h.coupon("SAVE5", 50_000, 3).await;

    let req = CheckoutRequest { coupon_code: Some("SAVE5".into()), ..customer_request(&lan) };
    let err = h.checkout.create_order(req).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientStock { requested: 6, available: 5, .. }));

    assert_eq!(h.stock(&widget).await, 5);
    assert_eq!(h.balance(&lan).await, 200);
    assert_eq!(h.store.coupon_by_code("SAVE5").await.unwrap().unwrap().usage_count, 0);
    assert!(h.store.cart_by_user(lan.id).await.unwrap().is_some());
    assert!(h.store.all_orders().await.unwrap().is_empty());
    assert!(h.queue.jobs().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_lines_share_stock() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 3).await;
    let lines = vec![CartLine::for_variant(&widget, 2), CartLine::for_variant(&widget, 2)];

    let err = h.checkout.create_order(guest_request("g@example.com", lines)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientStock { requested: 4, available: 3, .. }));
    assert!(h.store.user_by_email("g@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_oversized_quantities_do_not_wrap() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 3).await;
    let lines = vec![CartLine::for_variant(&widget, 2), CartLine::for_variant(&widget, i32::MAX)];

    let err = h.checkout.create_order(guest_request("g@example.com", lines)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientStock { requested: i32::MAX, available: 3, .. }));
    assert_eq!(h.stock(&widget).await, 3);
    assert!(h.store.user_by_email("g@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rejections_before_commit() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let mut retired = h.variant("Retired", 10_000, 5).await;
    retired.is_active = false;
    h.save_variant(&retired).await;
    let lan = h.customer("lan@example.com", 0).await;
    let line = || vec![CartLine::for_variant(&widget, 1)];

    assert!(matches!(h.checkout.create_order(customer_request(&lan)).await, Err(CheckoutError::EmptyCart)));
    assert!(matches!(h.checkout.create_order(guest_request("g@example.com", vec![])).await, Err(CheckoutError::NoItems)));
    assert!(matches!(
        h.checkout.create_order(guest_request("g@example.com", vec![CartLine::for_variant(&retired, 1)])).await,
        Err(CheckoutError::VariantUnavailable { variant_id, .. }) if variant_id == retired.id
    ));

    let card = CheckoutRequest { payment_method: "CARD".into(), ..guest_request("g@example.com", line()) };
    assert!(matches!(h.checkout.create_order(card).await, Err(CheckoutError::InvalidPaymentMethod(m)) if m == "CARD"));
    assert!(h.store.user_by_email("g@example.com").await.unwrap().is_none());

    let no_email = CheckoutRequest { email: None, ..guest_request("g@example.com", line()) };
    assert!(matches!(h.checkout.create_order(no_email).await, Err(CheckoutError::MissingGuestField("email"))));

    let unknown = CheckoutRequest { coupon_code: Some("NOPE1".into()), ..guest_request("g@example.com", line()) };
    assert!(matches!(h.checkout.create_order(unknown).await, Err(CheckoutError::CouponNotFound(_))));

    let mut paused = h.coupon("PAUSE", 1_000, 3).await;
    paused.is_active = false;
    h.repos.mirror(search::COUPONS, &paused.code, &paused).await;
    let inactive = CheckoutRequest { coupon_code: Some("PAUSE".into()), ..guest_request("g@example.com", line()) };
    assert!(matches!(h.checkout.create_order(inactive).await, Err(CheckoutError::CouponInactive(_))));

    assert!(h.store.all_orders().await.unwrap().is_empty());
    assert_eq!(h.stock(&widget).await, 5);
}

#[tokio::test]
async fn test_failed_insert_compensates_every_step() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    let lan = h.customer("lan@example.com", 200).await;
    h.fill_cart(&lan, &[(&widget, 2)]).await;
    h.coupon("SAVE5", 50_000, 3).await;
    h.store.set_fail_order_inserts(true);

    let req = CheckoutRequest { coupon_code: Some("SAVE5".into()), ..customer_request(&lan) };
    let err = h.checkout.create_order(req).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Repo(_)));
    assert!(!err.is_rejection());

    assert_eq!(h.stock(&widget).await, 5);
    assert_eq!(h.balance(&lan).await, 200);
    let coupon = h.store.coupon_by_code("SAVE5").await.unwrap().unwrap();
    assert_eq!((coupon.usage_count, coupon.orders_used.len()), (0, 0));
    assert!(h.store.cart_by_user(lan.id).await.unwrap().is_some());
    assert!(h.queue.jobs().await.is_empty());
}

#[tokio::test]
async fn test_order_survives_queue_outage() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await;
    h.queue.set_unavailable(true);

    let order = h.checkout.create_order(guest_request("g@example.com", vec![CartLine::for_variant(&widget, 1)])).await.unwrap();
    assert!(h.store.order_by_id(order.id).await.unwrap().is_some());
    assert_eq!(h.stock(&widget).await, 4);
}

#[tokio::test]
async fn test_order_lines_are_frozen_and_costs_hidden() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 5).await.with_original_price(Decimal::from(70_000));
    let widget = h.save_variant(&widget).await;

    let order = h.checkout.create_order(guest_request("g@example.com", vec![CartLine::for_variant(&widget, 1)])).await.unwrap();
    assert!(order.items.iter().all(|l| l.original_price.is_none()));

    let mut edited = widget.clone();
    edited.price = Decimal::from(90_000);
    edited.variant_name = "Widget v2".into();
    h.save_variant(&edited).await;

    let stored = h.store.order_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.items[0].unit_price, Decimal::from(100_000));
    assert_eq!(stored.items[0].product_variant_name, "Widget");
    assert_eq!(stored.items[0].original_price, Some(Decimal::from(70_000)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_sells_once() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 1).await;
    let a = h.customer("a@example.com", 0).await;
    let b = h.customer("b@example.com", 0).await;
    h.fill_cart(&a, &[(&widget, 1)]).await;
    h.fill_cart(&b, &[(&widget, 1)]).await;

    let (ra, rb) = tokio::join!(
        tokio::spawn({ let c = h.checkout.clone(); let r = customer_request(&a); async move { c.create_order(r).await } }),
        tokio::spawn({ let c = h.checkout.clone(); let r = customer_request(&b); async move { c.create_order(r).await } }),
    );
    let results = [ra.unwrap(), rb.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(CheckoutError::InsufficientStock { .. }))));
    assert_eq!(h.stock(&widget).await, 0);
    assert_eq!(h.store.all_orders().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_coupon_use_admits_one() {
    let h = Harness::new();
    let widget = h.variant("Widget", 100_000, 10).await;
    h.coupon("LAST1", 10_000, 1).await;
    let a = h.customer("a@example.com", 0).await;
    let b = h.customer("b@example.com", 0).await;
    h.fill_cart(&a, &[(&widget, 2)]).await;
    h.fill_cart(&b, &[(&widget, 2)]).await;
    let with_coupon = |u: &User| CheckoutRequest { coupon_code: Some("LAST1".into()), ..customer_request(u) };

    let (ra, rb) = tokio::join!(
        tokio::spawn({ let c = h.checkout.clone(); let r = with_coupon(&a); async move { c.create_order(r).await } }),
        tokio::spawn({ let c = h.checkout.clone(); let r = with_coupon(&b); async move { c.create_order(r).await } }),
    );
    let results = [ra.unwrap(), rb.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(CheckoutError::CouponExhausted(_)))));

    let coupon = h.store.coupon_by_code("LAST1").await.unwrap().unwrap();
    assert_eq!((coupon.usage_count, coupon.orders_used.len()), (1, 1));
    // The losing checkout's reservation is returned.
    assert_eq!(h.stock(&widget).await, 8);
}
