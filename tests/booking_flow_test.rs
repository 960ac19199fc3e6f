mod common;

use chrono::Utc;
use common::*;
use staybook::{
    domain::{
        BookingPaymentStatus, BookingStatus, MilestoneStatus, MilestoneType, NewBooking,
        PaymentMethod, PaymentOption, PaymentStatus,
    },
    error::AppError,
    service::{CallbackOutcome, PayRequest, PayResponse, SubmitBookingRequest, VerifyOutcome},
};
use uuid::Uuid;

#[tokio::test]
async fn test_day_rate_booking_schedule() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;
    let start = date(2030, 6, 1);

    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, start, date(2030, 6, 4)),
            contact(),
            card(PaymentOption::BookingOnly),
        )
        .await?;

    assert_eq!(submitted.redirect, format!("/bookings/{}/verify-pending", submitted.booking_id));
    assert_eq!(submitted.amount_due_now_cents, 5_000);

    let booking = app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);
    assert_eq!(booking.room_subtotal_cents, 7_500);
    assert_eq!(booking.deposit_cents, 5_000);
    assert_eq!(booking.grand_total_cents, 7_500);
    assert_eq!(booking.contact_email, "ada@example.com");
    assert_eq!(booking.price_breakdown.len(), 1);
    assert_eq!(booking.price_breakdown[0].quantity, 3);
    assert_eq!(booking.price_breakdown[0].line_total_cents, 7_500);
    assert!(!booking.email_verified);

    let milestones = app.ctx.booking_repo.find_milestones(booking.id).await?;
    assert_eq!(milestones.len(), 2);
    assert_eq!(milestones[0].milestone_number, 0);
    assert_eq!(milestones[0].milestone_type, MilestoneType::BookingFee);
    assert_eq!(milestones[0].amount_cents, 5_000);
    assert_eq!(milestones[0].due_date, Utc::now().date_naive());
    assert_eq!(milestones[1].milestone_number, 1);
    assert_eq!(milestones[1].milestone_type, MilestoneType::Day);
    assert_eq!(milestones[1].amount_cents, 7_500);
    assert_eq!(milestones[1].due_date, start);
    assert!(milestones.iter().all(|m| m.status == MilestoneStatus::Pending && m.payment_method.is_none()));

    // One verification email to the contact address
    assert_eq!(app.notifier.count(), 1);
    let sent = app.notifier.last();
    assert_eq!(sent.booking_id, booking.id);
    assert_eq!(sent.to_email, "ada@example.com");
    assert!(sent.verify_url.contains(&sent.token));

    Ok(())
}

#[tokio::test]
async fn test_monthly_booking_breakdown_and_due_dates() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;

    // 45 nights from 10 January
    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.month_room, date(2025, 1, 10), date(2025, 2, 24)),
            contact(),
            card(PaymentOption::Full),
        )
        .await?;

    let booking = app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.unwrap();
    let labels: Vec<&str> = booking.price_breakdown.iter().map(|l| l.description.as_str()).collect();
    assert_eq!(labels, vec!["January 2025", "February 2025"]);
    assert_eq!(booking.room_subtotal_cents, 80_000);
    assert_eq!(booking.deposit_cents, 10_000);
    assert_eq!(booking.amount_due_now_cents, 80_000);
    assert_eq!(booking.milestone_count, 2);

    let milestones = app.ctx.booking_repo.find_milestones(booking.id).await?;
    let due: Vec<_> = milestones.iter().skip(1).map(|m| m.due_date).collect();
    assert_eq!(due, vec![date(2025, 1, 10), date(2025, 2, 10)]);

    // Deposit is charged on top of the stay price
    let total: i64 = milestones.iter().map(|m| m.amount_cents).sum();
    assert_eq!(total, booking.deposit_cents + booking.room_subtotal_cents);

    Ok(())
}

#[tokio::test]
async fn test_bank_transfer_without_reference_writes_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;

    let result = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            bank_transfer("   "),
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(app.count("bookings").await?, 0);
    assert_eq!(app.count("milestones").await?, 0);
    assert_eq!(app.count("payments").await?, 0);
    assert_eq!(app.notifier.count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_unverified_account_cannot_book() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.create_user("new@example.com", false, false).await?;
    let catalog = app.seed_catalog().await?;

    let result = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::Full),
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden)));
    assert_eq!(app.count("bookings").await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_selection_rules() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;
    let booking_service = &app.ctx.booking_service;

    // Dates out of order
    let result = booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 4), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::Full),
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // Room from another package
    let result = booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.other_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::Full),
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // Unknown package
    let mut unknown = selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4));
    unknown.package_id = Uuid::new_v4();
    let result = booking_service.submit_booking(&user, &unknown, contact(), card(PaymentOption::Full)).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    // Unknown add-on
    let mut bad_addon = selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4));
    bad_addon.amenity_ids = vec![Uuid::new_v4()];
    let result = booking_service.submit_booking(&user, &bad_addon, contact(), card(PaymentOption::Full)).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    assert_eq!(app.count("bookings").await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_addons_are_snapshotted_and_totalled() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;

    let mut request = selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4));
    // Duplicates are ignored
    request.amenity_ids = vec![catalog.amenity.id, catalog.amenity.id];
    request.maintenance_ids = vec![catalog.maintenance.id];

    let submitted = app.ctx.booking_service
        .submit_booking(&user, &request, contact(), card(PaymentOption::Full))
        .await?;

    let detail = app.ctx.booking_service.get_detail(submitted.booking_id, &user).await?;
    assert_eq!(detail.booking.addon_subtotal_cents, 3_500);
    assert_eq!(detail.booking.grand_total_cents, 7_500 + 3_500);
    assert_eq!(detail.booking.amount_due_now_cents, 11_000);
    assert_eq!(detail.addons.len(), 2);

    // Milestones cover the deposit and the stay only
    let total: i64 = detail.milestones.iter().map(|m| m.amount_cents).sum();
    assert_eq!(total, 5_000 + 7_500);

    Ok(())
}

#[tokio::test]
async fn test_failed_creation_leaves_no_rows() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;

    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.month_room, date(2025, 1, 10), date(2025, 2, 24)),
            contact(),
            card(PaymentOption::Full),
        )
        .await?;

    let repo = &app.ctx.booking_repo;
    let mut booking = repo.find_by_id(submitted.booking_id).await?.unwrap();
    let mut milestones = repo.find_milestones(booking.id).await?;
    let addons = repo.find_addons(booking.id).await?;

    // Re-key everything, then collide two milestone numbers so the
    // transaction fails after the booking row and first milestones are written.
    let new_id = Uuid::new_v4();
    booking.id = new_id;
    for m in milestones.iter_mut() {
        m.id = Uuid::new_v4();
        m.booking_id = new_id;
    }
    milestones[2].milestone_number = 1;

    let result = repo
        .create(NewBooking { booking, addons, milestones, offline_payment: None })
        .await;
    assert!(result.is_err());

    assert!(repo.find_by_id(new_id).await?.is_none());
    assert!(repo.find_milestones(new_id).await?.is_empty());
    assert_eq!(app.count("bookings").await?, 1);
    assert_eq!(app.count("milestones").await?, 3);

    Ok(())
}

#[tokio::test]
async fn test_verification_is_idempotent() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;

    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::BookingOnly),
        )
        .await?;
    let token = app.notifier.last_token();
    let verification = &app.ctx.verification_service;

    let first = verification.verify(submitted.booking_id, &token, &user).await?;
    assert_eq!(first.outcome, VerifyOutcome::Verified);
    assert_eq!(first.redirect, format!("/bookings/{}/pay", submitted.booking_id));

    let after_first = app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.unwrap();
    assert!(after_first.email_verified);
    assert!(after_first.verified_at.is_some());
    assert!(after_first.verification_token_hash.is_none());

    let second = verification.verify(submitted.booking_id, &token, &user).await?;
    assert_eq!(second.outcome, VerifyOutcome::AlreadyVerified);
    assert_eq!(second.redirect, first.redirect);
    assert_eq!(app.notifier.count(), 1);

    // The repeat leaves the row exactly as the first verification wrote it
    let after_second = app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.unwrap();
    let state = |b: &staybook::domain::Booking| {
        (b.status, b.payment_status, b.email_verified, b.verified_at, b.updated_at, b.verification_token_hash.clone())
    };
    assert_eq!(state(&after_second), state(&after_first));

    // Resending is refused once verified
    let resend = verification.resend_verification(submitted.booking_id, &user).await;
    assert!(matches!(resend, Err(AppError::AlreadyVerified)));

    Ok(())
}

#[tokio::test]
async fn test_wrong_token_changes_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let stranger = app.create_user("stranger@example.com", true, false).await?;
    let catalog = app.seed_catalog().await?;

    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::Full),
        )
        .await?;
    let before = app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.unwrap();
    let verification = &app.ctx.verification_service;

    let result = verification.verify(submitted.booking_id, "not-the-token", &user).await;
    assert!(matches!(result, Err(AppError::InvalidToken)));

    let after = app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.unwrap();
    assert!(!after.email_verified);
    assert_eq!(after.verification_token_hash, before.verification_token_hash);

    // Right token, wrong account
    let token = app.notifier.last_token();
    let result = verification.verify(submitted.booking_id, &token, &stranger).await;
    assert!(matches!(result, Err(AppError::Forbidden)));

    let result = verification.verify(Uuid::new_v4(), &token, &user).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_notification_failure_keeps_booking_and_resend_rotates_token() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;

    app.notifier.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::Full),
        )
        .await?;
    assert!(app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.is_some());
    assert_eq!(app.notifier.count(), 0);

    let verification = &app.ctx.verification_service;
    let result = verification.resend_verification(submitted.booking_id, &user).await;
    assert!(matches!(result, Err(AppError::Notification(_))));

    app.notifier.fail.store(false, std::sync::atomic::Ordering::SeqCst);
    verification.resend_verification(submitted.booking_id, &user).await?;
    let first_token = app.notifier.last_token();

    verification.resend_verification(submitted.booking_id, &user).await?;
    let second_token = app.notifier.last_token();
    assert_ne!(first_token, second_token);

    let stale = verification.verify(submitted.booking_id, &first_token, &user).await;
    assert!(matches!(stale, Err(AppError::InvalidToken)));

    let verified = verification.verify(submitted.booking_id, &second_token, &user).await?;
    assert_eq!(verified.outcome, VerifyOutcome::Verified);

    Ok(())
}

#[tokio::test]
async fn test_bank_transfer_awaits_admin_confirmation() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;

    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            bank_transfer(" BT-2030-001 "),
        )
        .await?;

    let payments = app.ctx.payment_repo.find_by_booking(submitted.booking_id).await?;
    assert_eq!(payments.len(), 1);
    let transfer = &payments[0];
    assert_eq!(transfer.method, PaymentMethod::BankTransfer);
    assert_eq!(transfer.status, PaymentStatus::Pending);
    assert_eq!(transfer.reference.as_deref(), Some("BT-2030-001"));
    assert_eq!(transfer.amount_cents, 5_000);
    assert_eq!(transfer.currency, "gbp");

    let milestones = app.ctx.booking_repo.find_milestones(submitted.booking_id).await?;
    assert!(milestones.iter().all(|m| {
        m.payment_method == Some(PaymentMethod::BankTransfer) && m.status == MilestoneStatus::Pending
    }));

    let token = app.notifier.last_token();
    let verified = app.ctx.verification_service.verify(submitted.booking_id, &token, &user).await?;
    assert_eq!(verified.outcome, VerifyOutcome::AwaitingApproval);
    assert_eq!(verified.redirect, format!("/bookings/{}/pending", submitted.booking_id));

    let booking = app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);

    let confirmed = app.ctx.payment_service
        .confirm_offline_payment(transfer.id, Some("Funds received".to_string()))
        .await?;
    assert_eq!(confirmed.status, PaymentStatus::Completed);
    assert_eq!(confirmed.admin_notes.as_deref(), Some("Funds received"));

    let booking = app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.unwrap();
    assert_eq!(booking.payment_status, BookingPaymentStatus::Paid);
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let milestones = app.ctx.booking_repo.find_milestones(submitted.booking_id).await?;
    assert_eq!(milestones[0].status, MilestoneStatus::Paid);
    assert_eq!(milestones[0].transaction_reference.as_deref(), Some("BT-2030-001"));
    assert!(milestones[0].paid_at.is_some());
    assert_eq!(milestones[1].status, MilestoneStatus::Pending);

    let again = app.ctx.payment_service.confirm_offline_payment(transfer.id, None).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_card_payment_round_trip() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;
    let payments = &app.ctx.payment_service;

    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::BookingOnly),
        )
        .await?;
    let booking_id = submitted.booking_id;

    // Payment needs a verified booking email
    let early = payments.pay(booking_id, &user, PayRequest::Card).await;
    assert!(matches!(early, Err(AppError::Validation(_))));
    assert_eq!(app.gateway.session_count(), 0);

    let token = app.notifier.last_token();
    app.ctx.verification_service.verify(booking_id, &token, &user).await?;

    let response = payments.pay(booking_id, &user, PayRequest::Card).await?;
    let (first_session, request) = app.gateway.last_session();
    assert!(matches!(response, PayResponse::Card { ref checkout_url } if checkout_url.ends_with(&first_session)));
    assert_eq!(request.unit_amount_cents, 5_000);
    assert_eq!(request.currency, "gbp");
    let attempt = app.ctx.payment_repo.find_by_transaction_id(&first_session).await?.unwrap();
    assert_eq!(attempt.currency, request.currency);
    assert_eq!(request.client_reference_id, booking_id.to_string());
    assert_eq!(request.metadata.get("payment_option").map(String::as_str), Some("booking_only"));
    assert!(request.product_name.starts_with("Booking fee - Harbour House"));
    assert!(request.success_url.contains(&format!("/api/payments/{}/success", booking_id)));

    // Retrying supersedes the earlier attempt
    payments.pay(booking_id, &user, PayRequest::Card).await?;
    let (second_session, _) = app.gateway.last_session();
    let first = app.ctx.payment_repo.find_by_transaction_id(&first_session).await?.unwrap();
    let second = app.ctx.payment_repo.find_by_transaction_id(&second_session).await?.unwrap();
    assert_eq!(first.status, PaymentStatus::Cancelled);
    assert_eq!(second.status, PaymentStatus::Pending);

    // The gateway has not seen the money yet
    let unpaid = payments.handle_success(booking_id, &second_session, &user).await;
    assert!(matches!(unpaid, Err(AppError::PaymentGateway(_))));

    app.gateway.mark_paid(&second_session);
    let result = payments.handle_success(booking_id, &second_session, &user).await?;
    assert_eq!(result.outcome, CallbackOutcome::Settled);

    let booking = app.ctx.booking_repo.find_by_id(booking_id).await?.unwrap();
    assert_eq!(booking.payment_status, BookingPaymentStatus::Paid);
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let milestones = app.ctx.booking_repo.find_milestones(booking_id).await?;
    assert_eq!(milestones[0].status, MilestoneStatus::Paid);
    assert_eq!(milestones[0].payment_method, Some(PaymentMethod::Card));
    assert_eq!(milestones[0].transaction_reference.as_deref(), Some(second_session.as_str()));
    assert_eq!(milestones[1].status, MilestoneStatus::Pending);

    let attempt = app.ctx.payment_repo.find_by_transaction_id(&second_session).await?.unwrap();
    assert_eq!(attempt.status, PaymentStatus::Completed);

    // Replayed return leg is a no-op
    let replay = payments.handle_success(booking_id, &second_session, &user).await?;
    assert_eq!(replay.outcome, CallbackOutcome::AlreadyPaid);

    let paid_again = payments.pay(booking_id, &user, PayRequest::Card).await;
    assert!(matches!(paid_again, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_gateway_failure_records_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;

    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::Full),
        )
        .await?;
    let token = app.notifier.last_token();
    app.ctx.verification_service.verify(submitted.booking_id, &token, &user).await?;

    app.gateway.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    let result = app.ctx.payment_service.pay(submitted.booking_id, &user, PayRequest::Card).await;
    assert!(matches!(result, Err(AppError::PaymentGateway(_))));
    assert_eq!(app.count("payments").await?, 0);

    // The booking survives and payment can be retried
    app.gateway.fail.store(false, std::sync::atomic::Ordering::SeqCst);
    app.ctx.payment_service.pay(submitted.booking_id, &user, PayRequest::Card).await?;
    assert_eq!(app.count("payments").await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_success_requires_matching_session_and_owner() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let stranger = app.create_user("stranger@example.com", true, false).await?;
    let catalog = app.seed_catalog().await?;

    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::Full),
        )
        .await?;

    app.gateway.mark_paid("cs_forged");
    let forged = app.ctx.payment_service.handle_success(submitted.booking_id, "cs_forged", &user).await;
    assert!(matches!(forged, Err(AppError::NotFound(_))));

    let foreign = app.ctx.payment_service.handle_success(submitted.booking_id, "cs_forged", &stranger).await;
    assert!(matches!(foreign, Err(AppError::Forbidden)));

    let booking = app.ctx.booking_repo.find_by_id(submitted.booking_id).await?.unwrap();
    assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_cancel_only_touches_unpaid_bookings() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;
    let request = selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4));

    let unpaid = app.ctx.booking_service
        .submit_booking(&user, &request, contact(), bank_transfer("REF-1"))
        .await?;

    let result = app.ctx.payment_service.handle_cancel(unpaid.booking_id, &user).await?;
    assert_eq!(result.outcome, CallbackOutcome::Cancelled);

    let booking = app.ctx.booking_repo.find_by_id(unpaid.booking_id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    let payments = app.ctx.payment_repo.find_by_booking(unpaid.booking_id).await?;
    assert_eq!(payments[0].status, PaymentStatus::Pending);

    // Closed bookings accept no further payments
    let token = app.notifier.last_token();
    app.ctx.verification_service.verify(unpaid.booking_id, &token, &user).await?;
    let result = app.ctx.payment_service.pay(unpaid.booking_id, &user, PayRequest::Card).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // A paid booking is left alone
    let paid = app.ctx.booking_service
        .submit_booking(&user, &request, contact(), bank_transfer("REF-2"))
        .await?;
    let transfer = app.ctx.payment_repo.find_by_booking(paid.booking_id).await?.remove(0);
    app.ctx.payment_service.confirm_offline_payment(transfer.id, None).await?;

    let result = app.ctx.payment_service.handle_cancel(paid.booking_id, &user).await?;
    assert_eq!(result.outcome, CallbackOutcome::Unchanged);
    let booking = app.ctx.booking_repo.find_by_id(paid.booking_id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    Ok(())
}

#[tokio::test]
async fn test_webhook_events() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;
    let request = selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4));
    let payments = &app.ctx.payment_service;

    let mut sessions = Vec::new();
    for _ in 0..2 {
        let submitted = app.ctx.booking_service
            .submit_booking(&user, &request, contact(), card(PaymentOption::Full))
            .await?;
        let token = app.notifier.last_token();
        app.ctx.verification_service.verify(submitted.booking_id, &token, &user).await?;
        payments.pay(submitted.booking_id, &user, PayRequest::Card).await?;
        sessions.push((submitted.booking_id, app.gateway.last_session().0));
    }

    let bad = payments.handle_webhook(r#"{"type":"completed"}"#, "t=1,v1=forged").await;
    assert!(matches!(bad, Err(AppError::Validation(_))));

    let (paid_booking, paid_session) = &sessions[0];

    // Completed with a delayed payment method that has not cleared yet
    let pending_payload = format!(
        r#"{{"type":"completed","session_id":"{}","booking_id":"{}","payment_status":"unpaid"}}"#,
        paid_session, paid_booking
    );
    payments.handle_webhook(&pending_payload, VALID_SIGNATURE).await?;

    let booking = app.ctx.booking_repo.find_by_id(*paid_booking).await?.unwrap();
    assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);
    assert_eq!(booking.status, BookingStatus::Pending);
    let attempt = app.ctx.payment_repo.find_by_transaction_id(paid_session).await?.unwrap();
    assert_eq!(attempt.status, PaymentStatus::Pending);
    let milestones = app.ctx.booking_repo.find_milestones(*paid_booking).await?;
    assert_eq!(milestones[0].status, MilestoneStatus::Pending);

    let payload = format!(
        r#"{{"type":"completed","session_id":"{}","booking_id":"{}"}}"#,
        paid_session, paid_booking
    );
    payments.handle_webhook(&payload, VALID_SIGNATURE).await?;
    // Delivered twice
    payments.handle_webhook(&payload, VALID_SIGNATURE).await?;

    let booking = app.ctx.booking_repo.find_by_id(*paid_booking).await?.unwrap();
    assert_eq!(booking.payment_status, BookingPaymentStatus::Paid);

    let (expired_booking, expired_session) = &sessions[1];
    let payload = format!(r#"{{"type":"expired","session_id":"{}"}}"#, expired_session);
    payments.handle_webhook(&payload, VALID_SIGNATURE).await?;

    let attempt = app.ctx.payment_repo.find_by_transaction_id(expired_session).await?.unwrap();
    assert_eq!(attempt.status, PaymentStatus::Failed);
    let booking = app.ctx.booking_repo.find_by_id(*expired_booking).await?.unwrap();
    assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);

    // A declined delayed payment fails the attempt without touching the booking
    payments.pay(*expired_booking, &user, PayRequest::Card).await?;
    let (retry_session, _) = app.gateway.last_session();
    let payload = format!(r#"{{"type":"failed","session_id":"{}"}}"#, retry_session);
    payments.handle_webhook(&payload, VALID_SIGNATURE).await?;

    let attempt = app.ctx.payment_repo.find_by_transaction_id(&retry_session).await?.unwrap();
    assert_eq!(attempt.status, PaymentStatus::Failed);
    let booking = app.ctx.booking_repo.find_by_id(*expired_booking).await?.unwrap();
    assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);

    // Unknown sessions and event types are ignored
    payments.handle_webhook(r#"{"type":"completed","session_id":"cs_unknown"}"#, VALID_SIGNATURE).await?;
    payments.handle_webhook(r#"{"type":"invoice.paid"}"#, VALID_SIGNATURE).await?;

    Ok(())
}

#[tokio::test]
async fn test_admin_status_transitions() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;
    let bookings = &app.ctx.booking_service;

    let submitted = bookings
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            card(PaymentOption::Full),
        )
        .await?;

    let approved = bookings.set_booking_status(submitted.booking_id, BookingStatus::Approved).await?;
    assert_eq!(approved.status, BookingStatus::Approved);
    assert_eq!(approved.payment_status, BookingPaymentStatus::Pending);

    let invalid = bookings.set_booking_status(submitted.booking_id, BookingStatus::Confirmed).await;
    assert!(matches!(invalid, Err(AppError::Validation(_))));

    let missing = bookings.set_booking_status(Uuid::new_v4(), BookingStatus::Rejected).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let listed = bookings.list_bookings(10, 0).await?;
    assert_eq!(listed.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_checkout_consumes_saved_selection() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let stranger = app.create_user("stranger@example.com", true, false).await?;
    let catalog = app.seed_catalog().await?;
    let checkout = &app.ctx.checkout_service;

    let mut request = selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4));
    request.maintenance_ids = vec![catalog.maintenance.id];

    let saved = checkout.save_selection(&user, request).await?;
    assert_eq!(saved.quote.room_subtotal_cents, 7_500);
    assert_eq!(saved.quote.addon_subtotal_cents, 2_000);
    assert_eq!(saved.quote.grand_total_cents, 9_500);
    assert_eq!(saved.quote.milestones.len(), 2);

    let foreign = checkout.get_selection(&stranger, saved.selection.id).await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));

    let submitted = app.ctx.booking_service
        .checkout(&user, SubmitBookingRequest {
            selection_id: saved.selection.id,
            contact: contact(),
            payment: card(PaymentOption::Full),
        })
        .await?;
    assert_eq!(submitted.amount_due_now_cents, 9_500);

    let gone = checkout.get_selection(&user, saved.selection.id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));
    assert_eq!(app.count("checkout_selections").await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_new_attempt_supersedes_every_pending_attempt() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;
    let payments = &app.ctx.payment_service;

    let submitted = app.ctx.booking_service
        .submit_booking(
            &user,
            &selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4)),
            contact(),
            bank_transfer("BT-1"),
        )
        .await?;
    let booking_id = submitted.booking_id;
    let token = app.notifier.last_token();
    app.ctx.verification_service.verify(booking_id, &token, &user).await?;

    let pending = |rows: &[staybook::domain::GatewayPayment]| {
        rows.iter()
            .filter(|p| p.status == PaymentStatus::Pending)
            .map(|p| (p.method, p.reference.clone()))
            .collect::<Vec<_>>()
    };

    // A second transfer replaces the one recorded at checkout
    let response = payments
        .pay(booking_id, &user, PayRequest::BankTransfer { reference: "BT-2".to_string() })
        .await?;
    assert!(matches!(response, PayResponse::BankTransfer { .. }));
    let rows = app.ctx.payment_repo.find_by_booking(booking_id).await?;
    assert_eq!(pending(&rows), vec![(PaymentMethod::BankTransfer, Some("BT-2".to_string()))]);

    // Switching to card cancels the outstanding transfer
    payments.pay(booking_id, &user, PayRequest::Card).await?;
    let rows = app.ctx.payment_repo.find_by_booking(booking_id).await?;
    assert_eq!(pending(&rows), vec![(PaymentMethod::Card, None)]);
    assert_eq!(rows.iter().filter(|p| p.status == PaymentStatus::Cancelled).count(), 2);

    let milestones = app.ctx.booking_repo.find_milestones(booking_id).await?;
    assert!(milestones.iter().all(|m| m.payment_method.is_none()));

    // And a transfer after that cancels the card session
    payments
        .pay(booking_id, &user, PayRequest::BankTransfer { reference: "BT-3".to_string() })
        .await?;
    let rows = app.ctx.payment_repo.find_by_booking(booking_id).await?;
    assert_eq!(pending(&rows), vec![(PaymentMethod::BankTransfer, Some("BT-3".to_string()))]);

    // A superseded transfer can no longer be confirmed
    let stale = rows
        .iter()
        .find(|p| p.reference.as_deref() == Some("BT-1"))
        .map(|p| p.id)
        .unwrap();
    let result = payments.confirm_offline_payment(stale, None).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_closed_booking_cannot_be_settled() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = app.guest().await?;
    let catalog = app.seed_catalog().await?;
    let request = selection(&catalog.package, &catalog.day_room, date(2030, 6, 1), date(2030, 6, 4));

    let rejected = app.ctx.booking_service
        .submit_booking(&user, &request, contact(), bank_transfer("REF-R"))
        .await?;
    app.ctx.booking_service.set_booking_status(rejected.booking_id, BookingStatus::Rejected).await?;
    let transfer = app.ctx.payment_repo.find_by_booking(rejected.booking_id).await?.remove(0);

    let result = app.ctx.payment_service.confirm_offline_payment(transfer.id, None).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let booking = app.ctx.booking_repo.find_by_id(rejected.booking_id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Rejected);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);
    let transfer = app.ctx.payment_repo.find_by_id(transfer.id).await?.unwrap();
    assert_eq!(transfer.status, PaymentStatus::Pending);

    // A card session completed after the guest cancelled does not reopen the booking
    let cancelled = app.ctx.booking_service
        .submit_booking(&user, &request, contact(), card(PaymentOption::Full))
        .await?;
    let token = app.notifier.last_token();
    app.ctx.verification_service.verify(cancelled.booking_id, &token, &user).await?;
    app.ctx.payment_service.pay(cancelled.booking_id, &user, PayRequest::Card).await?;
    let (session_id, _) = app.gateway.last_session();
    app.ctx.payment_service.handle_cancel(cancelled.booking_id, &user).await?;

    let payload = format!(r#"{{"type":"completed","session_id":"{}"}}"#, session_id);
    app.ctx.payment_service.handle_webhook(&payload, VALID_SIGNATURE).await?;

    let booking = app.ctx.booking_repo.find_by_id(cancelled.booking_id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);

    app.gateway.mark_paid(&session_id);
    let result = app.ctx.payment_service.handle_success(cancelled.booking_id, &session_id, &user).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    Ok(())
}
