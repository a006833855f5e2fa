use chrono::{Duration, Utc};
use teloxide::types::ChatId;

use crate::bot_state::BotState;
use crate::error::BotError;
use crate::handlers::utils::{format_amount, payment_menu, render, start_menu};
use crate::messaging::Messaging;
use crate::models::{user_from_bill_id, BillStatus, PaymentBill, PendingPayment, Stage};
use crate::payment::types::NotifiedBill;

/// Invite links are single use and die after a day.
pub const INVITE_TTL_HOURS: i64 = 24;

/// Outcome of settling a bill that some path reported as paid.
#[derive(Debug, PartialEq, Eq)]
pub enum Settlement {
    Granted,
    AlreadySettled,
}

/// Open a bill for the chosen plan and hand the user the payment page.
pub async fn open_payment(
    m: &impl Messaging,
    state: &BotState,
    user: ChatId,
    plan_name: &str,
) -> Result<(), BotError> {
    let plan = state.config.plan(plan_name)?.clone();
    let bill = PaymentBill::new(user, plan_name, &plan);

    // Only a bill the provider accepted is worth tracking. On failure the
    // user stays on the plan screen and can simply tap again.
    let url = state.provider.open_bill(&bill).await?;

    let pending = PendingPayment {
        bill_id: bill.bill_id.clone(),
        plan_name: plan_name.to_string(),
        plan: plan.clone(),
    };
    state.sessions.register(bill).await;
    state.set_stage(user, Stage::AwaitingPayment(pending)).await;

    let text = render(
        &state.config.texts.payment_proceed,
        &[("amount", &format_amount(plan.amount)), ("url", &url)],
    );
    m.send_menu(user, &text, payment_menu(&state.config, false)).await?;
    Ok(())
}

/// User asked whether their open bill got paid.
pub async fn check_payment(
    m: &impl Messaging,
    state: &BotState,
    user: ChatId,
    pending: &PendingPayment,
) -> Result<(), BotError> {
    let texts = &state.config.texts;

    if state.sessions.is_settled(&pending.bill_id).await {
        // The push notification got here first.
        state.reset(user).await;
        m.send_menu(user, &texts.payment_already, start_menu(&state.config)).await?;
        return Ok(());
    }

    match state.provider.bill_status(&pending.bill_id).await? {
        BillStatus::Paid => {
            let bill = match state.sessions.take(&pending.bill_id).await {
                Some(bill) => bill,
                // Restarted since the bill was opened. The dialogue snapshot
                // still identifies the purchase.
                None => PaymentBill::rebuilt(
                    &pending.bill_id,
                    user,
                    &pending.plan_name,
                    &pending.plan,
                ),
            };
            match settle_paid_bill(m, state, bill).await {
                Ok(Settlement::Granted) => {}
                Ok(Settlement::AlreadySettled) => {
                    state.reset(user).await;
                    m.send_menu(user, &texts.payment_already, start_menu(&state.config))
                        .await?;
                }
                Err(e) => {
                    // The money is with the provider but the purchase is not
                    // recorded yet. Keep the dialogue open so another check
                    // can finish the job.
                    log::error!("Could not settle bill {} for {}: {}", pending.bill_id, user, e);
                    m.send_menu(user, &texts.payment_uncertain, payment_menu(&state.config, true))
                        .await?;
                }
            }
        }
        BillStatus::Pending | BillStatus::Waiting => {
            m.send_menu(user, &texts.payment_notyet, payment_menu(&state.config, true))
                .await?;
        }
        BillStatus::Expired => {
            state.sessions.take(&pending.bill_id).await;
            state.reset(user).await;
            m.send_menu(user, &texts.payment_expired, start_menu(&state.config)).await?;
        }
        BillStatus::Canceled => {
            state.sessions.take(&pending.bill_id).await;
            state.reset(user).await;
            m.send_menu(user, &texts.payment_canceled, start_menu(&state.config)).await?;
        }
    }
    Ok(())
}

/// User gave up on an open bill.
pub async fn cancel_payment(
    m: &impl Messaging,
    state: &BotState,
    user: ChatId,
    pending: &PendingPayment,
) -> Result<(), BotError> {
    let texts = &state.config.texts;

    let bill = state.sessions.take(&pending.bill_id).await;
    if bill.is_none() && state.sessions.is_settled(&pending.bill_id).await {
        // Paid under our feet; a cancel now would be a lie.
        state.reset(user).await;
        m.send_menu(user, &texts.payment_already, start_menu(&state.config)).await?;
        return Ok(());
    }

    // The session is only dropped once the provider voided the bill.
    if let Err(e) = state.provider.reject_bill(&pending.bill_id).await {
        if let Some(bill) = bill {
            state.sessions.restore(bill).await;
        }
        return Err(e);
    }

    state.reset(user).await;
    m.send_menu(user, &texts.payment_canceled, start_menu(&state.config)).await?;
    Ok(())
}

/// Settle a bill the provider push reported. Only PAID is acted on; any
/// other status will be dealt with when the user checks or the bill ages
/// out.
pub async fn handle_push(
    m: &impl Messaging,
    state: &BotState,
    pushed: NotifiedBill,
) -> Result<(), BotError> {
    if BillStatus::from_provider(&pushed.status.value) != BillStatus::Paid {
        log::debug!(
            "Bill {} pushed as {}, nothing to settle",
            pushed.bill_id,
            pushed.status.value
        );
        return Ok(());
    }

    let bill = match state.sessions.take(&pushed.bill_id).await {
        Some(bill) => bill,
        None if state.sessions.is_settled(&pushed.bill_id).await => return Ok(()),
        None => {
            // Not in the registry, so the bot restarted since the bill was
            // opened. Its id and comment identify the purchase.
            let user = user_from_bill_id(&pushed.bill_id)?;
            let plan = state.config.plan(&pushed.comment)?;
            PaymentBill::rebuilt(&pushed.bill_id, user, &pushed.comment, plan)
        }
    };

    settle_paid_bill(m, state, bill).await?;
    Ok(())
}

/// The one place a paid bill turns into channel access. Claims the bill,
/// writes the purchase, and only then talks to the user.
pub async fn settle_paid_bill(
    m: &impl Messaging,
    state: &BotState,
    bill: PaymentBill,
) -> Result<Settlement, BotError> {
    if !state.sessions.try_claim(&bill.bill_id).await {
        return Ok(Settlement::AlreadySettled);
    }

    let user = bill.user_id;
    if let Err(e) = state
        .store
        .apply(user, bill.plan.days, bill.plan.unlimited(), bill.plan.amount)
        .await
    {
        // Nothing recorded: release the claim so the payment can be settled
        // on a later check or push retry.
        state.sessions.unclaim(&bill.bill_id).await;
        state.sessions.restore(bill).await;
        return Err(e);
    }

    state.reset(user).await;
    log::info!(
        "✅ User {} bought {:?} for {}",
        user,
        bill.plan_name,
        format_amount(bill.plan.amount)
    );

    // Access is recorded at this point. Anything failing below is a
    // delivery problem, not a lost payment.
    if let Err(e) = deliver_invite(m, state, user).await {
        log::error!("Could not deliver the invite to user {}: {}", user, e);
    }

    Ok(Settlement::Granted)
}

async fn deliver_invite(
    m: &impl Messaging,
    state: &BotState,
    user: ChatId,
) -> Result<(), BotError> {
    let expires = Utc::now() + Duration::hours(INVITE_TTL_HOURS);
    let url = m.invite_link(state.config.channel(), expires).await?;

    let text = render(&state.config.texts.payment_success, &[("url", &url)]);
    m.send_menu(user, &text, start_menu(&state.config)).await?;
    Ok(())
}
