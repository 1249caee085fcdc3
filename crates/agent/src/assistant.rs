use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use marketbot_channel::blocks::{self, text_message, MessageTemplate};
use marketbot_channel::commands::{BotAction, BotCommand};
use marketbot_channel::events::{
    ActionEvent, ActionService, CommandEvent, CommandService, EventContext, EventHandlerError,
    MessageEvent, MessageService,
};
use marketbot_channel::outbound::{notify_best_effort, Channel};
use marketbot_core::flows::{
    fields, order_draft, rating_draft, vendor_draft, FlowEngine, FlowTransitionError, NextStep,
    SKIP_TOKEN,
};
use marketbot_core::{
    classify, ActiveFlow, ApplicationError, ConversationState, DomainError, Entity, FlowKind,
    FlowStep, Intent, Order, OrderId, OrderStatus, Sender, SessionStore, StepInput, Vendor,
    VendorId, VendorMatcher, MAX_LISTED_VENDORS,
};
use marketbot_db::MarketplaceRepository;
use tracing::{debug, error, info, warn};

use crate::followup::{OrderFollowUp, Scheduler};
use crate::replies;

pub const DEFAULT_FOLLOWUP_DELAY: Duration = Duration::from_secs(24 * 60 * 60);
pub const ORDER_HISTORY_LIMIT: u32 = 15;
pub const RECENT_REVIEWS_LIMIT: u32 = 5;

/// Owns every user's conversation and answers each inbound event with one reply.
pub struct Assistant {
    repository: Arc<dyn MarketplaceRepository>,
    channel: Arc<dyn Channel>,
    scheduler: Arc<dyn Scheduler>,
    sessions: SessionStore,
    matcher: VendorMatcher,
    followup: Arc<OrderFollowUp>,
    followup_delay: Duration,
}

impl Assistant {
    pub fn new(
        repository: Arc<dyn MarketplaceRepository>,
        channel: Arc<dyn Channel>,
        scheduler: Arc<dyn Scheduler>,
        sessions: SessionStore,
    ) -> Self {
        let followup = Arc::new(OrderFollowUp::new(repository.clone(), channel.clone()));
        Self {
            repository,
            channel,
            scheduler,
            sessions,
            matcher: VendorMatcher,
            followup,
            followup_delay: DEFAULT_FOLLOWUP_DELAY,
        }
    }

    pub fn with_followup_delay(mut self, delay: Duration) -> Self {
        self.followup_delay = delay;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Free text: the active step takes it first, otherwise it is classified.
    pub async fn reply_to_text(
        &self,
        sender: &Sender,
        text: &str,
        ctx: &EventContext,
    ) -> MessageTemplate {
        let mut session = self.sessions.lock(sender.id).await;
        if let Some(flow) = session.flow.clone() {
            let input = StepInput::text(text);
            return self.advance_flow(&mut session, sender, flow, input, ctx).await;
        }

        let classification = classify(text);
        debug!(
            event_name = "conversation.intent.classified",
            correlation_id = %ctx.correlation_id,
            user_id = sender.id.0,
            intent = classification.intent.as_str(),
            rule = ?classification.rule,
            "classified free text"
        );

        match classification.intent {
            Intent::Greeting => replies::greeting_reply(),
            Intent::Thanks => replies::thanks_reply(),
            Intent::Help => blocks::help_message(),
            Intent::Register => self.begin_registration(&mut session, sender, ctx).await,
            Intent::Search => self.search(sender, text, ctx).await,
            Intent::Unknown => blocks::clarify_message(),
        }
    }

    pub async fn reply_to_command(
        &self,
        sender: &Sender,
        command: BotCommand,
        text: &str,
        ctx: &EventContext,
    ) -> MessageTemplate {
        let mut session = self.sessions.lock(sender.id).await;

        if let Some(flow) = session.flow.clone() {
            match &command {
                BotCommand::Cancel => {
                    session.clear();
                    info!(
                        event_name = "conversation.flow.cancelled",
                        correlation_id = %ctx.correlation_id,
                        user_id = sender.id.0,
                        flow = flow.kind.as_str(),
                        "user cancelled flow"
                    );
                    return text_message(
                        "Okay, I've cancelled that.\n\nWhat else can I help you find?",
                    );
                }
                BotCommand::Register => {
                    return text_message(format!(
                        "You're in the middle of {}. Finish that first or send /cancel.",
                        replies::flow_label(flow.kind)
                    ));
                }
                // `/skip@BotName` reaches the step as the bare skip token.
                BotCommand::Skip => {
                    let input = StepInput::text(SKIP_TOKEN);
                    return self.advance_flow(&mut session, sender, flow, input, ctx).await;
                }
                BotCommand::Unrecognized(_) => {
                    let input = StepInput::text(text.trim());
                    return self.advance_flow(&mut session, sender, flow, input, ctx).await;
                }
                // Read-only commands answer without touching the flow.
                _ => {}
            }
        }

        match command {
            BotCommand::Start => blocks::welcome_message(),
            BotCommand::Help => blocks::help_message(),
            BotCommand::Register => self.begin_registration(&mut session, sender, ctx).await,
            BotCommand::Cancel => text_message("Nothing to cancel. What are you looking for?"),
            BotCommand::Skip => {
                text_message("Nothing to skip right now. What are you looking for?")
            }
            BotCommand::OrderHistory => self.order_history(sender, ctx).await,
            BotCommand::MyRating => self.my_rating(sender, ctx).await,
            BotCommand::Unrecognized(_) => blocks::clarify_message(),
        }
    }

    pub async fn reply_to_action(
        &self,
        sender: &Sender,
        action: BotAction,
        ctx: &EventContext,
    ) -> MessageTemplate {
        let mut session = self.sessions.lock(sender.id).await;

        if let Some(flow) = session.flow.clone() {
            let choice = match &action {
                BotAction::Rate(value) => value.clone(),
                other => other.action_id().to_owned(),
            };
            let input = StepInput::choice(choice);
            return self.advance_flow(&mut session, sender, flow, input, ctx).await;
        }

        let result = match action {
            BotAction::ShowVendor(id) => {
                self.require_vendor(id).await.map(|vendor| blocks::vendor_card(&vendor))
            }
            BotAction::PlaceOrder(id) => self.begin_order(&mut session, sender, id, ctx).await,
            BotAction::OrderViaBot(id) => self.require_vendor(id).await.map(|vendor| {
                match vendor.bot_handle.as_deref() {
                    Some(handle) => blocks::bot_order_message(&vendor, handle),
                    None => text_message("Bot not available for this vendor."),
                }
            }),
            BotAction::ShowContact(id) => {
                self.require_vendor(id).await.map(|vendor| blocks::contact_message(&vendor))
            }
            BotAction::SearchAgain => Ok(blocks::search_again_message()),
            BotAction::Rate(_) => Ok(text_message("There's nothing to rate right now.")),
            BotAction::Complete(order_id) => {
                self.confirm_received(&mut session, sender, order_id, ctx).await
            }
            BotAction::Incomplete(order_id) => self.flag_not_received(sender, order_id, ctx).await,
        };

        result.unwrap_or_else(|error| self.failure_reply(&error, sender, None, ctx))
    }

    async fn advance_flow(
        &self,
        session: &mut ConversationState,
        sender: &Sender,
        flow: ActiveFlow,
        input: StepInput,
        ctx: &EventContext,
    ) -> MessageTemplate {
        let outcome = match FlowEngine::new(flow.kind).apply(&flow, &input) {
            Ok(outcome) => outcome,
            Err(FlowTransitionError::Validation { step, source }) => {
                debug!(
                    event_name = "conversation.flow.input_rejected",
                    correlation_id = %ctx.correlation_id,
                    user_id = sender.id.0,
                    flow = flow.kind.as_str(),
                    step = %step,
                    reason = %source,
                    "re-prompting step"
                );
                return replies::reprompt(step, &source, &flow);
            }
            Err(other) => {
                session.clear();
                let error = ApplicationError::from(DomainError::from(other));
                return self.failure_reply(&error, sender, Some(flow.kind), ctx);
            }
        };

        match outcome.next {
            NextStep::Prompt(step) => {
                let prompt = replies::step_prompt(step, &outcome.flow);
                session.begin(outcome.flow);
                prompt
            }
            NextStep::Complete => {
                let reply = self.complete_flow(sender, &outcome.flow, ctx).await;
                session.clear();
                reply
            }
        }
    }

    async fn complete_flow(
        &self,
        sender: &Sender,
        flow: &ActiveFlow,
        ctx: &EventContext,
    ) -> MessageTemplate {
        let result = match flow.kind {
            FlowKind::Registration => self.complete_registration(sender, flow).await,
            FlowKind::OrderPlacement => self.complete_order(sender, flow, ctx).await,
            FlowKind::Rating => self.complete_rating(sender, flow, ctx).await,
        };

        match result {
            Ok(reply) => {
                info!(
                    event_name = "conversation.flow.completed",
                    correlation_id = %ctx.correlation_id,
                    user_id = sender.id.0,
                    flow = flow.kind.as_str(),
                    "flow completed"
                );
                reply
            }
            Err(error) => self.failure_reply(&error, sender, Some(flow.kind), ctx),
        }
    }

    async fn complete_registration(
        &self,
        sender: &Sender,
        flow: &ActiveFlow,
    ) -> Result<MessageTemplate, ApplicationError> {
        let draft = vendor_draft(sender.id, flow).map_err(DomainError::from)?;
        let vendor_id = self.repository.insert_vendor(draft).await?;
        let vendor = self.require_vendor(vendor_id).await?;
        Ok(blocks::registration_complete_message(&vendor))
    }

    /// The vendor is re-read so a vendor removed mid-flow aborts before anything is written.
    async fn complete_order(
        &self,
        sender: &Sender,
        flow: &ActiveFlow,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let draft = order_draft(sender.id, flow).map_err(DomainError::from)?;
        let vendor = self.require_vendor(draft.vendor_id).await?;
        let order_id = self.repository.insert_order(draft.clone()).await?;

        let order = Order {
            id: order_id,
            vendor_id: draft.vendor_id,
            buyer_id: draft.buyer_id,
            details: draft.details,
            deadline: draft.deadline,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        };

        notify_best_effort(
            self.channel.as_ref(),
            vendor.owner,
            &blocks::vendor_new_order_message(&order, sender),
            &ctx.correlation_id,
        )
        .await;

        let task = self.followup.clone().task(order_id, sender.id, ctx.correlation_id.clone());
        self.scheduler.after(self.followup_delay, task);
        info!(
            event_name = "conversation.order.placed",
            correlation_id = %ctx.correlation_id,
            user_id = sender.id.0,
            order_id = order_id.0,
            vendor_id = vendor.id.0,
            followup_delay_secs = self.followup_delay.as_secs(),
            "order placed and follow-up scheduled"
        );

        Ok(blocks::order_confirmation_message(&order, &vendor.business_name))
    }

    /// A failed aggregate refresh does not undo the stored rating.
    async fn complete_rating(
        &self,
        sender: &Sender,
        flow: &ActiveFlow,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let draft = rating_draft(sender.id, flow).map_err(DomainError::from)?;
        let vendor_id = draft.vendor_id;
        self.repository.insert_rating(draft).await?;

        match self.repository.recompute_vendor_aggregate(vendor_id).await {
            Ok(aggregate) => debug!(
                event_name = "conversation.rating.aggregated",
                correlation_id = %ctx.correlation_id,
                user_id = sender.id.0,
                vendor_id = vendor_id.0,
                avg_rating = aggregate.avg_rating,
                total_orders = aggregate.total_orders,
                "vendor aggregate refreshed"
            ),
            Err(error) => warn!(
                event_name = "conversation.rating.aggregate_failed",
                correlation_id = %ctx.correlation_id,
                user_id = sender.id.0,
                vendor_id = vendor_id.0,
                error = %error,
                "rating stored but aggregate is stale"
            ),
        }

        Ok(blocks::rating_thanks_message())
    }

    async fn begin_registration(
        &self,
        session: &mut ConversationState,
        sender: &Sender,
        ctx: &EventContext,
    ) -> MessageTemplate {
        match self.repository.find_vendor_by_owner(sender.id).await {
            Ok(Some(vendor)) => blocks::already_registered_message(&vendor.business_name),
            Ok(None) => {
                let flow = ActiveFlow::new(FlowKind::Registration);
                let prompt = replies::step_prompt(FlowStep::BusinessName, &flow);
                session.begin(flow);
                prompt
            }
            Err(error) => self.failure_reply(&error.into(), sender, None, ctx),
        }
    }

    async fn begin_order(
        &self,
        session: &mut ConversationState,
        sender: &Sender,
        vendor_id: VendorId,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let vendor = self.require_vendor(vendor_id).await?;
        let flow = ActiveFlow::seeded(
            FlowKind::OrderPlacement,
            [(fields::VENDOR_ID, vendor.id.to_string())],
        );
        let prompt = replies::step_prompt(FlowStep::OrderDetails, &flow);
        session.begin(flow);
        debug!(
            event_name = "conversation.flow.started",
            correlation_id = %ctx.correlation_id,
            user_id = sender.id.0,
            flow = FlowKind::OrderPlacement.as_str(),
            vendor_id = vendor.id.0,
            "order placement started"
        );
        Ok(prompt)
    }

    async fn search(&self, sender: &Sender, text: &str, ctx: &EventContext) -> MessageTemplate {
        let vendors = match self.repository.list_vendors().await {
            Ok(vendors) => vendors,
            Err(error) => return self.failure_reply(&error.into(), sender, None, ctx),
        };

        let matches = self.matcher.search(text, &vendors);
        info!(
            event_name = "conversation.search.completed",
            correlation_id = %ctx.correlation_id,
            user_id = sender.id.0,
            match_count = matches.len(),
            "vendor search completed"
        );

        match matches.as_slice() {
            [] => blocks::no_results_message(),
            [only] => blocks::vendor_card(&only.vendor),
            _ => blocks::vendor_list(&matches, MAX_LISTED_VENDORS),
        }
    }

    /// Buyer confirmed receipt. Enters the rating flow unless the order was already rated.
    async fn confirm_received(
        &self,
        session: &mut ConversationState,
        sender: &Sender,
        order_id: OrderId,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let mut order = self.require_buyer_order(sender, order_id).await?;

        match order.status {
            OrderStatus::Pending => {
                order.transition_to(OrderStatus::Completed, Utc::now())?;
                self.repository
                    .update_order_status(order.id, order.status, order.completed_at)
                    .await?;
                info!(
                    event_name = "conversation.order.completed",
                    correlation_id = %ctx.correlation_id,
                    user_id = sender.id.0,
                    order_id = order.id.0,
                    "buyer confirmed receipt"
                );
            }
            OrderStatus::Completed => {
                if self.repository.find_rating_by_order(order.id).await?.is_some() {
                    return Ok(text_message("You've already rated this order. Thanks!"));
                }
            }
            OrderStatus::Flagged => {
                return Ok(text_message(
                    "This order was marked as not received, so there's nothing to rate.",
                ));
            }
        }

        let flow = ActiveFlow::seeded(
            FlowKind::Rating,
            [
                (fields::ORDER_ID, order.id.to_string()),
                (fields::VENDOR_ID, order.vendor_id.to_string()),
            ],
        );
        let prompt = replies::step_prompt(FlowStep::Stars, &flow);
        session.begin(flow);
        Ok(prompt)
    }

    async fn flag_not_received(
        &self,
        sender: &Sender,
        order_id: OrderId,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, ApplicationError> {
        let mut order = self.require_buyer_order(sender, order_id).await?;

        match order.status {
            OrderStatus::Pending => {
                order.transition_to(OrderStatus::Flagged, Utc::now())?;
                self.repository.update_order_status(order.id, order.status, None).await?;
                warn!(
                    event_name = "conversation.order.flagged",
                    correlation_id = %ctx.correlation_id,
                    user_id = sender.id.0,
                    order_id = order.id.0,
                    vendor_id = order.vendor_id.0,
                    "buyer reported order not received"
                );
                Ok(blocks::incomplete_order_message())
            }
            OrderStatus::Flagged => Ok(text_message("I've already made a note of that order.")),
            OrderStatus::Completed => {
                Ok(text_message("That order is already marked as received."))
            }
        }
    }

    async fn order_history(&self, sender: &Sender, ctx: &EventContext) -> MessageTemplate {
        self.load_order_history(sender)
            .await
            .unwrap_or_else(|error| self.failure_reply(&error, sender, None, ctx))
    }

    async fn load_order_history(
        &self,
        sender: &Sender,
    ) -> Result<MessageTemplate, ApplicationError> {
        let Some(vendor) = self.repository.find_vendor_by_owner(sender.id).await? else {
            return Ok(blocks::not_a_vendor_message());
        };
        let orders =
            self.repository.list_orders_for_vendor(vendor.id, ORDER_HISTORY_LIMIT).await?;
        Ok(blocks::order_history_message(&orders))
    }

    async fn my_rating(&self, sender: &Sender, ctx: &EventContext) -> MessageTemplate {
        self.load_my_rating(sender)
            .await
            .unwrap_or_else(|error| self.failure_reply(&error, sender, None, ctx))
    }

    async fn load_my_rating(&self, sender: &Sender) -> Result<MessageTemplate, ApplicationError> {
        let Some(vendor) = self.repository.find_vendor_by_owner(sender.id).await? else {
            return Ok(blocks::not_a_vendor_message());
        };
        let ratings =
            self.repository.list_ratings_for_vendor(vendor.id, RECENT_REVIEWS_LIMIT).await?;
        Ok(blocks::my_rating_message(&vendor, &ratings))
    }

    async fn require_vendor(&self, id: VendorId) -> Result<Vendor, ApplicationError> {
        self.repository
            .find_vendor(id)
            .await?
            .ok_or(ApplicationError::NotFound { entity: Entity::Vendor, id: id.0 })
    }

    /// Orders placed by someone else read as missing.
    async fn require_buyer_order(
        &self,
        sender: &Sender,
        id: OrderId,
    ) -> Result<Order, ApplicationError> {
        match self.repository.find_order(id).await? {
            Some(order) if order.is_placed_by(sender.id) => Ok(order),
            _ => Err(ApplicationError::NotFound { entity: Entity::Order, id: id.0 }),
        }
    }

    fn failure_reply(
        &self,
        error: &ApplicationError,
        sender: &Sender,
        flow: Option<FlowKind>,
        ctx: &EventContext,
    ) -> MessageTemplate {
        let flow = flow.map(FlowKind::as_str).unwrap_or("none");
        if error.aborts_flow() {
            error!(
                event_name = "conversation.request.failed",
                correlation_id = %ctx.correlation_id,
                user_id = sender.id.0,
                flow,
                error = %error,
                "request failed"
            );
            blocks::error_message(error.user_message(), &ctx.correlation_id)
        } else {
            info!(
                event_name = "conversation.request.rejected",
                correlation_id = %ctx.correlation_id,
                user_id = sender.id.0,
                flow,
                error = %error,
                "request rejected"
            );
            text_message(error.user_message())
        }
    }
}

#[async_trait]
impl MessageService for Assistant {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        Ok(Some(self.reply_to_text(&event.sender, &event.text, ctx).await))
    }
}

#[async_trait]
impl CommandService for Assistant {
    async fn handle_command(
        &self,
        command: BotCommand,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        Ok(Some(self.reply_to_command(&event.sender, command, &event.text, ctx).await))
    }
}

#[async_trait]
impl ActionService for Assistant {
    async fn handle_action(
        &self,
        action: BotAction,
        event: &ActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        Ok(Some(self.reply_to_action(&event.sender, action, ctx).await))
    }
}
