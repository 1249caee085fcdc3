use marketbot_core::{Order, OrderId, Rating, Sender, Stars, Vendor, VendorMatch};
use serde::Serialize;

use crate::commands::{
    ACTION_BOT_ORDER, ACTION_COMPLETE, ACTION_CONTACT, ACTION_INCOMPLETE, ACTION_ORDER,
    ACTION_RATE, ACTION_SEARCH_AGAIN, ACTION_VENDOR,
};

/// Longest order summary shown in a vendor's history before truncation.
pub const HISTORY_DETAIL_CHARS: usize = 40;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Link buttons open a URL instead of sending an action back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            label: label.into(),
            style: None,
            value: None,
            url: None,
        }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            action_id: "link".to_owned(),
            label: label.into(),
            style: None,
            value: None,
            url: Some(url.into()),
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: String },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Section and context text in block order, separated by blank lines.
    pub fn render_text(&self) -> String {
        let parts: Vec<String> = self
            .blocks
            .iter()
            .filter_map(|block| match block {
                Block::Section { text, .. } => Some(text.clone()),
                Block::Context { elements, .. } => Some(elements.join("\n")),
                Block::Actions { .. } => None,
            })
            .filter(|text| !text.is_empty())
            .collect();

        if parts.is_empty() {
            self.fallback_text.clone()
        } else {
            parts.join("\n\n")
        }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &ButtonElement> {
        self.blocks.iter().flat_map(|block| match block {
            Block::Actions { elements, .. } => elements.as_slice(),
            _ => &[][..],
        })
    }

    pub fn has_button(&self, action_id: &str) -> bool {
        self.buttons().any(|button| button.action_id == action_id)
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Section { block_id: block_id.into(), text: text.into() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<String>,
}

impl ContextBuilder {
    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(text.into());
        self
    }

    fn build(self) -> Vec<String> {
        self.elements
    }
}

/// Single-section message without buttons.
pub fn text_message(text: impl Into<String>) -> MessageTemplate {
    let text = text.into();
    MessageBuilder::new(text.clone()).section("text.v1", text).build()
}

pub fn welcome_message() -> MessageTemplate {
    MessageBuilder::new("Welcome to the campus marketplace")
        .section(
            "welcome.intro.v1",
            "Hey! Welcome to CU Marketplace 🎓\n\n\
             I'm your campus vendor finder. Just tell me what you need in plain English \
             and I'll connect you with the right people.",
        )
        .context("welcome.examples.v1", |context| {
            context
                .line("💬 Try saying things like:")
                .line("• \"I need food delivered\"")
                .line("• \"Looking for laundry services\"")
                .line("• \"Where can I get a haircut?\"")
                .line("• \"Need someone to design a logo\"");
        })
        .section("welcome.vendors.v1", "📝 Vendors: Use /register to list your business")
        .section("welcome.prompt.v1", "So... what are you looking for?")
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("How the marketplace works")
        .section("help.intro.v1", "I help you find campus vendors super easily!")
        .context("help.examples.v1", |context| {
            context
                .line("Just tell me what you need:")
                .line("• \"I need food\"")
                .line("• \"Looking for laundry service\"")
                .line("• \"Where can I get my hair done?\"");
        })
        .section(
            "help.details.v1",
            "I'll find vendors for you, and you can order directly through me.\n\n\
             Want to list your business? Use /register\n\n\
             What can I help you find?",
        )
        .build()
}

pub fn clarify_message() -> MessageTemplate {
    text_message(
        "Not quite sure what you mean. Try telling me what you're looking for?\n\n\
         Like \"I need food\" or \"looking for laundry service\"",
    )
}

pub fn no_results_message() -> MessageTemplate {
    MessageBuilder::new("No vendors found")
        .section("search.empty.v1", "Hmm, couldn't find anyone offering that right now.")
        .context("search.empty.tips.v1", |context| {
            context
                .line("Try:")
                .line("• Using different words")
                .line("• Being more specific")
                .line("• Checking if vendors offer that service yet");
        })
        .section("search.empty.prompt.v1", "What else you looking for?")
        .build()
}

pub fn search_again_message() -> MessageTemplate {
    text_message("Cool, what else you need?\n\nJust type what you're looking for.")
}

pub fn rating_summary(vendor: &Vendor) -> String {
    if vendor.is_rated() {
        format!("⭐ {:.1} ({} orders)", vendor.avg_rating, vendor.total_orders)
    } else {
        "New Vendor".to_owned()
    }
}

pub fn vendor_card(vendor: &Vendor) -> MessageTemplate {
    let badge = if vendor.has_bot() { " 🤖" } else { "" };
    let order_button = if vendor.has_bot() {
        ButtonElement::new(ACTION_BOT_ORDER, "🤖 Order via Their Bot").value(vendor.id)
    } else {
        ButtonElement::new(ACTION_ORDER, "📦 Place Order")
            .style(ButtonStyle::Primary)
            .value(vendor.id)
    };

    let mut builder = MessageBuilder::new(format!("Vendor: {}", vendor.business_name))
        .section("vendor.header.v1", format!("🏪 {}{badge}", vendor.business_name))
        .context("vendor.facts.v1", |context| {
            context
                .line(format!("📋 {}", vendor.services))
                .line(format!("💰 {}", vendor.price_range))
                .line(format!("📊 {}", rating_summary(vendor)));
        });
    if !vendor.description.trim().is_empty() {
        builder = builder.section("vendor.description.v1", vendor.description.clone());
    }

    builder
        .section("vendor.prompt.v1", "Ready to order?")
        .actions("vendor.actions.v1", |actions| {
            actions
                .button(order_button)
                .button(ButtonElement::new(ACTION_CONTACT, "📞 View Contact").value(vendor.id))
                .button(ButtonElement::new(ACTION_SEARCH_AGAIN, "🔍 Search Again"));
        })
        .build()
}

/// Selection list over the first `limit` matches; the heading counts all of them.
pub fn vendor_list(matches: &[VendorMatch], limit: usize) -> MessageTemplate {
    let total = matches.len();
    let plural = if total == 1 { "" } else { "s" };
    let heading = format!("Found {total} vendor{plural} for you:");

    MessageBuilder::new(heading.clone())
        .section("search.results.v1", heading)
        .actions("search.results.actions.v1", |actions| {
            for found in matches.iter().take(limit) {
                let vendor = &found.vendor;
                let rating = if vendor.is_rated() {
                    format!("⭐ {:.1} ({})", vendor.avg_rating, vendor.total_orders)
                } else {
                    "New".to_owned()
                };
                let label = format!("{} - {rating}", vendor.business_name);
                actions.button(ButtonElement::new(ACTION_VENDOR, label).value(vendor.id));
            }
            actions.button(ButtonElement::new(ACTION_SEARCH_AGAIN, "🔍 New Search"));
        })
        .build()
}

pub fn bot_order_message(vendor: &Vendor, bot_handle: &str) -> MessageTemplate {
    let link = format!("https://t.me/{}", bot_handle.trim_start_matches('@'));
    let label = format!("Open {}'s Bot 🤖", vendor.business_name);
    MessageBuilder::new(format!("{} takes orders through their own bot", vendor.business_name))
        .section(
            "vendor.bot.v1",
            format!(
                "Perfect! {} has their own bot for orders.\n\n\
                 Click below to start chatting with their bot:",
                vendor.business_name
            ),
        )
        .actions("vendor.bot.actions.v1", |actions| {
            actions
                .button(ButtonElement::link(label, link))
                .button(ButtonElement::new(ACTION_VENDOR, "⬅️ Back").value(vendor.id));
        })
        .build()
}

pub fn contact_message(vendor: &Vendor) -> MessageTemplate {
    text_message(format!("📞 {}\n{}", vendor.business_name, vendor.contact))
}

pub fn already_registered_message(business_name: &str) -> MessageTemplate {
    text_message(format!(
        "Hey! You're already set up as {business_name}.\n\n\
         Check /myrating to see how you're doing!"
    ))
}

pub fn registration_complete_message(vendor: &Vendor) -> MessageTemplate {
    let mut builder = MessageBuilder::new(format!("{} is registered", vendor.business_name))
        .section("registration.done.v1", "✅ You're all set!")
        .context("registration.summary.v1", |context| {
            context
                .line(vendor.business_name.clone())
                .line(format!("Services: {}", vendor.services))
                .line(format!("Price Range: {}", vendor.price_range));
        });
    if let Some(handle) = vendor.bot_handle.as_deref() {
        builder = builder
            .section("registration.bot.v1", format!("Orders will be sent to your bot: {handle}"));
    }
    builder
        .section(
            "registration.next.v1",
            "Students can now find you when they search! I'll ping you when orders come in.",
        )
        .build()
}

pub fn order_confirmation_message(order: &Order, vendor_name: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Order #{} placed", order.id))
        .section("order.placed.v1", format!("✅ Order placed!\n\nOrder #{}", order.id))
        .context("order.placed.summary.v1", |context| {
            context
                .line(format!("Vendor: {vendor_name}"))
                .line(format!("Your Order:\n{}", order.details))
                .line(format!("Deadline: {}", order.deadline));
        })
        .section(
            "order.placed.next.v1",
            "They've been notified and will reach out soon.\n\n\
             I'll check in with you tomorrow to see how it went!",
        )
        .build()
}

pub fn vendor_new_order_message(order: &Order, buyer: &Sender) -> MessageTemplate {
    let handle = buyer.handle();
    MessageBuilder::new(format!("New order #{}", order.id))
        .section("vendor.order.new.v1", format!("🔔 New Order!\n\nOrder #{}", order.id))
        .context("vendor.order.buyer.v1", |context| {
            context.line(format!("From: {} ({handle})", buyer.display_name()));
        })
        .section("vendor.order.details.v1", format!("📝 Order:\n{}", order.details))
        .section("vendor.order.deadline.v1", format!("⏰ Deadline: {}", order.deadline))
        .section("vendor.order.contact.v1", format!("Contact them: {handle}"))
        .build()
}

pub fn follow_up_message(order_id: OrderId) -> MessageTemplate {
    MessageBuilder::new(format!("Checking in on order #{order_id}"))
        .section(
            "followup.prompt.v1",
            format!("Hey! Quick check about Order #{order_id}.\n\nDid you get everything okay?"),
        )
        .actions("followup.actions.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(ACTION_COMPLETE, "✅ Yes")
                        .style(ButtonStyle::Primary)
                        .value(order_id),
                )
                .button(
                    ButtonElement::new(ACTION_INCOMPLETE, "❌ No")
                        .style(ButtonStyle::Danger)
                        .value(order_id),
                );
        })
        .build()
}

/// Constrained 1..=5 star choice.
pub fn rating_keyboard(prompt: &str) -> MessageTemplate {
    MessageBuilder::new(prompt.to_owned())
        .section("rating.prompt.v1", prompt.to_owned())
        .actions("rating.stars.v1", |actions| {
            for stars in Stars::all() {
                actions.button(
                    ButtonElement::new(ACTION_RATE, format!("{} ({stars})", stars.glyphs()))
                        .value(stars),
                );
            }
        })
        .build()
}

pub fn incomplete_order_message() -> MessageTemplate {
    text_message(
        "That's not great. I've made a note of it.\n\n\
         Maybe try reaching out to them directly or check out other vendors?\n\n\
         What else can I help with?",
    )
}

pub fn rating_thanks_message() -> MessageTemplate {
    text_message(
        "Thanks! Your feedback helps other students find good vendors.\n\n\
         Need anything else? Just let me know!",
    )
}

pub fn not_a_vendor_message() -> MessageTemplate {
    text_message("You're not registered as a vendor yet.\n\nUse /register to get started!")
}

pub fn order_history_message(orders: &[Order]) -> MessageTemplate {
    if orders.is_empty() {
        return text_message("No orders yet. Keep the hustle going!");
    }

    let entries: Vec<String> = orders
        .iter()
        .map(|order| {
            format!(
                "{} Order #{}\n{}\nNeeded: {}",
                order.status.marker(),
                order.id,
                shorten(&order.details, HISTORY_DETAIL_CHARS),
                order.deadline
            )
        })
        .collect();

    MessageBuilder::new(format!("{} recent orders", orders.len()))
        .section("history.header.v1", "📦 Your Recent Orders:")
        .section("history.entries.v1", entries.join("\n\n"))
        .build()
}

pub fn my_rating_message(vendor: &Vendor, recent: &[Rating]) -> MessageTemplate {
    let header = format!("📊 {}", vendor.business_name);
    if recent.is_empty() {
        return MessageBuilder::new(format!("{} has no ratings yet", vendor.business_name))
            .section("myrating.header.v1", header)
            .section(
                "myrating.empty.v1",
                "No ratings yet.\n\nComplete a few orders to build your reputation!",
            )
            .build();
    }

    let reviews: Vec<String> = recent
        .iter()
        .map(|rating| {
            let mut entry = rating.stars.glyphs();
            if let Some(review) = rating.review.as_deref() {
                entry.push_str(&format!("\n\"{review}\""));
            }
            entry.push_str(&format!("\n{}", rating.created_at.format("%Y-%m-%d")));
            entry
        })
        .collect();

    MessageBuilder::new(format!("Ratings for {}", vendor.business_name))
        .section("myrating.header.v1", header)
        .context("myrating.aggregate.v1", |context| {
            context
                .line(format!("⭐ {:.1} average", vendor.avg_rating))
                .line(format!("📦 {} completed orders", vendor.total_orders));
        })
        .section("myrating.reviews.v1", format!("Recent Reviews:\n\n{}", reviews.join("\n\n")))
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("error.summary.v1", summary.to_owned())
        .context("error.correlation.v1", |context| {
            context.line(format!("ref: {correlation_id}"));
        })
        .build()
}

fn shorten(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{head}...")
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use marketbot_core::{
        Order, OrderId, OrderStatus, Rating, RatingId, Sender, Stars, UserId, Vendor, VendorId,
        VendorMatch,
    };

    use super::{
        bot_order_message, follow_up_message, my_rating_message, order_history_message,
        rating_keyboard, vendor_card, vendor_list, vendor_new_order_message, Block, ButtonStyle,
        MessageBuilder,
    };

    fn vendor(id: i64, name: &str) -> Vendor {
        Vendor {
            id: VendorId(id),
            owner: UserId(100 + id),
            business_name: name.to_owned(),
            services: "jollof rice, fried rice".to_owned(),
            keywords: "jollof rice fried".to_owned(),
            contact: "08012345678".to_owned(),
            bot_handle: None,
            description: "Hot meals on campus".to_owned(),
            price_range: "₦500 - ₦2000".to_owned(),
            avg_rating: 0.0,
            total_orders: 0,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn order(id: i64, details: &str, status: OrderStatus) -> Order {
        Order {
            id: OrderId(id),
            vendor_id: VendorId(1),
            buyer_id: UserId(7),
            details: details.to_owned(),
            deadline: "Today by 6pm".to_owned(),
            status,
            created_at: Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
            completed_at: None,
        }
    }

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .section("s1", "hello")
            .context("c1", |context| {
                context.line("one").line("two");
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(message.blocks[0], Block::Section { .. }));
        assert_eq!(message.render_text(), "hello\n\none\ntwo");
    }

    #[test]
    fn render_text_falls_back_when_only_buttons_exist() {
        let message = MessageBuilder::new("pick one")
            .actions("a1", |actions| {
                actions.button(super::ButtonElement::new("x", "X"));
            })
            .build();
        assert_eq!(message.render_text(), "pick one");
    }

    #[test]
    fn unrated_vendor_card_offers_direct_order() {
        let card = vendor_card(&vendor(3, "Mama T Kitchen"));
        let text = card.render_text();

        assert!(text.contains("🏪 Mama T Kitchen"));
        assert!(text.contains("New Vendor"));
        assert!(card.has_button("order"));
        assert!(!card.has_button("botorder"));
        assert!(card.has_button("contact"));
        assert!(card.has_button("search_again"));
    }

    #[test]
    fn vendor_with_bot_gets_badge_and_bot_order_button() {
        let mut with_bot = vendor(4, "Fresh Laundry");
        with_bot.bot_handle = Some("@FreshBot".to_owned());
        with_bot.avg_rating = 4.0;
        with_bot.total_orders = 3;

        let card = vendor_card(&with_bot);
        let text = card.render_text();
        assert!(text.contains("Fresh Laundry 🤖"));
        assert!(text.contains("⭐ 4.0 (3 orders)"));
        assert!(card.has_button("botorder"));
        assert!(!card.has_button("order"));
    }

    #[test]
    fn vendor_list_caps_buttons_but_reports_full_count() {
        let matches: Vec<VendorMatch> = (1..=12)
            .map(|id| VendorMatch { vendor: vendor(id, &format!("Vendor {id}")), score: 1 })
            .collect();

        let list = vendor_list(&matches, 10);
        assert!(list.render_text().contains("Found 12 vendors for you:"));
        let vendor_buttons = list.buttons().filter(|button| button.action_id == "vendor").count();
        assert_eq!(vendor_buttons, 10);
        assert!(list.has_button("search_again"));
    }

    #[test]
    fn bot_order_message_links_without_at_sign() {
        let message = bot_order_message(&vendor(2, "Snap Prints"), "@SnapBot");
        let link = message.buttons().find_map(|button| button.url.clone());
        assert_eq!(link.as_deref(), Some("https://t.me/SnapBot"));
        assert!(message.has_button("vendor"));
    }

    #[test]
    fn rating_keyboard_offers_exactly_five_choices() {
        let keyboard = rating_keyboard("How was it?");
        let values: Vec<_> = keyboard.buttons().filter_map(|button| button.value.clone()).collect();
        assert_eq!(values, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn follow_up_message_carries_order_id_on_both_buttons() {
        let message = follow_up_message(OrderId(42));
        let buttons: Vec<_> = message.buttons().collect();
        assert_eq!(buttons.len(), 2);
        assert!(buttons.iter().all(|button| button.value.as_deref() == Some("42")));
        assert_eq!(buttons[1].style, Some(ButtonStyle::Danger));
    }

    #[test]
    fn vendor_notification_names_buyer_handle() {
        let buyer = Sender::new(UserId(7)).with_username("ada").with_first_name("Ada");
        let message =
            vendor_new_order_message(&order(5, "2 plates jollof", OrderStatus::Pending), &buyer);
        let text = message.render_text();
        assert!(text.contains("From: Ada (@ada)"));
        assert!(text.contains("Contact them: @ada"));
    }

    #[test]
    fn history_truncates_long_details_and_marks_status() {
        let long = "a".repeat(45);
        let message = order_history_message(&[
            order(2, &long, OrderStatus::Completed),
            order(1, "short", OrderStatus::Flagged),
        ]);
        let text = message.render_text();
        assert!(text.contains(&format!("✅ Order #2\n{}...", "a".repeat(40))));
        assert!(text.contains("⚠️ Order #1\nshort"));
    }

    #[test]
    fn my_rating_lists_reviews_with_dates() {
        let mut rated = vendor(1, "Mama T Kitchen");
        rated.avg_rating = 4.5;
        rated.total_orders = 2;
        let rating = Rating {
            id: RatingId(1),
            order_id: OrderId(1),
            vendor_id: VendorId(1),
            buyer_id: UserId(7),
            stars: Stars::new(5).unwrap(),
            review: Some("great".to_owned()),
            created_at: Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap(),
        };

        let text = my_rating_message(&rated, &[rating]).render_text();
        assert!(text.contains("⭐ 4.5 average"));
        assert!(text.contains("⭐⭐⭐⭐⭐\n\"great\"\n2026-03-04"));
        assert!(my_rating_message(&rated, &[]).render_text().contains("No ratings yet."));
    }
}
