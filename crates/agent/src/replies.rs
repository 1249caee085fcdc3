//! What the assistant says at each step, and the small-talk pools.

use marketbot_channel::blocks::{rating_keyboard, text_message, MessageTemplate};
use marketbot_core::flows::{fields, StepValidationError};
use marketbot_core::{ActiveFlow, FlowKind, FlowStep, Stars};
use rand::seq::SliceRandom;

pub const GREETING_REPLIES: &[&str] = &[
    "Hey! What can I help you find today?",
    "Hi there! Looking for something specific?",
    "Hello! Need a vendor for something?",
    "Hey! What do you need today?",
    "Hi! How can I help you out?",
];

pub const THANKS_REPLIES: &[&str] = &[
    "You're welcome! Anything else you need?",
    "Happy to help! Need anything else?",
    "No problem! What else can I do for you?",
    "Glad I could help! Looking for anything else?",
    "Anytime! Just let me know if you need more help.",
];

pub const RATING_PROMPT: &str = "Nice! How was your experience with them?";

fn pick(pool: &'static [&'static str]) -> &'static str {
    pool.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

pub fn greeting_reply() -> MessageTemplate {
    text_message(pick(GREETING_REPLIES))
}

pub fn thanks_reply() -> MessageTemplate {
    text_message(pick(THANKS_REPLIES))
}

/// Prompt for `step`, worded from what `flow` has collected so far.
pub fn step_prompt(step: FlowStep, flow: &ActiveFlow) -> MessageTemplate {
    match step {
        FlowStep::BusinessName => text_message(
            "Awesome! Let's get your business on here.\n\n\
             First up, what's your business name?",
        ),
        FlowStep::Services => {
            let name = flow.field(fields::BUSINESS_NAME).unwrap_or("That");
            text_message(format!(
                "Nice! {name} sounds good.\n\n\
                 Now tell me what you offer. Be specific so students can find you easily.\n\n\
                 Like:\n\
                 • \"Jollof rice, fried rice, pasta, small chops\"\n\
                 • \"Laundry washing, ironing, dry cleaning\"\n\
                 • \"Logo design, flyers, video editing\""
            ))
        }
        FlowStep::Contact => text_message(
            "Got it! How should customers reach you?\n\n\
             Drop your WhatsApp number or Telegram username.",
        ),
        FlowStep::BotHandle => text_message(
            "Great! Quick question:\n\n\
             Do you have a Telegram bot for your business?\n\n\
             If yes, share the bot username (like @YourBusinessBot)\n\
             If no, just type 'no' or 'skip'",
        ),
        FlowStep::Description => {
            let lead = match flow.field(fields::BOT_HANDLE) {
                Some(handle) => format!(
                    "Cool! I'll direct customers to {handle} when they order.\n\n\
                     Now tell me a bit about your business."
                ),
                None => "No problem! Now give me a short pitch about your business.".to_owned(),
            };
            text_message(format!(
                "{lead}\n\n\
                 What makes you different? Why should students choose you?\n\
                 (Keep it under 200 characters)"
            ))
        }
        FlowStep::PriceRange => text_message(
            "Almost there! What's your price range?\n\n\
             Examples:\n\
             • \"₦500 - ₦2000\"\n\
             • \"From ₦1500\"\n\
             • \"₦300 per item\"",
        ),
        FlowStep::OrderDetails => text_message(
            "Alright! What do you want to order?\n\n\
             Be specific:\n\
             • Quantity (2 plates, 5 shirts)\n\
             • Preferences (extra spicy, no starch)\n\
             • Special requests",
        ),
        FlowStep::Deadline => text_message(
            "Got it! When do you need this?\n\n\
             You can say:\n\
             • \"Today by 6pm\"\n\
             • \"Tomorrow afternoon\"\n\
             • \"In 2 hours\"\n\
             • \"ASAP\"",
        ),
        FlowStep::Stars => rating_keyboard(RATING_PROMPT),
        FlowStep::Review => {
            let glyphs = flow
                .field(fields::STARS)
                .and_then(|raw| raw.parse::<u8>().ok())
                .and_then(|value| Stars::new(value).ok())
                .map(Stars::glyphs)
                .unwrap_or_default();
            text_message(format!(
                "{glyphs}\n\n\
                 Wanna leave a quick review? (optional)\n\n\
                 Type it out or send /skip"
            ))
        }
    }
}

/// Re-asks the same step after rejected input.
pub fn reprompt(step: FlowStep, error: &StepValidationError, flow: &ActiveFlow) -> MessageTemplate {
    match error {
        StepValidationError::ExpectedChoice | StepValidationError::InvalidChoice(_) => {
            rating_keyboard(&format!("Please tap one of the star buttons.\n\n{RATING_PROMPT}"))
        }
        StepValidationError::Blank | StepValidationError::ExpectedText => {
            let lead = match error {
                StepValidationError::Blank => "I didn't catch that.",
                _ => "Please type your answer instead of tapping a button.",
            };
            let prompt = step_prompt(step, flow).render_text();
            text_message(format!("{lead}\n\n{prompt}"))
        }
    }
}

pub fn flow_label(kind: FlowKind) -> &'static str {
    match kind {
        FlowKind::Registration => "registering your business",
        FlowKind::OrderPlacement => "placing an order",
        FlowKind::Rating => "rating an order",
    }
}

#[cfg(test)]
mod tests {
    use marketbot_core::flows::{fields, StepValidationError};
    use marketbot_core::{ActiveFlow, FlowKind, FlowStep};

    use super::{
        greeting_reply, reprompt, step_prompt, thanks_reply, GREETING_REPLIES, THANKS_REPLIES,
    };

    #[test]
    fn small_talk_comes_from_the_pools() {
        for _ in 0..20 {
            assert!(GREETING_REPLIES.contains(&greeting_reply().render_text().as_str()));
            assert!(THANKS_REPLIES.contains(&thanks_reply().render_text().as_str()));
        }
    }

    #[test]
    fn services_prompt_echoes_business_name() {
        let flow = ActiveFlow::seeded(FlowKind::Registration, [(fields::BUSINESS_NAME, "Mama T")]);
        let text = step_prompt(FlowStep::Services, &flow).render_text();
        assert!(text.starts_with("Nice! Mama T sounds good."));
    }

    #[test]
    fn description_prompt_depends_on_bot_handle() {
        let without = ActiveFlow::new(FlowKind::Registration);
        assert!(step_prompt(FlowStep::Description, &without)
            .render_text()
            .starts_with("No problem!"));

        let with = ActiveFlow::seeded(FlowKind::Registration, [(fields::BOT_HANDLE, "@MamaTBot")]);
        assert!(step_prompt(FlowStep::Description, &with)
            .render_text()
            .contains("I'll direct customers to @MamaTBot"));
    }

    #[test]
    fn stars_prompt_offers_five_buttons_and_review_echoes_stars() {
        let flow = ActiveFlow::new(FlowKind::Rating);
        assert_eq!(step_prompt(FlowStep::Stars, &flow).buttons().count(), 5);

        let rated = ActiveFlow::seeded(FlowKind::Rating, [(fields::STARS, "3")]);
        let review = step_prompt(FlowStep::Review, &rated).render_text();
        assert!(review.starts_with("⭐⭐⭐\n\nWanna leave a quick review?"));
        assert!(review.contains("/skip"));
    }

    #[test]
    fn reprompt_for_stars_shows_keyboard_again() {
        let flow = ActiveFlow::new(FlowKind::Rating);
        let message = reprompt(FlowStep::Stars, &StepValidationError::ExpectedChoice, &flow);
        assert!(message.has_button("rate"));
    }

    #[test]
    fn reprompt_for_blank_repeats_step_prompt() {
        let flow = ActiveFlow::new(FlowKind::Registration);
        let message = reprompt(FlowStep::BusinessName, &StepValidationError::Blank, &flow);
        let text = message.render_text();
        assert!(text.starts_with("I didn't catch that."));
        assert!(text.contains("what's your business name?"));
    }
}
