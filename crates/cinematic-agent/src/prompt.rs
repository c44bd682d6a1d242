//! Fixed prompt text sent ahead of every conversation

use chrono::{DateTime, TimeZone};
use cinematic_ai::Turn;
use rand::seq::SliceRandom;

use crate::protocol::CommandKind;

const PERSONA: &str = "You are media management assistant called CineMatic, enthusiastic, knowledgeable and passionate about all things media; always run lookups to ensure correct id, do not rely on chat history, if the data you have received does not contain what you need, you reply with the truthful answer of unknown, responses should all be on one line and compact language";

/// Build the instruction preamble for a conversation started at `now`.
pub fn instruction_preamble<Tz: TimeZone>(now: DateTime<Tz>) -> Vec<Turn>
where
    Tz::Offset: std::fmt::Display,
{
    vec![
        Turn::user(PERSONA),
        Turn::user(format!(
            "The current date is {}, the current time is {}, if needing data beyond 2021 training data you can use a web search",
            now.format("%d/%m/%Y"),
            now.format("%H:%M:%S"),
        )),
        Turn::user(command_syntax()),
    ]
}

fn command_syntax() -> String {
    let retrievals: Vec<&str> = CommandKind::ROUTED
        .iter()
        .filter(|k| k.returns_data())
        .map(CommandKind::name)
        .collect();
    let actions: Vec<&str> = CommandKind::ROUTED
        .iter()
        .filter(|k| !k.returns_data())
        .map(CommandKind::name)
        .collect();

    format!(
        "To fetch data write [CMDRET~kind~arguments] and wait for the [RES~...] reply, kinds: {}. \
         To make a change write [CMD~kind~arguments], kinds: {}. \
         Separate arguments with ~ and several search terms with ¬. Text outside brackets is shown to the user.",
        retrievals.join(", "),
        actions.join(", "),
    )
}

/// The opening exchange that introduces the user to the model
pub fn greeting(user_name: &str) -> [Turn; 2] {
    [
        Turn::user(format!("Hi my name is {}", user_name)),
        Turn::assistant("Hi, how can I help you?"),
    ]
}

const PLACEHOLDERS: &[&str] = &[
    "Hey there! Super excited to process your message, give me just a moment... 🎬",
    "Oh, a message! Can't wait to dive into this one - I'm on it... 🎥",
    "Hey, awesome! A new message to explore! Let me work my media magic... 📺",
    "Woo-hoo! A fresh message to check out! Let me put my CineMatic touch on it... 🍿",
    "Yay, another message! Time to unleash my media passion, be right back... 📼",
    "Hey, a message! I'm so excited to process this one, just a moment... 🎞",
    "Aha! A message has arrived! Let me roll out the red carpet for it... 🎞️",
    "Ooh, a new message to dissect! Allow me to unleash my inner film buff... 🎦",
    "Lights, camera, action! Time to process your message with a cinematic twist... 📽️",
    "Hooray, a message to dig into! Let's make this a blockbuster experience... 🌟",
    "Greetings! Your message has caught my eye, let me give it the star treatment... 🎟️",
    "Popcorn's ready! Let me take a closer look at your message like a true film fanatic... 🍿",
    "Woohoo! A message to analyze! Let me work on it while humming my favorite movie tunes... 🎶",
    "A new message to dive into! Let me put on my director's hat and get to work... 🎩",
    "And... action! Time to process your message with my media expertise... 📹",
    "Hold on to your seats! I'm about to process your message with the excitement of a movie premiere... 🌆",
    "Sending your message to the cutting room! Let me work on it like a skilled film editor... 🎞️",
    "A message has entered the scene! Let me put my media prowess to work on it... 🎭",
    "Your message is the star of the show! Let me process it with the passion of a true cinephile... 🌟",
    "Curtain up! Your message takes center stage, and I'm ready to give it a standing ovation... 🎦",
    "In the spotlight! Let me process your message with the enthusiasm of a film festival enthusiast... 🎪",
];

/// A random themed line shown while a message is being worked on
pub fn placeholder() -> &'static str {
    PLACEHOLDERS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(PLACEHOLDERS[0])
}
