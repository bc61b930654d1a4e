use alloc::format;
use alloc::string::String;

use embassy_time::{Duration, Instant};
use log::{debug, info, warn};

use super::{BotError, BotTransport, CommandMessage};
use crate::config::BotConfig;
use crate::sensors::SensorReading;

pub const UNAUTHORIZED_REPLY: &str = "Unauthorized user";
pub const STATUS_COMMAND: &str = "/status";
pub const START_COMMAND: &str = "/start";

/// Enforces a minimum spacing between two polls.
#[derive(Debug, Clone, Copy)]
pub struct PollLimiter {
    last_poll: Option<Instant>,
    min_interval: Duration,
}

impl PollLimiter {
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_poll: None,
            min_interval,
        }
    }

    pub fn last_poll(&self) -> Option<Instant> {
        self.last_poll
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.last_poll
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min_interval)
    }

    /// When the next poll may run. `None` means immediately.
    pub fn next_due(&self) -> Option<Instant> {
        self.last_poll.map(|last| last + self.min_interval)
    }

    /// Claim a poll slot at `now`. Returns `false` if polling is not yet allowed.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.last_poll = Some(now);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The minimum poll interval has not elapsed; the transport was not used.
    Skipped,
    /// The backlog was drained.
    Drained { updates: usize, replies: usize },
}

pub struct Dispatcher<'a, B> {
    transport: B,
    config: BotConfig<'a>,
    limiter: PollLimiter,
    last_update_id: i64,
}

impl<'a, B: BotTransport> Dispatcher<'a, B> {
    pub fn new(transport: B, config: BotConfig<'a>) -> Self {
        Self {
            transport,
            limiter: PollLimiter::new(config.poll_interval()),
            config,
            last_update_id: 0,
        }
    }

    pub fn transport(&self) -> &B {
        &self.transport
    }

    pub fn limiter(&self) -> &PollLimiter {
        &self.limiter
    }

    pub fn last_update_id(&self) -> i64 {
        self.last_update_id
    }

    /// Fetch and answer every pending update.
    ///
    /// Keeps asking for updates past the last seen id until an empty batch
    /// comes back. A failed fetch ends the cycle with an error; a failed
    /// reply is logged and the remaining updates are still handled.
    pub async fn poll(&mut self, now: Instant, reading: &SensorReading) -> Result<PollOutcome, BotError> {
        if !self.limiter.try_acquire(now) {
            return Ok(PollOutcome::Skipped);
        }

        let mut updates = 0;
        let mut replies = 0;

        loop {
            let batch = self.transport.get_updates(self.last_update_id + 1).await?;
            if batch.is_empty() {
                break;
            }

            let previous = self.last_update_id;
            for update in batch {
                updates += 1;
                self.last_update_id = self.last_update_id.max(update.id);

                let Some(message) = update.message else {
                    debug!("Update {} has no text message", update.id);
                    continue;
                };
                let Some(reply) = self.reply_for(&message, reading) else {
                    continue;
                };
                match self.transport.send_message(&message.chat_id, &reply).await {
                    Ok(()) => replies += 1,
                    Err(e) => warn!("Failed to reply to chat {}: {}", message.chat_id, e),
                }
            }

            // A transport that keeps repeating old ids would loop forever
            if self.last_update_id == previous {
                warn!("Bot updates did not advance past {}", previous);
                break;
            }
        }

        if updates > 0 {
            info!("Handled {} bot updates, sent {} replies", updates, replies);
        }
        Ok(PollOutcome::Drained { updates, replies })
    }

    /// The reply owed to `message`, if any.
    pub fn reply_for(&self, message: &CommandMessage, reading: &SensorReading) -> Option<String> {
        if message.chat_id != self.config.authorized_chat_id {
            info!("Rejecting message from chat {}", message.chat_id);
            return Some(String::from(UNAUTHORIZED_REPLY));
        }

        match message.text.as_str() {
            STATUS_COMMAND => Some(status_message(reading)),
            START_COMMAND => {
                let name = if message.sender_name.is_empty() {
                    self.config.fallback_name
                } else {
                    message.sender_name.as_str()
                };
                Some(welcome_message(name))
            }
            _ => None,
        }
    }
}

pub fn status_message(reading: &SensorReading) -> String {
    let temperature = match reading.temperature {
        Some(celsius) => format!("{:.1}", celsius),
        None => String::from("--"),
    };
    format!(
        "Voltage: {:.2} V\nCurrent: {:.2} A\nTemperature: {} °C\nLight Intensity: {}\n",
        reading.panel_voltage, reading.current, temperature, reading.light_level
    )
}

pub fn welcome_message(name: &str) -> String {
    format!(
        "Hello, {}.\n\
         Welcome to Solar Power Monitor!\n\
         /status : To check the current status of the solar power.\n\
         To monitor the voltage, current, temperature and light intensity\n",
        name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::Update;
    use crate::testing::ScriptedBot;
    use alloc::vec;
    use alloc::vec::Vec;
    use embassy_futures::block_on;

    const OWNER: &str = "1001";

    fn config() -> BotConfig<'static> {
        BotConfig {
            token: "T",
            authorized_chat_id: OWNER,
            fallback_name: "Guest",
            ..BotConfig::default()
        }
    }

    fn reading() -> SensorReading {
        SensorReading {
            panel_voltage: 13.2,
            mcu_voltage: 2.64,
            current: 1.25,
            temperature: Some(29.0),
            light_level: 987,
        }
    }

    fn text(id: i64, chat: &str, name: &str, body: &str) -> Update {
        Update {
            id,
            message: Some(CommandMessage {
                chat_id: chat.into(),
                sender_name: name.into(),
                text: body.into(),
            }),
        }
    }

    #[test]
    fn test_limiter_boundary_is_inclusive() {
        let mut limiter = PollLimiter::new(Duration::from_millis(500));
        let t0 = Instant::from_millis(1_000);

        assert!(limiter.try_acquire(t0));
        assert!(!limiter.try_acquire(t0 + Duration::from_millis(499)));
        assert!(limiter.try_acquire(t0 + Duration::from_millis(500)));
        assert_eq!(limiter.next_due(), Some(t0 + Duration::from_millis(1_000)));
    }

    #[test]
    fn test_two_polls_within_interval_fetch_once() {
        let bot = ScriptedBot::new(vec![]);
        let mut dispatcher = Dispatcher::new(bot, config());
        let t0 = Instant::from_millis(0);

        let first = block_on(dispatcher.poll(t0, &reading())).unwrap();
        let second = block_on(dispatcher.poll(t0 + Duration::from_millis(200), &reading())).unwrap();

        assert_eq!(first, PollOutcome::Drained { updates: 0, replies: 0 });
        assert_eq!(second, PollOutcome::Skipped);
        assert_eq!(dispatcher.transport().offsets(), &[1]);
    }

    #[test]
    fn test_unauthorized_chat_gets_fixed_reply() {
        let bodies = [STATUS_COMMAND, START_COMMAND, "what is the voltage?", ""];
        let batch = bodies
            .iter()
            .zip(5..)
            .map(|(body, id)| text(id, "666", "Mallory", body))
            .collect();
        let mut dispatcher = Dispatcher::new(ScriptedBot::new(vec![batch]), config());

        block_on(dispatcher.poll(Instant::from_millis(0), &reading())).unwrap();

        let sent = dispatcher.transport().sent();
        assert_eq!(sent.len(), bodies.len());
        for (chat, reply) in sent {
            assert_eq!(chat, "666");
            assert_eq!(reply, UNAUTHORIZED_REPLY);
        }
    }

    #[test]
    fn test_status_reply_lists_readings_in_order() {
        let reply = status_message(&reading());
        let lines: Vec<&str> = reply.lines().collect();

        assert_eq!(
            lines,
            [
                "Voltage: 13.20 V",
                "Current: 1.25 A",
                "Temperature: 29.0 °C",
                "Light Intensity: 987",
            ]
        );
    }

    #[test]
    fn test_status_without_temperature() {
        let mut values = reading();
        values.temperature = None;
        assert!(status_message(&values).contains("Temperature: -- °C\n"));
    }

    #[test]
    fn test_start_uses_fallback_name_when_sender_unnamed() {
        let bot = ScriptedBot::new(vec![vec![
            text(1, OWNER, "", START_COMMAND),
            text(2, OWNER, "Asha", START_COMMAND),
        ]]);
        let mut dispatcher = Dispatcher::new(bot, config());

        block_on(dispatcher.poll(Instant::from_millis(0), &reading())).unwrap();

        let sent = dispatcher.transport().sent();
        assert!(sent[0].1.starts_with("Hello, Guest.\nWelcome to Solar Power Monitor!\n"));
        assert!(sent[1].1.starts_with("Hello, Asha.\n"));
        assert!(sent[1].1.contains("/status"));
    }

    #[test]
    fn test_drain_advances_offset_and_ignores_other_text() {
        let bot = ScriptedBot::new(vec![
            vec![text(10, OWNER, "A", "hello"), Update { id: 11, message: None }],
            vec![text(12, OWNER, "A", STATUS_COMMAND)],
        ]);
        let mut dispatcher = Dispatcher::new(bot, config());

        let outcome = block_on(dispatcher.poll(Instant::from_millis(0), &reading())).unwrap();

        assert_eq!(outcome, PollOutcome::Drained { updates: 3, replies: 1 });
        assert_eq!(dispatcher.last_update_id(), 12);
        assert_eq!(dispatcher.transport().offsets(), &[1, 12, 13]);
    }

    #[test]
    fn test_send_failure_does_not_stop_drain() {
        let mut bot = ScriptedBot::new(vec![vec![
            text(1, OWNER, "A", STATUS_COMMAND),
            text(2, OWNER, "A", STATUS_COMMAND),
        ]]);
        bot.fail_sends(1);
        let mut dispatcher = Dispatcher::new(bot, config());

        let outcome = block_on(dispatcher.poll(Instant::from_millis(0), &reading())).unwrap();

        assert_eq!(outcome, PollOutcome::Drained { updates: 2, replies: 1 });
        assert_eq!(dispatcher.last_update_id(), 2);
    }

    #[test]
    fn test_fetch_failure_ends_cycle() {
        let mut bot = ScriptedBot::new(vec![]);
        bot.fail_next_fetch(BotError::Status(502));
        let mut dispatcher = Dispatcher::new(bot, config());

        let result = block_on(dispatcher.poll(Instant::from_millis(0), &reading()));

        assert_eq!(result, Err(BotError::Status(502)));
        assert!(dispatcher.limiter().last_poll().is_some());
    }
}
