//! The monitor loop body
//!
//! [`Monitor`] owns the one [`SensorReading`] snapshot and runs the four
//! stages in a fixed order on every [`Monitor::step`]:
//!
//! 1. sensor acquisition, every `timing.sample_interval`
//! 2. bot command dispatch, at most every `bot.poll_interval`
//! 3. display page flip, when the current page's dwell time is over
//! 4. telemetry publish, every `telemetry.publish_interval`
//!
//! Stage errors are logged and never stop the loop. `step` returns the
//! instant at which the next stage becomes due; the caller sleeps until then.

use embassy_time::Instant;
use log::{error, warn};

use crate::bot::{BotTransport, Dispatcher, PollOutcome};
use crate::config::Config;
use crate::display::{CharDisplay, Presenter};
use crate::net::Connector;
use crate::schedule::{Clock, Deadline, earliest};
use crate::sensors::{Acquisition, AnalogSampler, SensorReading, TemperatureProbe};
use crate::telemetry::TelemetryPublisher;

pub struct Monitor<'a, K, A, T, D, B, C> {
    clock: K,
    reading: SensorReading,
    acquisition: Acquisition<A, T>,
    sampling: Deadline,
    dispatcher: Dispatcher<'a, B>,
    presenter: Presenter<D>,
    publisher: TelemetryPublisher<'a, C>,
    publishing: Deadline,
    online: bool,
}

impl<'a, K, A, T, D, B, C> Monitor<'a, K, A, T, D, B, C>
where
    K: Clock,
    A: AnalogSampler,
    T: TemperatureProbe,
    D: CharDisplay,
    B: BotTransport,
    C: Connector,
{
    pub fn new(
        config: &Config<'a>,
        clock: K,
        acquisition: Acquisition<A, T>,
        presenter: Presenter<D>,
        bot: B,
        connector: C,
    ) -> Self {
        Self {
            clock,
            reading: SensorReading::default(),
            acquisition,
            sampling: Deadline::new(config.timing.sample_interval()),
            dispatcher: Dispatcher::new(bot, config.bot),
            presenter,
            publisher: TelemetryPublisher::new(connector, config.telemetry),
            publishing: Deadline::new(config.telemetry.publish_interval()),
            online: true,
        }
    }

    pub fn reading(&self) -> &SensorReading {
        &self.reading
    }

    pub fn presenter(&self) -> &Presenter<D> {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut Presenter<D> {
        &mut self.presenter
    }

    pub fn dispatcher(&self) -> &Dispatcher<'a, B> {
        &self.dispatcher
    }

    pub fn publisher(&self) -> &TelemetryPublisher<'a, C> {
        &self.publisher
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// While offline the bot and telemetry stages are skipped.
    pub fn set_online(&mut self, online: bool) {
        if self.online != online {
            warn!("Network {}", if online { "back online" } else { "offline" });
        }
        self.online = online;
    }

    /// Run every stage that is due and return the next wake-up instant.
    pub async fn step(&mut self) -> Instant {
        let now = self.clock.now();
        if self.sampling.is_due(now) {
            if let Err(e) = self.acquisition.sample(&mut self.reading).await {
                warn!("Sensor acquisition incomplete: {}", e);
            }
            self.sampling.complete(self.clock.now());
        }

        if self.online {
            match self.dispatcher.poll(self.clock.now(), &self.reading).await {
                Ok(PollOutcome::Skipped | PollOutcome::Drained { .. }) => {}
                Err(e) => warn!("Bot poll failed: {}", e),
            }
        }

        if let Err(e) = self.presenter.tick(self.clock.now(), &self.reading).await {
            error!("Display update failed: {}", e);
        }

        let now = self.clock.now();
        if self.online && self.publishing.is_due(now) {
            // Failures are already logged by the publisher
            let _ = self.publisher.publish(&self.reading).await;
            self.publishing.complete(self.clock.now());
        }

        self.next_wake()
    }

    pub fn next_wake(&self) -> Instant {
        let now = self.clock.now();
        let display = self.presenter.next_due();
        let sampling = self.sampling.next_due();
        if self.online {
            earliest(
                now,
                &[
                    sampling,
                    self.dispatcher.limiter().next_due(),
                    display,
                    self.publishing.next_due(),
                ],
            )
        } else {
            earliest(now, &[sampling, display])
        }
    }
}
