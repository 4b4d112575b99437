//! Offer timer: the expiry countdown and the scarcity counter shown on the
//! offer step.
//!
//! Both run as tokio tasks owned by an [`OfferTimer`]. Dropping or cancelling
//! the timer aborts them, so no periodic work outlives the offer step.

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Timing for the offer step.
#[derive(Debug, Clone)]
pub struct OfferConfig {
    /// Countdown start, in seconds.
    pub countdown_secs: u32,
    /// Countdown tick.
    pub tick: Duration,
    /// Scarcity counter start ("seats left").
    pub initial_seats: u32,
    /// The counter never drops below this.
    pub min_seats: u32,
    /// Lower bound (inclusive) of the random delay between decrements.
    pub seat_delay_min: Duration,
    /// Upper bound (exclusive) of the random delay between decrements.
    pub seat_delay_max: Duration,
}

impl Default for OfferConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 300,
            tick: Duration::from_secs(1),
            initial_seats: 6,
            min_seats: 1,
            seat_delay_min: Duration::from_millis(1000),
            seat_delay_max: Duration::from_millis(5000),
        }
    }
}

/// Countdown and scarcity processes for one visit to the offer step.
pub struct OfferTimer {
    config: OfferConfig,
    countdown: watch::Receiver<u32>,
    seats: watch::Receiver<u32>,
    seats_tx: Option<watch::Sender<u32>>,
    countdown_task: Option<JoinHandle<()>>,
    scarcity_task: Option<JoinHandle<()>>,
}

impl OfferTimer {
    /// Start the expiry countdown. The scarcity counter stays idle until
    /// [`start_scarcity`](Self::start_scarcity).
    pub fn start(config: OfferConfig) -> Self {
        let (countdown_tx, countdown) = watch::channel(config.countdown_secs);
        let (seats_tx, seats) = watch::channel(config.initial_seats.max(config.min_seats));
        let countdown_task = tokio::spawn(run_countdown(countdown_tx, config.tick));

        tracing::debug!(secs = config.countdown_secs, "Offer countdown started");

        Self {
            config,
            countdown,
            seats,
            seats_tx: Some(seats_tx),
            countdown_task: Some(countdown_task),
            scarcity_task: None,
        }
    }

    /// Start decrementing the scarcity counter. Calling it again is a no-op.
    pub fn start_scarcity(&mut self) {
        let Some(tx) = self.seats_tx.take() else {
            return;
        };
        tracing::debug!(seats = *tx.borrow(), "Scarcity counter started");
        self.scarcity_task = Some(tokio::spawn(run_scarcity(
            tx,
            self.config.min_seats,
            self.config.seat_delay_min,
            self.config.seat_delay_max,
        )));
    }

    /// Seconds left on the countdown.
    pub fn seconds_left(&self) -> u32 {
        *self.countdown.borrow()
    }

    /// Current scarcity counter value.
    pub fn seats_left(&self) -> u32 {
        *self.seats.borrow()
    }

    /// Subscribe to countdown updates.
    pub fn watch_countdown(&self) -> watch::Receiver<u32> {
        self.countdown.clone()
    }

    /// Subscribe to scarcity counter updates.
    pub fn watch_seats(&self) -> watch::Receiver<u32> {
        self.seats.clone()
    }

    /// Whether either background task is still scheduled.
    pub fn is_running(&self) -> bool {
        [&self.countdown_task, &self.scarcity_task]
            .into_iter()
            .flatten()
            .any(|h| !h.is_finished())
    }

    /// Abort both tasks. Last observed values remain readable.
    pub fn cancel(&mut self) {
        for handle in [self.countdown_task.take(), self.scarcity_task.take()]
            .into_iter()
            .flatten()
        {
            if !handle.is_finished() {
                handle.abort();
            }
        }
        self.seats_tx = None;
    }
}

impl Drop for OfferTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_countdown(tx: watch::Sender<u32>, tick: Duration) {
    let mut ticker = tokio::time::interval(tick);
    // Skip immediate first tick
    ticker.tick().await;

    loop {
        if *tx.borrow() == 0 {
            break;
        }
        ticker.tick().await;
        tx.send_modify(|secs| *secs = secs.saturating_sub(1));
    }
    tracing::debug!("Offer countdown reached zero");
}

async fn run_scarcity(tx: watch::Sender<u32>, min_seats: u32, min: Duration, max: Duration) {
    while *tx.borrow() > min_seats {
        let delay = random_delay(min, max);
        tokio::time::sleep(delay).await;
        tx.send_modify(|seats| *seats = seats.saturating_sub(1).max(min_seats));
    }
    tracing::debug!(seats = min_seats, "Scarcity counter settled");
}

/// Uniform delay in `[min, max)`. Degenerate ranges collapse to `min`.
fn random_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let ms = rand::thread_rng().gen_range(min.as_millis() as u64..max.as_millis() as u64);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn countdown_reaches_zero_and_stops() {
        let timer = OfferTimer::start(OfferConfig::default());
        assert_eq!(timer.seconds_left(), 300);

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(timer.seconds_left(), 290);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(timer.seconds_left(), 0);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_never_goes_negative() {
        let config = OfferConfig {
            countdown_secs: 2,
            ..Default::default()
        };
        let timer = OfferTimer::start(config);
        let mut rx = timer.watch_countdown();
        let mut seen = vec![*rx.borrow()];
        while rx.changed().await.is_ok() {
            seen.push(*rx.borrow());
        }
        assert_eq!(seen, vec![2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn seats_idle_until_scarcity_starts() {
        let timer = OfferTimer::start(OfferConfig::default());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(timer.seats_left(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn scarcity_settles_at_one() {
        let mut timer = OfferTimer::start(OfferConfig::default());
        timer.start_scarcity();
        let mut rx = timer.watch_seats();

        let mut seen = vec![*rx.borrow()];
        let mut last = tokio::time::Instant::now();
        while *rx.borrow() > 1 {
            rx.changed().await.unwrap();
            let now = tokio::time::Instant::now();
            let gap = now - last;
            assert!(gap >= Duration::from_millis(1000), "gap {gap:?} too short");
            assert!(gap < Duration::from_millis(5000), "gap {gap:?} too long");
            last = now;
            seen.push(*rx.borrow());
        }
        assert_eq!(seen, vec![6, 5, 4, 3, 2, 1]);

        // Well past any further delay: still 1.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(timer.seats_left(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_scarcity_twice_is_noop() {
        let mut timer = OfferTimer::start(OfferConfig::default());
        timer.start_scarcity();
        timer.start_scarcity();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(timer.seats_left(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_freezes_values() {
        let mut timer = OfferTimer::start(OfferConfig::default());
        timer.start_scarcity();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        timer.cancel();
        assert!(!timer.is_running());

        let secs = timer.seconds_left();
        let seats = timer.seats_left();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(timer.seconds_left(), secs);
        assert_eq!(timer.seats_left(), seats);
    }

    #[test]
    fn random_delay_within_bounds() {
        let min = Duration::from_millis(1000);
        let max = Duration::from_millis(5000);
        for _ in 0..200 {
            let d = random_delay(min, max);
            assert!(d >= min && d < max);
        }
        assert_eq!(random_delay(max, min), max);
    }
}
