/// A seconds countdown advanced by the host once per second.
///
/// Nothing here owns a real timer: the host page calls `tick` from its own
/// interval and stops calling once `stop` has been requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    interval_secs: u32,
    remaining: Option<u32>,
}

impl Countdown {
    pub fn new(interval_secs: u32) -> Self {
        Countdown { interval_secs, remaining: None }
    }

    pub fn interval_secs(&self) -> u32 {
        self.interval_secs
    }

    /// Starts counting; with `immediate` the next tick fires.
    pub fn start(&mut self, immediate: bool) {
        self.remaining = Some(if immediate { 0 } else { self.interval_secs });
    }

    pub fn stop(&mut self) {
        self.remaining = None;
    }

    pub fn is_running(&self) -> bool {
        self.remaining.is_some()
    }

    /// Seconds until the next firing, `None` while stopped.
    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    /// Advances one second. Returns true when the countdown fires, after
    /// which it starts over from the full interval.
    pub fn tick(&mut self) -> bool {
        let Some(remaining) = self.remaining else {
            return false;
        };
        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.remaining = Some(self.interval_secs);
            true
        } else {
            self.remaining = Some(remaining);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_start_fires_on_first_tick() {
        let mut countdown = Countdown::new(3);
        assert!(!countdown.tick());
        countdown.start(true);
        assert!(countdown.tick());
        assert_eq!(countdown.remaining(), Some(3));
        assert!(!countdown.tick());
        assert!(!countdown.tick());
        assert!(countdown.tick());
    }

    #[test]
    fn delayed_start_waits_full_interval() {
        let mut countdown = Countdown::new(2);
        countdown.start(false);
        assert!(!countdown.tick());
        assert!(countdown.tick());
        countdown.stop();
        assert!(!countdown.is_running());
        assert!(!countdown.tick());
    }
}
