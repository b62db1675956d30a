/// The sender's retransmission timer as an explicit value. It has no notion of wall-clock time:
///  it is advanced only through [RetransmissionTimer::tick] with the milliseconds that passed
///  on the driver's virtual clock.
#[derive(Debug, Clone)]
pub struct RetransmissionTimer {
    rto_ms: u64,
    elapsed_ms: u64,
    running: bool,
}

impl RetransmissionTimer {
    pub fn new(initial_rto_ms: u64) -> RetransmissionTimer {
        RetransmissionTimer {
            rto_ms: initial_rto_ms,
            elapsed_ms: 0,
            running: false,
        }
    }

    /// (re)starts the timer from zero with the current RTO
    pub fn start(&mut self) {
        self.running = true;
        self.elapsed_ms = 0;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.elapsed_ms = 0;
    }

    /// stops the timer and sets a new RTO, typically the initial one after an ACK for new data
    pub fn reset(&mut self, rto_ms: u64) {
        self.stop();
        self.rto_ms = rto_ms;
    }

    /// exponential backoff
    pub fn double_rto(&mut self) {
        self.rto_ms = self.rto_ms.saturating_mul(2);
    }

    /// Advances the clock of a running timer, returning `true` iff the timer expired. A stopped
    ///  timer never expires.
    pub fn tick(&mut self, elapsed_ms: u64) -> bool {
        if !self.running {
            return false;
        }
        self.elapsed_ms = self.elapsed_ms.saturating_add(elapsed_ms);
        self.elapsed_ms >= self.rto_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn rto_ms(&self) -> u64 {
        self.rto_ms
    }
}
